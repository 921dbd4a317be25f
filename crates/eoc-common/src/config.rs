//! ---
//! eoc_section: "01-core-functionality"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Shared primitives and utilities for the console core."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;
use uuid::Uuid;

use crate::logging::LogFormat;

fn default_credential_env() -> String {
    "EOC_TOKEN".to_owned()
}

fn default_quiet_period() -> Duration {
    Duration::from_millis(50)
}

fn default_per_page() -> usize {
    20
}

fn default_match_requires_birth_date() -> bool {
    true
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the console core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Named evacuation-center events the console can connect to.
    #[serde(default)]
    pub centers: IndexMap<String, CenterConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "EOC_CONFIG";

    /// Load configuration from disk, respecting the `EOC_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve a configured center by name.
    pub fn center(&self, name: &str) -> Option<&CenterConfig> {
        self.centers.get(name)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.centers.is_empty() {
            return Err(anyhow!(
                "configuration must declare at least one evacuation center"
            ));
        }
        self.api.validate()?;
        self.sync.validate()?;
        self.roster.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Backend API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the roster backend.
    #[serde(default)]
    pub base_url: String,
    /// Environment variable holding the bearer credential.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("api.base_url must not be empty"));
        }
        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            credential_env: default_credential_env(),
        }
    }
}

/// Live synchronization tuning.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period used to coalesce bursts of staleness signals.
    #[serde(default = "default_quiet_period")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub quiet_period: Duration,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.quiet_period.is_zero() {
            return Err(anyhow!("sync.quiet_period must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period: default_quiet_period(),
        }
    }
}

/// Roster presentation and duplicate-matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Families shown per roster page.
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    /// Require a birth date in addition to the normalized name before two
    /// registrants are considered the same person.
    #[serde(default = "default_match_requires_birth_date")]
    pub match_requires_birth_date: bool,
}

impl RosterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 {
            return Err(anyhow!("roster.per_page must be at least 1"));
        }
        Ok(())
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            match_requires_birth_date: default_match_requires_birth_date(),
        }
    }
}

/// One connectable evacuation-center event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CenterConfig {
    /// Identifier of the center-event record on the backend.
    pub event_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
}

/// Logging sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
