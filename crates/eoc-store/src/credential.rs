//! ---
//! eoc_section: "02-roster-data-model"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Roster data model and backend store seams."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::fmt;

use crate::{Result, StoreError};

/// Opaque bearer credential presented on every backend call.
///
/// Construction is the precondition check: a credential cannot exist without
/// a non-empty token, so holding a `Credential` proves the check passed
/// before any call is attempted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a bearer token, rejecting empty or whitespace-only input.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(StoreError::MissingCredential);
        }
        Ok(Self(token))
    }

    /// Read the credential from the named environment variable.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(token) => Self::new(token),
            Err(_) => Err(StoreError::MissingCredential),
        }
    }

    /// The raw token, for the transport layer only.
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never log the token
        f.write_str("Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_a_precondition_failure() {
        assert!(matches!(
            Credential::new(""),
            Err(StoreError::MissingCredential)
        ));
        assert!(matches!(
            Credential::new("   "),
            Err(StoreError::MissingCredential)
        ));
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let credential = Credential::new("secret-bearer").expect("valid token");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.token(), "secret-bearer");
    }

    #[test]
    fn unset_environment_variable_is_missing_credential() {
        assert!(matches!(
            Credential::from_env("EOC_TEST_UNSET_TOKEN_VAR"),
            Err(StoreError::MissingCredential)
        ));
    }
}
