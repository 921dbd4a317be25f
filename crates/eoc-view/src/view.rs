//! ---
//! eoc_section: "01-core-functionality"
//! eoc_subsection: "module"
//! eoc_type: "source"
//! eoc_scope: "code"
//! eoc_description: "Per-view wiring of sync, queries, and lifecycle."
//! eoc_version: "v0.0.0-prealpha"
//! eoc_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eoc_common::config::AppConfig;
use eoc_lifecycle::LifecycleController;
use eoc_roster::{apply_sort, page_slice, toggle_sort, MatchPolicy, Page, SortKey, SortState};
use eoc_store::{
    CenterEvent, ChangeStream, Credential, RosterEntry, RosterStatistics, RosterStore, StoreError,
};
use eoc_sync::{MetaKey, RefreshCoalescer, SubscriptionManager, SyncCounters, SyncMetrics};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tuning for one roster view, usually derived from [`AppConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RosterViewConfig {
    /// Quiet period for the refresh coalescer.
    pub quiet_period: Duration,
    /// Families shown per roster page.
    pub per_page: usize,
    /// Duplicate-identity disambiguation policy.
    pub match_policy: MatchPolicy,
}

impl RosterViewConfig {
    /// Derive view tuning from the loaded application configuration.
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            quiet_period: config.sync.quiet_period,
            per_page: config.roster.per_page,
            match_policy: MatchPolicy {
                require_birth_date: config.roster.match_requires_birth_date,
            },
        }
    }
}

impl Default for RosterViewConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(50),
            per_page: 20,
            match_policy: MatchPolicy::default(),
        }
    }
}

/// One refresh generation of the cached view state.
///
/// Owned exclusively by the view instance; replaced wholesale on every
/// completed refresh and always treated as possibly stale in between.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    /// Monotonic refresh generation this state was installed under.
    pub generation: u64,
    /// The center-event detail record.
    pub event: CenterEvent,
    /// Family-level roster listing, in backend order.
    pub entries: Vec<RosterEntry>,
    /// Backend-derived statistics.
    pub statistics: RosterStatistics,
    /// Families not yet decamped.
    pub undecamped: u64,
    /// When this generation was fetched.
    pub refreshed_at: DateTime<Utc>,
}

struct FetchedView {
    event: CenterEvent,
    entries: Vec<RosterEntry>,
    statistics: RosterStatistics,
    undecamped: u64,
}

impl FetchedView {
    fn into_snapshot(self, generation: u64) -> ViewSnapshot {
        ViewSnapshot {
            generation,
            event: self.event,
            entries: self.entries,
            statistics: self.statistics,
            undecamped: self.undecamped,
            refreshed_at: Utc::now(),
        }
    }
}

async fn fetch_view_data(
    store: &dyn RosterStore,
    credential: &Credential,
    event_id: Uuid,
) -> Result<FetchedView, StoreError> {
    let event = store.center_event(credential, event_id).await?;
    let entries = store.roster_entries(credential, event_id).await?;
    let statistics = store.statistics(credential, event_id).await?;
    let undecamped = store.undecamped_count(credential, event_id).await?;
    Ok(FetchedView {
        event,
        entries,
        statistics,
        undecamped,
    })
}

/// Shared state the refresh paths operate on.
#[derive(Clone)]
pub(crate) struct RefreshContext {
    pub(crate) store: Arc<dyn RosterStore>,
    pub(crate) credential: Credential,
    pub(crate) event_id: Uuid,
    pub(crate) snapshot: Arc<RwLock<ViewSnapshot>>,
    pub(crate) lifecycle: Arc<LifecycleController>,
    refresh_seq: Arc<AtomicU64>,
}

impl RefreshContext {
    /// Fetch a full view generation and install it unless a newer one has
    /// landed in the meantime.
    ///
    /// The sequence ticket is taken before the fetch starts, so a result
    /// that raced a later refresh is discarded rather than rolling the
    /// cache back.
    pub(crate) async fn refresh_once(&self) -> Result<bool, StoreError> {
        let ticket = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = fetch_view_data(self.store.as_ref(), &self.credential, self.event_id).await?;
        let mut snapshot = self.snapshot.write();
        if snapshot.generation >= ticket {
            debug!(
                ticket,
                current = snapshot.generation,
                "stale refresh result discarded"
            );
            return Ok(false);
        }
        self.lifecycle.sync_status(fetched.event.status);
        *snapshot = fetched.into_snapshot(ticket);
        debug!(generation = ticket, "view snapshot installed");
        Ok(true)
    }

    pub(crate) fn meta_key(&self) -> MetaKey {
        let snapshot = self.snapshot.read();
        MetaKey {
            location_id: snapshot.event.location_id,
            disaster_id: snapshot.event.disaster_id,
        }
    }
}

/// A live roster view for one evacuation-center event.
///
/// Construction performs the initial load and starts the sync pipeline;
/// [`RosterView::shutdown`] (or dropping the view) tears down both
/// subscriptions and invalidates any pending quiet-period timer, so no
/// refetch can fire against a view that no longer exists.
pub struct RosterView {
    pub(crate) ctx: RefreshContext,
    pub(crate) config: RosterViewConfig,
    sort: Mutex<Option<SortState>>,
    subscriptions: Arc<Mutex<SubscriptionManager>>,
    counters: Arc<SyncCounters>,
    coalescer: RefreshCoalescer,
    refresh_task: JoinHandle<()>,
    shutdown: broadcast::Sender<()>,
}

impl RosterView {
    /// Connect to a center-event: load the first snapshot and start the
    /// live-sync pipeline.
    ///
    /// Holding a [`Credential`] is the precondition for every backend
    /// call; callers without one fail before any request is attempted.
    /// The core subscription starts as soon as the event id is known; the
    /// meta subscription only once the first load has revealed the
    /// location and disaster ids.
    pub async fn connect(
        store: Arc<dyn RosterStore>,
        stream: Arc<dyn ChangeStream>,
        credential: Credential,
        event_id: Uuid,
        config: RosterViewConfig,
    ) -> Result<Self, StoreError> {
        let counters = Arc::new(SyncCounters::default());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(stream, signal_tx, counters.clone());
        manager.start_core(event_id);

        let refresh_seq = Arc::new(AtomicU64::new(0));
        let generation = refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = fetch_view_data(store.as_ref(), &credential, event_id).await?;
        manager.start_meta(MetaKey {
            location_id: fetched.event.location_id,
            disaster_id: fetched.event.disaster_id,
        });

        let lifecycle = Arc::new(LifecycleController::new(
            store.clone(),
            credential.clone(),
            event_id,
            fetched.event.status,
        ));
        let ctx = RefreshContext {
            store,
            credential,
            event_id,
            snapshot: Arc::new(RwLock::new(fetched.into_snapshot(generation))),
            lifecycle,
            refresh_seq,
        };
        let subscriptions = Arc::new(Mutex::new(manager));

        let (coalescer, mut refresh_due) =
            RefreshCoalescer::spawn(config.quiet_period, signal_rx, counters.clone());
        let (shutdown, mut shutdown_rx) = broadcast::channel(4);

        let loop_ctx = ctx.clone();
        let loop_subscriptions = subscriptions.clone();
        let refresh_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        loop_subscriptions.lock().stop();
                        debug!("refresh loop stopped");
                        break;
                    }
                    due = refresh_due.recv() => match due {
                        Some(_) => match loop_ctx.refresh_once().await {
                            Ok(true) => {
                                // the load may have revealed changed meta ids
                                let key = loop_ctx.meta_key();
                                loop_subscriptions.lock().start_meta(key);
                            }
                            Ok(false) => {}
                            Err(err) => {
                                warn!(error = %err, "coalesced refresh failed; awaiting the next signal");
                            }
                        },
                        None => break,
                    },
                }
            }
        });

        info!(%event_id, "roster view connected");
        Ok(Self {
            ctx,
            config,
            sort: Mutex::new(None),
            subscriptions,
            counters,
            coalescer,
            refresh_task,
            shutdown,
        })
    }

    /// The latest installed snapshot.
    pub fn snapshot(&self) -> ViewSnapshot {
        self.ctx.snapshot.read().clone()
    }

    /// Backend-derived statistics from the latest snapshot.
    pub fn statistics(&self) -> RosterStatistics {
        self.ctx.snapshot.read().statistics
    }

    /// Whether the operation has ended, from the cached lifecycle phase.
    pub fn is_ended(&self) -> bool {
        self.ctx.lifecycle.is_ended()
    }

    /// Whether the end-operation action is currently offered.
    pub fn can_end_operation(&self) -> bool {
        self.ctx.lifecycle.can_end_operation()
    }

    /// Counters for the sync pipeline stages.
    pub fn sync_metrics(&self) -> SyncMetrics {
        self.counters.snapshot()
    }

    /// The active sort, if any.
    pub fn sort_state(&self) -> Option<SortState> {
        *self.sort.lock()
    }

    /// Cycle the sort for a column header click.
    pub fn toggle_sort(&self, key: SortKey) {
        let mut sort = self.sort.lock();
        *sort = toggle_sort(*sort, key);
    }

    /// A sorted, paginated roster slice for table components.
    pub fn roster_page(&self, page: usize) -> Page<RosterEntry> {
        let snapshot = self.ctx.snapshot.read();
        let sorted = apply_sort(&snapshot.entries, self.sort_state());
        page_slice(&sorted, page, self.config.per_page)
    }

    /// User-initiated refresh; runs immediately, bypassing the coalescer.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        if self.ctx.refresh_once().await? {
            let key = self.ctx.meta_key();
            self.subscriptions.lock().start_meta(key);
        }
        Ok(())
    }

    /// Tear the view down: stop both subscriptions, invalidate the pending
    /// quiet-period timer, and join the refresh loop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        self.coalescer.shutdown();
        if let Err(err) = self.refresh_task.await {
            warn!(error = %err, "refresh loop join error");
        }
        self.subscriptions.lock().stop();
        info!(event_id = %self.ctx.event_id, "roster view shut down");
    }
}
