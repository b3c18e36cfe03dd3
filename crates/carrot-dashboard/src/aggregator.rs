//! Stale-while-revalidate dashboard aggregation.
//!
//! [`Aggregator::snapshot`] never waits on the catalog. A cache miss returns
//! the placeholder and schedules a background refresh that fans the three
//! fetches out as separate tasks and joins them under one overall deadline.
//! Only a refresh where all three fetches came back fresh writes a snapshot.
//!
//! ## Refresh lifecycle
//!
//! - At most one refresh per subject is in flight; later misses reuse it
//! - Each refresh owns a `CancellationToken`. Hitting the deadline or an
//!   invalidation cancels it, and abandoned fetch tasks stop at their next
//!   await point
//! - The snapshot is committed under the in-flight entry's lock, so a refresh
//!   that was invalidated while running can never write its result

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use carrot_core::SubjectId;

use crate::catalog::ProductCatalog;
use crate::config::{CatalogConfig, DashboardConfig};
use crate::error::{DashboardError, DashboardResult};
use crate::events::{DashboardEvent, DashboardEvents};
use crate::fetch::{FetchOutcome, Fetchers};
use crate::model::DashboardSnapshot;
use crate::snapshot::SnapshotCache;

struct InFlight {
    id: u64,
    token: CancellationToken,
}

struct Inner {
    fetchers: Fetchers,
    snapshots: Arc<SnapshotCache>,
    deadline: Duration,
    in_flight: DashMap<SubjectId, InFlight>,
    next_refresh_id: AtomicU64,
    events: DashboardEvents,
}

/// Cheaply cloneable handle to the dashboard aggregation state.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

impl Aggregator {
    /// # Arguments
    ///
    /// * `deadline` - Overall bound on joining the three fetches
    pub fn new(fetchers: Fetchers, snapshots: Arc<SnapshotCache>, deadline: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetchers,
                snapshots,
                deadline,
                in_flight: DashMap::new(),
                next_refresh_id: AtomicU64::new(1),
                events: DashboardEvents::new(),
            }),
        }
    }

    pub fn from_config(
        catalog: Arc<dyn ProductCatalog>,
        catalog_config: &CatalogConfig,
        dashboard_config: &DashboardConfig,
    ) -> Self {
        let fetchers = Fetchers::new(
            catalog,
            catalog_config.fetch_timeout,
            dashboard_config.recent_limit,
        );
        let snapshots = Arc::new(SnapshotCache::from_config(dashboard_config));
        Self::new(fetchers, snapshots, dashboard_config.deadline)
    }

    /// Returns the cached snapshot, or the placeholder after scheduling a
    /// refresh. Never blocks on the catalog.
    pub fn snapshot(&self, subject: SubjectId) -> DashboardSnapshot {
        if let Some(snapshot) = self.inner.snapshots.get(subject) {
            debug!(subject_id = %subject, "Dashboard cache hit");
            return snapshot;
        }

        self.schedule_refresh(subject);
        DashboardSnapshot::placeholder()
    }

    /// Non-blocking lookup that never schedules a refresh.
    pub fn cached_snapshot(&self, subject: SubjectId) -> Option<DashboardSnapshot> {
        self.inner.snapshots.get(subject)
    }

    /// Drops the cached snapshot and cancels any refresh in flight for
    /// `subject`.
    pub fn invalidate(&self, subject: SubjectId) {
        if let Some((_, flight)) = self.inner.in_flight.remove(&subject) {
            flight.token.cancel();
            debug!(subject_id = %subject, refresh_id = flight.id, "Cancelled in-flight refresh");
        }

        self.inner.snapshots.invalidate(subject);
        debug!(subject_id = %subject, "Dashboard cache invalidated");
        self.inner
            .events
            .send(DashboardEvent::Invalidated { subject_id: subject });
    }

    /// Starts a background refresh unless one is already running for
    /// `subject`. Returns `true` if a new refresh was started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule_refresh(&self, subject: SubjectId) -> bool {
        let id = self.inner.next_refresh_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        match self.inner.in_flight.entry(subject) {
            Entry::Occupied(_) => {
                debug!(subject_id = %subject, "Refresh already in flight");
                return false;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(InFlight {
                    id,
                    token: token.clone(),
                });
            }
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run_refresh(subject, id, token).await;
        });
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &DashboardEvents {
        &self.inner.events
    }

    pub fn snapshots(&self) -> &Arc<SnapshotCache> {
        &self.inner.snapshots
    }

    pub fn fetchers(&self) -> &Fetchers {
        &self.inner.fetchers
    }

    pub fn deadline(&self) -> Duration {
        self.inner.deadline
    }

    /// Number of refreshes currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }
}

impl Inner {
    async fn run_refresh(&self, subject: SubjectId, id: u64, token: CancellationToken) {
        let started = Instant::now();
        debug!(subject_id = %subject, refresh_id = id, "Dashboard refresh started");

        let result = self.collect(subject, &token).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let event = match result {
            Ok(snapshot) => {
                if self.commit(subject, id, snapshot) {
                    debug!(subject_id = %subject, elapsed_ms, "Dashboard refresh completed");
                    DashboardEvent::Refreshed {
                        subject_id: subject,
                        elapsed_ms,
                    }
                } else {
                    debug!(subject_id = %subject, "Dashboard refresh superseded, result discarded");
                    DashboardEvent::RefreshFailed {
                        subject_id: subject,
                        reason: DashboardError::Cancelled.to_string(),
                    }
                }
            }
            Err(e) => {
                self.in_flight.remove_if(&subject, |_, flight| flight.id == id);
                match &e {
                    DashboardError::AggregationTimeout { .. } => {
                        warn!(subject_id = %subject, elapsed_ms, "Dashboard aggregation timed out")
                    }
                    DashboardError::Cancelled => {
                        debug!(subject_id = %subject, "Dashboard refresh cancelled")
                    }
                    _ => {
                        warn!(subject_id = %subject, error = %e, "Dashboard refresh failed, keeping previous snapshot")
                    }
                }
                DashboardEvent::RefreshFailed {
                    subject_id: subject,
                    reason: e.to_string(),
                }
            }
        };

        self.events.send(event);
    }

    /// Writes `snapshot` if refresh `id` is still the current one for
    /// `subject`, releasing its in-flight slot.
    fn commit(&self, subject: SubjectId, id: u64, snapshot: DashboardSnapshot) -> bool {
        self.in_flight
            .remove_if(&subject, |_, flight| {
                let current = flight.id == id && !flight.token.is_cancelled();
                if current {
                    self.snapshots.put(subject, snapshot);
                }
                current
            })
            .is_some()
    }

    async fn collect(
        &self,
        subject: SubjectId,
        token: &CancellationToken,
    ) -> DashboardResult<DashboardSnapshot> {
        let generated_at = OffsetDateTime::now_utc();

        let fetchers = self.fetchers.clone();
        let stats = spawn_fetch(token, async move { fetchers.statistics(subject).await });

        let fetchers = self.fetchers.clone();
        let listings = spawn_fetch(token, async move { fetchers.recent_listings(subject).await });

        let fetchers = self.fetchers.clone();
        let activity = spawn_fetch(token, async move {
            fetchers.recent_activity(subject, generated_at).await
        });

        let joined = tokio::time::timeout(self.deadline, async {
            tokio::join!(stats, listings, activity)
        })
        .await;

        let (stats, listings, activity) = match joined {
            Ok(results) => results,
            Err(_) => {
                // Abandon the fetch tasks; they observe the token at their
                // next await point.
                token.cancel();
                return Err(DashboardError::aggregation_timeout(self.deadline));
            }
        };

        Ok(DashboardSnapshot::assemble(
            settle("statistics", stats)?,
            settle("recent_listings", listings)?,
            settle("recent_activity", activity)?,
            generated_at,
        ))
    }
}

fn spawn_fetch<T, F>(token: &CancellationToken, fetch: F) -> JoinHandle<Option<FetchOutcome<T>>>
where
    T: Send + 'static,
    F: Future<Output = FetchOutcome<T>> + Send + 'static,
{
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => None,
            outcome = fetch => Some(outcome),
        }
    })
}

/// Keeps a fetch result only if it is fresh.
fn settle<T>(
    fetch: &'static str,
    joined: Result<Option<FetchOutcome<T>>, JoinError>,
) -> DashboardResult<T> {
    match joined {
        Ok(Some(outcome)) => outcome.fresh().ok_or_else(|| {
            DashboardError::upstream_unavailable(format!("{fetch} fell back to defaults"))
        }),
        Ok(None) => Err(DashboardError::Cancelled),
        Err(e) => Err(DashboardError::upstream_unavailable(format!(
            "{fetch} task failed: {e}"
        ))),
    }
}
