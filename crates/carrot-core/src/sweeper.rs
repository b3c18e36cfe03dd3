//! Background sweeper that purges expired cache entries on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// A store the sweeper can purge.
///
/// `sweep` must be idempotent and must tolerate an empty store.
pub trait Sweep: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Removes every expired entry and returns how many were removed.
    fn sweep(&self) -> usize;
}

/// Periodic sweeper over one or more [`Sweep`] targets.
///
/// The first sweep runs one full period after [`start`](Self::start).
pub struct CacheSweeper {
    period: Duration,
    targets: Vec<Arc<dyn Sweep>>,
}

impl CacheSweeper {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            targets: Vec::new(),
        }
    }

    /// Adds a store to sweep on every tick.
    pub fn with_target(mut self, target: Arc<dyn Sweep>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sweeps every target once. Returns the total number of entries removed.
    pub fn sweep_once(&self) -> usize {
        self.targets
            .iter()
            .map(|target| {
                let removed = target.sweep();
                if removed > 0 {
                    debug!(cache = target.name(), removed, "Swept expired cache entries");
                }
                removed
            })
            .sum()
    }

    /// Start the sweeper in a background task.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                period_secs = self.period.as_secs(),
                targets = self.targets.len(),
                "Cache sweeper started"
            );

            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    changed = shutdown_rx.changed() => {
                        // A dropped sender also means stop.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Cache sweeper stopped");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx, task }
    }
}

/// Handle to a running [`CacheSweeper`].
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits up to `grace` for it to finish.
    ///
    /// Returns `true` on a clean stop. When the grace period elapses the task
    /// is aborted and `false` is returned.
    pub async fn shutdown(mut self, grace: Duration) -> bool {
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Cache sweeper did not stop within grace period, aborting"
                );
                self.task.abort();
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::ExpiringMap;

    #[derive(Default)]
    struct CountingTarget {
        calls: AtomicUsize,
    }

    impl Sweep for CountingTarget {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn sweep(&self) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    struct MapTarget(ExpiringMap<u32, u32>);

    impl Sweep for MapTarget {
        fn name(&self) -> &'static str {
            "map"
        }

        fn sweep(&self) -> usize {
            self.0.purge_expired()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_period() {
        let target = Arc::new(CountingTarget::default());
        let handle = CacheSweeper::new(Duration::from_secs(60))
            .with_target(target.clone())
            .start();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 3);

        assert!(handle.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired_entries() {
        let map = ExpiringMap::new(Duration::from_secs(300), 100);
        map.insert(1, 1);
        let target = Arc::new(MapTarget(map));

        let handle = CacheSweeper::new(Duration::from_secs(60))
            .with_target(target.clone())
            .start();

        tokio::time::sleep(Duration::from_secs(290)).await;
        assert_eq!(target.0.len(), 1);

        // Expires at 300s and is purged by the next tick
        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(target.0.len(), 0);

        assert!(handle.shutdown(Duration::from_secs(5)).await);
    }

    #[test]
    fn test_sweep_once_on_empty_store() {
        let target = Arc::new(MapTarget(ExpiringMap::new(Duration::from_secs(1), 10)));
        let sweeper = CacheSweeper::new(Duration::from_secs(60)).with_target(target);

        assert_eq!(sweeper.sweep_once(), 0);
        assert_eq!(sweeper.sweep_once(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let target = Arc::new(CountingTarget::default());
        let handle = CacheSweeper::new(Duration::from_secs(60))
            .with_target(target.clone())
            .start();

        assert!(handle.shutdown(Duration::from_secs(5)).await);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);
    }
}
