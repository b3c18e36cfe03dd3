use std::time::Duration;

use tracing::debug;

use carrot_core::{CacheStats, ExpiringMap, SubjectId, Sweep};

use crate::config::DashboardConfig;
use crate::model::DashboardSnapshot;

/// Latest complete dashboard snapshot per account.
pub struct SnapshotCache {
    entries: ExpiringMap<SubjectId, DashboardSnapshot>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: ExpiringMap::new(ttl, max_entries),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.snapshot_ttl, config.max_entries)
    }

    pub fn get(&self, subject: SubjectId) -> Option<DashboardSnapshot> {
        self.entries.get(&subject)
    }

    /// Stores `snapshot`, replacing any previous one for `subject`.
    ///
    /// Placeholders are refused.
    pub fn put(&self, subject: SubjectId, snapshot: DashboardSnapshot) -> bool {
        if snapshot.is_placeholder() {
            return false;
        }
        self.entries.insert(subject, snapshot);
        debug!(subject_id = %subject, "Dashboard snapshot cached");
        true
    }

    pub fn invalidate(&self, subject: SubjectId) -> bool {
        self.entries.remove(&subject)
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Sweep for SnapshotCache {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn sweep(&self) -> usize {
        self.entries.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Statistics;
    use time::OffsetDateTime;

    fn snapshot(registered: u64) -> DashboardSnapshot {
        DashboardSnapshot::assemble(
            Statistics {
                registered_count: registered,
                ..Statistics::default()
            },
            Vec::new(),
            Vec::new(),
            OffsetDateTime::now_utc(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_get_invalidate() {
        let cache = SnapshotCache::new(Duration::from_secs(300), 10);
        let subject = SubjectId::new(42);

        assert!(cache.put(subject, snapshot(3)));
        assert_eq!(cache.get(subject).unwrap().stats.registered_count, 3);

        assert!(cache.invalidate(subject));
        assert!(cache.get(subject).is_none());
        assert!(!cache.invalidate(subject));
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_never_cached() {
        let cache = SnapshotCache::new(Duration::from_secs(300), 10);
        assert!(!cache.put(SubjectId::new(1), DashboardSnapshot::placeholder()));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_expires_and_is_swept() {
        let cache = SnapshotCache::new(Duration::from_secs(300), 10);
        cache.put(SubjectId::new(1), snapshot(1));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(cache.stats().expired, 1);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }
}
