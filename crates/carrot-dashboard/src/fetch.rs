//! Time-bounded fetchers over a [`ProductCatalog`].
//!
//! Fetchers never fail. On a transport error, a malformed response or an
//! elapsed timeout they log a warning and hand back a zero value wrapped in
//! [`FetchOutcome::Fallback`], so the aggregator can tell a real result from
//! a default without any error handling at the call site.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::warn;

use carrot_core::SubjectId;

use crate::catalog::ProductCatalog;
use crate::error::{DashboardError, DashboardResult};
use crate::model::{ActivityRecord, ListingSummary, Statistics};

/// Result of a fetch that cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// The catalog answered in time.
    Fresh(T),
    /// The fetch failed; the value is the documented default.
    Fallback(T),
}

impl<T> FetchOutcome<T> {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Fresh(value) | Self::Fallback(value) => value,
        }
    }

    /// Returns the value only if it is fresh.
    pub fn fresh(self) -> Option<T> {
        match self {
            Self::Fresh(value) => Some(value),
            Self::Fallback(_) => None,
        }
    }
}

/// The three dashboard fetches plus the direct listing read.
#[derive(Clone)]
pub struct Fetchers {
    catalog: Arc<dyn ProductCatalog>,
    timeout: Duration,
    recent_limit: usize,
}

impl Fetchers {
    /// # Arguments
    ///
    /// * `timeout` - Per-call bound applied to every dashboard fetch
    /// * `recent_limit` - Maximum number of listings and activity records
    pub fn new(catalog: Arc<dyn ProductCatalog>, timeout: Duration, recent_limit: usize) -> Self {
        Self {
            catalog,
            timeout,
            recent_limit,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn statistics(&self, subject: SubjectId) -> FetchOutcome<Statistics> {
        bounded(
            "statistics",
            subject,
            self.timeout,
            self.catalog.statistics(subject, self.timeout),
        )
        .await
    }

    /// Most recent owned listings, newest first, capped at the recent limit.
    pub async fn recent_listings(&self, subject: SubjectId) -> FetchOutcome<Vec<ListingSummary>> {
        let outcome = bounded(
            "recent_listings",
            subject,
            self.timeout,
            self.catalog.owned_listings(subject, self.timeout),
        )
        .await;

        match outcome {
            FetchOutcome::Fresh(listings) => FetchOutcome::Fresh(self.most_recent(listings)),
            fallback => fallback,
        }
    }

    /// Activity feed derived from the owned listings.
    ///
    /// Records whose listing carries no usable creation time are stamped
    /// `generated_at` minus one minute per position, keeping the feed ordered.
    pub async fn recent_activity(
        &self,
        subject: SubjectId,
        generated_at: OffsetDateTime,
    ) -> FetchOutcome<Vec<ActivityRecord>> {
        let outcome = bounded(
            "recent_activity",
            subject,
            self.timeout,
            self.catalog.owned_listings(subject, self.timeout),
        )
        .await;

        match outcome {
            FetchOutcome::Fresh(listings) => FetchOutcome::Fresh(
                self.most_recent(listings)
                    .iter()
                    .enumerate()
                    .map(|(i, listing)| {
                        let synthetic = generated_at - time::Duration::minutes(i as i64);
                        ActivityRecord::registered(listing, synthetic)
                    })
                    .collect(),
            ),
            FetchOutcome::Fallback(_) => FetchOutcome::Fallback(Vec::new()),
        }
    }

    /// Every owned listing in catalog order, bounded by `timeout`.
    pub async fn owned_listings(
        &self,
        subject: SubjectId,
        timeout: Duration,
    ) -> FetchOutcome<Vec<ListingSummary>> {
        bounded(
            "owned_listings",
            subject,
            timeout,
            self.catalog.owned_listings(subject, timeout),
        )
        .await
    }

    fn most_recent(&self, mut listings: Vec<ListingSummary>) -> Vec<ListingSummary> {
        // Newest first; listings without a creation time keep catalog order
        // after the dated ones.
        listings.sort_by(|a, b| match (&a.created_at, &b.created_at) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        listings.truncate(self.recent_limit);
        listings
    }
}

async fn bounded<T, F>(
    fetch: &'static str,
    subject: SubjectId,
    timeout: Duration,
    call: F,
) -> FetchOutcome<T>
where
    T: Default,
    F: Future<Output = DashboardResult<T>>,
{
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(DashboardError::upstream_unavailable(format!(
            "{fetch} timed out after {}ms",
            timeout.as_millis()
        ))),
    };

    match result {
        Ok(value) => FetchOutcome::Fresh(value),
        Err(e) => {
            warn!(subject_id = %subject, fetch, error = %e, "Catalog fetch failed, using defaults");
            FetchOutcome::Fallback(T::default())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Behavior, StubCatalog, listing};
    use super::*;
    use time::macros::datetime;

    const SUBJECT: SubjectId = SubjectId::new(42);

    fn fetchers(catalog: Arc<StubCatalog>) -> Fetchers {
        Fetchers::new(catalog, Duration::from_secs(2), 5)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_statistics() {
        let catalog = Arc::new(StubCatalog::new(3));
        let outcome = fetchers(catalog).statistics(SUBJECT).await;

        assert!(outcome.is_fresh());
        assert_eq!(outcome.into_inner().registered_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_falls_back_to_zero() {
        let catalog = Arc::new(StubCatalog::new(3));
        catalog.set_stats_behavior(Behavior::Fail).await;

        let outcome = fetchers(catalog).statistics(SUBJECT).await;
        assert_eq!(outcome, FetchOutcome::Fallback(Statistics::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_falls_back_after_timeout() {
        let catalog = Arc::new(StubCatalog::new(3));
        catalog.set_listings_behavior(Behavior::Hang).await;

        let started = tokio::time::Instant::now();
        let outcome = fetchers(catalog).recent_listings(SUBJECT).await;

        assert_eq!(outcome, FetchOutcome::Fallback(Vec::new()));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_listings_newest_first_and_capped() {
        let catalog = Arc::new(StubCatalog::new(0));
        catalog
            .set_listings(vec![
                listing(1, Some("2024-01-01T00:00:00Z")),
                listing(2, None),
                listing(3, Some("2024-03-01T00:00:00Z")),
                listing(4, Some("2024-02-01T00:00:00Z")),
                listing(5, None),
                listing(6, Some("2023-12-01T00:00:00Z")),
                listing(7, None),
            ])
            .await;

        let listings = fetchers(catalog).recent_listings(SUBJECT).await.into_inner();
        let ids: Vec<_> = listings.iter().map(|l| l.product_id).collect();

        assert_eq!(ids, vec![3, 4, 1, 6, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_activity_synthetic_timestamps() {
        let catalog = Arc::new(StubCatalog::new(0));
        catalog.set_listings(vec![listing(1, None), listing(2, None)]).await;
        let generated_at = datetime!(2024-05-01 12:00 UTC);

        let activity = fetchers(catalog)
            .recent_activity(SUBJECT, generated_at)
            .await
            .fresh()
            .unwrap();

        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].timestamp, generated_at);
        assert_eq!(activity[1].timestamp, datetime!(2024-05-01 11:59 UTC));
        assert_eq!(activity[0].kind, ActivityRecord::PRODUCT_REGISTERED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_owned_listings_uses_given_timeout() {
        let catalog = Arc::new(StubCatalog::new(0));
        catalog.set_listings(vec![listing(1, None)]).await;
        catalog.set_delay(Duration::from_secs(3)).await;
        let fetchers = fetchers(catalog);

        // Beyond the 2s dashboard timeout but within the listing timeout
        let outcome = fetchers
            .owned_listings(SUBJECT, Duration::from_secs(5))
            .await;
        assert!(outcome.is_fresh());

        let outcome = fetchers.recent_listings(SUBJECT).await;
        assert!(!outcome.is_fresh());
    }
}
