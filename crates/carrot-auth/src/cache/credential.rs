//! Verification cache keyed by credential fingerprint.
//!
//! A hit skips signature verification entirely. Entries are dropped by TTL
//! (through the sweeper or on lookup), by [`CredentialCache::invalidate_subject`]
//! after an account mutation, or to honour the size bound.
//!
//! ## Security Considerations
//!
//! - Only the SHA-256 fingerprint of a credential is stored, never the
//!   credential itself
//! - Failed verifications are never cached
//! - An entry never outlives the `exp` of the credential it was built from

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::debug;

use carrot_core::{CacheStats, ExpiringMap, Identity, SubjectId, Sweep};

use super::fingerprint::Fingerprint;
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::CredentialVerifier;

pub struct CredentialCache {
    verifier: Arc<dyn CredentialVerifier>,
    entries: ExpiringMap<Fingerprint, Identity>,
    bearer_prefix: String,
}

impl CredentialCache {
    /// Create a new cache with the specified TTL and max size.
    pub fn new(verifier: Arc<dyn CredentialVerifier>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            verifier,
            entries: ExpiringMap::new(ttl, max_entries),
            bearer_prefix: "Bearer ".to_string(),
        }
    }

    pub fn from_config(verifier: Arc<dyn CredentialVerifier>, config: &AuthConfig) -> Self {
        Self::new(verifier, config.cache_ttl, config.max_entries)
            .with_bearer_prefix(config.bearer_prefix.clone())
    }

    /// Sets the scheme stripped from raw credentials.
    #[must_use]
    pub fn with_bearer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bearer_prefix = prefix.into();
        self
    }

    /// Resolves a raw credential (with or without its scheme) into the
    /// identity it carries.
    ///
    /// Concurrent misses for the same credential each run the verifier and
    /// the last write wins; both compute the same identity.
    ///
    /// # Errors
    ///
    /// - `MalformedCredential` if nothing is left after stripping the scheme
    /// - `InvalidCredential` if verification fails
    pub fn resolve(&self, raw: &str) -> AuthResult<Identity> {
        let token = self.strip_scheme(raw);
        if token.is_empty() {
            return Err(AuthError::malformed_credential("credential is empty"));
        }

        let fingerprint = Fingerprint::of(token);
        if let Some(identity) = self.entries.get(&fingerprint) {
            debug!(
                fingerprint = %fingerprint.short(),
                subject_id = %identity.subject_id,
                "Credential cache hit"
            );
            return Ok(identity);
        }

        let verified = self.verifier.verify(token).map_err(|e| {
            debug!(fingerprint = %fingerprint.short(), error = %e, "Credential verification failed");
            AuthError::from(e)
        })?;

        match deadline_for(verified.expires_at) {
            Some(deadline) => {
                self.entries
                    .insert_with_deadline(fingerprint, verified.identity.clone(), deadline);
                debug!(
                    fingerprint = %fingerprint.short(),
                    subject_id = %verified.identity.subject_id,
                    "Credential cached"
                );
            }
            None => {
                debug!(fingerprint = %fingerprint.short(), "Credential expires now, not cached");
            }
        }

        Ok(verified.identity)
    }

    /// Removes every cached entry for `subject`. Returns the number removed.
    ///
    /// Scans the whole cache; called only after account mutations.
    pub fn invalidate_subject(&self, subject: SubjectId) -> usize {
        let removed = self
            .entries
            .remove_where(|_, identity| identity.subject_id == subject);
        debug!(subject_id = %subject, removed, "Credential cache invalidated");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn strip_scheme<'a>(&self, raw: &'a str) -> &'a str {
        let raw = raw.trim();
        let scheme = self.bearer_prefix.trim();
        if scheme.is_empty() {
            return raw;
        }

        match raw.strip_prefix(scheme) {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => raw,
        }
    }
}

impl Sweep for CredentialCache {
    fn name(&self) -> &'static str {
        "credentials"
    }

    fn sweep(&self) -> usize {
        self.entries.purge_expired()
    }
}

/// Converts the credential expiry into a monotonic deadline, or `None` if it
/// has already passed.
fn deadline_for(expires_at: OffsetDateTime) -> Option<Instant> {
    let remaining = expires_at - OffsetDateTime::now_utc();
    let remaining = Duration::try_from(remaining).ok()?;
    (!remaining.is_zero()).then(|| Instant::now() + remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::token::VerifiedCredential;
    use crate::token::jwt::{CredentialClaims, JwtError, JwtService, SigningAlgorithm};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const TTL: Duration = Duration::from_secs(300);

    /// Wraps a real verifier and counts calls.
    struct SpyVerifier {
        inner: JwtService,
        calls: AtomicUsize,
    }

    impl SpyVerifier {
        fn new() -> Self {
            Self {
                inner: JwtService::from_secret(SECRET, SigningAlgorithm::HS256),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn token(&self, user_id: i64) -> String {
            self.inner
                .encode(&CredentialClaims::new(
                    format!("user{user_id}@example.com"),
                    user_id,
                    format!("user{user_id}"),
                ))
                .unwrap()
        }
    }

    impl CredentialVerifier for SpyVerifier {
        fn verify(&self, token: &str) -> Result<VerifiedCredential, JwtError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(token)
        }
    }

    fn cache() -> (Arc<SpyVerifier>, CredentialCache) {
        let spy = Arc::new(SpyVerifier::new());
        let cache = CredentialCache::new(spy.clone(), TTL, 100);
        (spy, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_resolve_hits_cache() {
        let (spy, cache) = cache();
        let token = spy.token(42);

        let first = cache.resolve(&format!("Bearer {token}")).unwrap();
        let second = cache.resolve(&format!("Bearer {token}")).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.subject_id, SubjectId::new(42));
        assert_eq!(spy.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheme_is_optional() {
        let (spy, cache) = cache();
        let token = spy.token(42);

        cache.resolve(&token).unwrap();
        cache.resolve(&format!("Bearer {token}")).unwrap();

        // Both spellings share one fingerprint
        assert_eq!(spy.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_after_resolve() {
        let (spy, cache) = cache();
        cache.resolve(&format!("Bearer {}", spy.token(42))).unwrap();

        let stats = cache.stats();
        assert_eq!((stats.total, stats.active, stats.expired), (1, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverifies_after_ttl() {
        let (spy, cache) = cache();
        let token = spy.token(42);

        cache.resolve(&token).unwrap();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        assert_eq!(cache.stats().expired, 1);
        cache.resolve(&token).unwrap();
        assert_eq!(spy.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_credential_is_malformed() {
        let (spy, cache) = cache();

        for raw in ["", "   ", "Bearer ", "Bearer"] {
            assert!(
                matches!(cache.resolve(raw), Err(AuthError::MalformedCredential { .. })),
                "{raw:?} should be malformed"
            );
        }
        assert_eq!(spy.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_credential_not_cached() {
        let (spy, cache) = cache();

        for _ in 0..3 {
            assert!(matches!(
                cache.resolve("Bearer not.a.token"),
                Err(AuthError::InvalidCredential { .. })
            ));
        }

        assert_eq!(spy.calls(), 3);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credential_rejected() {
        let (spy, cache) = cache();
        let token = spy
            .inner
            .encode(&CredentialClaims::new("a@example.com", 1, "a").expires_in_seconds(-5))
            .unwrap();

        assert!(matches!(
            cache.resolve(&token),
            Err(AuthError::InvalidCredential { .. })
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_capped_by_credential_expiry() {
        let (spy, cache) = cache();
        let token = spy
            .inner
            .encode(&CredentialClaims::new("a@example.com", 1, "a").expires_in_seconds(30))
            .unwrap();

        cache.resolve(&token).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(cache.stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_subject_leaves_others() {
        let (spy, cache) = cache();
        let first = spy.token(42);
        // A second credential for the same subject with a longer lifetime
        let second = spy
            .inner
            .encode(&CredentialClaims::new("user42@example.com", 42, "user42").expires_in_seconds(7200))
            .unwrap();
        let other = spy.token(7);

        cache.resolve(&first).unwrap();
        cache.resolve(&second).unwrap();
        cache.resolve(&other).unwrap();
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.invalidate_subject(SubjectId::new(42)), 2);
        assert_eq!(cache.len(), 1);

        cache.resolve(&other).unwrap();
        assert_eq!(spy.calls(), 3);

        cache.resolve(&first).unwrap();
        assert_eq!(spy.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep() {
        let (spy, cache) = cache();
        assert_eq!(cache.sweep(), 0);

        cache.resolve(&spy.token(1)).unwrap();
        tokio::time::advance(TTL).await;
        cache.resolve(&spy.token(2)).unwrap();

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolves() {
        let (spy, cache) = cache();
        let cache = Arc::new(cache);
        let token = spy.token(42);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let token = token.clone();
                tokio::spawn(async move { cache.resolve(&token).unwrap() })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().subject_id, SubjectId::new(42));
        }
        assert_eq!(cache.len(), 1);
        assert!(spy.calls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_prefix() {
        let spy = Arc::new(SpyVerifier::new());
        let cache = CredentialCache::new(spy.clone(), TTL, 100).with_bearer_prefix("Token ");
        let token = spy.token(3);

        assert_eq!(cache.resolve(&format!("Token {token}")).unwrap().subject_id.get(), 3);
    }
}
