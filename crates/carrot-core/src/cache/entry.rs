use tokio::time::Instant;

/// A cached value with its creation and expiry instants.
///
/// Entries are never mutated after creation; a refresh replaces the whole
/// entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that expires at `expires_at`.
    pub fn new(value: V, created_at: Instant, expires_at: Instant) -> Self {
        Self {
            value,
            created_at,
            expires_at,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns `true` once `now` has reached the expiry instant.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_entry_expiry_boundary() {
        let now = Instant::now();
        let entry = CacheEntry::new("v", now, now + Duration::from_secs(10));

        assert!(!entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now + Duration::from_secs(9)));
        assert!(entry.is_expired_at(now + Duration::from_secs(10)));
        assert_eq!(*entry.value(), "v");
    }
}
