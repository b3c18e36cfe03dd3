//! In-memory expiring cache primitives.
//!
//! Both the credential cache and the dashboard snapshot cache are built on
//! [`ExpiringMap`]; they differ only in key type and in how entries are
//! invalidated.

mod entry;
mod map;

pub use entry::CacheEntry;
pub use map::{CacheStats, ExpiringMap};
