pub mod cache;
pub mod identity;
pub mod sweeper;

pub use cache::{CacheEntry, CacheStats, ExpiringMap};
pub use identity::{Identity, ParseSubjectIdError, SubjectId};
pub use sweeper::{CacheSweeper, Sweep, SweeperHandle};
