//! Dashboard aggregation over the product catalog.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod model;
pub mod snapshot;

pub use aggregator::Aggregator;
pub use catalog::{HttpCatalogClient, ProductCatalog};
pub use config::{CatalogConfig, DashboardConfig};
pub use error::{DashboardError, DashboardResult};
pub use events::{DashboardEvent, DashboardEvents};
pub use fetch::{FetchOutcome, Fetchers};
pub use model::{ActivityRecord, DashboardSnapshot, ListingSummary, Statistics};
pub use snapshot::SnapshotCache;
