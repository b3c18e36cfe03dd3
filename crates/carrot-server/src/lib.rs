pub mod config;
pub mod core;
pub mod handlers;
pub mod observability;
pub mod response;
pub mod server;

pub use crate::config::{AppConfig, LoggingConfig, ServerConfig};
pub use crate::core::ServiceCore;
pub use handlers::{AppState, Authenticated};
pub use observability::{init_tracing, shutdown_tracing};
pub use response::{ApiError, ApiResponse};
pub use server::{CarrotServer, ServerBuilder, build_app};
