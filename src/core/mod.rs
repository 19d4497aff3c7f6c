//! Configuration, errors, logging, metrics and the user-facing services

pub mod config;
pub mod entitlement;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod users;
pub mod web_server;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
