//! life-analyzer - Telegram bot and HTTP API that scores photos with a vision LLM
//!
//! Usage is metered by free attempts; a Pro subscription, unlocked by a payment
//! webhook, removes the limit.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, metrics, users, metering and the HTTP API
//! - `storage`: SQLite pool, migrations and row types
//! - `analysis`: vision model clients and the analysis service
//! - `payments`: payment gateways and the webhook flow
//! - `telegram`: bot commands and photo handling

pub mod analysis;
pub mod cli;
pub mod core;
pub mod payments;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::error::{AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
