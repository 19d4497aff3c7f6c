//! Database pool, schema migrations and row types

pub mod db;
pub mod migrations;
pub mod models;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
