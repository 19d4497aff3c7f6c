//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.

mod commands;
mod photo;
mod schema;
mod types;

pub use photo::parse_caption;
pub use schema::schema;
pub use types::{profile_from_message, HandlerDeps, HandlerError};
