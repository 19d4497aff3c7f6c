//! Telegram bot: commands, photo analysis and payment notifications

pub mod bot;
pub mod handlers;
pub mod notifications;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use notifications::notify_pro_activated;
