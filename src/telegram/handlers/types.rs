//! Handler types and dependencies

use teloxide::types::Message;

use crate::analysis::AnalysisService;
use crate::core::users::UserService;
use crate::payments::PaymentService;
use crate::storage::models::{PaymentProvider, TelegramProfile};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub users: UserService,
    pub analysis: AnalysisService,
    pub payments: PaymentService,
    /// Provider used for /pro
    pub default_provider: PaymentProvider,
}

impl HandlerDeps {
    pub fn new(
        users: UserService,
        analysis: AnalysisService,
        payments: PaymentService,
        default_provider: PaymentProvider,
    ) -> Self {
        Self {
            users,
            analysis,
            payments,
            default_provider,
        }
    }
}

/// Sender of a message; falls back to the chat for anonymous senders.
pub fn profile_from_message(msg: &Message) -> TelegramProfile {
    match msg.from.as_ref() {
        Some(user) => TelegramProfile {
            telegram_id: i64::try_from(user.id.0).unwrap_or(msg.chat.id.0),
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
        },
        None => TelegramProfile {
            telegram_id: msg.chat.id.0,
            ..Default::default()
        },
    }
}
