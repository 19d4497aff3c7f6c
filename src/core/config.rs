use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

use crate::core::error::{AppError, AppResult};
use crate::storage::models::PaymentProvider;

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
///
/// Kept outside `Config` because the logger starts before configuration is validated.
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for outbound HTTP requests (LLM, Telegram file downloads)
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

/// Vision model settings
#[derive(Debug)]
pub struct OpenAiConfig {
    /// OPENAI_API_KEY; None switches the analyzer to mock mode
    pub api_key: Option<SecretString>,
    /// OPENAI_API_BASE, default https://api.openai.com/v1
    pub api_base: String,
    /// OPENAI_MODEL, default gpt-4o
    pub model: String,
}

/// Validated application configuration, read once at startup.
#[derive(Debug)]
pub struct Config {
    /// BOT_TOKEN or TELEGRAM_BOT_TOKEN (exactly one of them)
    pub bot_token: Option<SecretString>,
    /// DATABASE_PATH, default database.sqlite
    pub database_path: String,
    pub openai: OpenAiConfig,
    /// FREE_ATTEMPTS granted to each new user, default 5
    pub free_attempts: i64,
    /// STRIPE_SECRET_KEY; None means the mock gateway serves Stripe payments
    pub stripe_secret_key: Option<SecretString>,
    /// YOOKASSA_SECRET_KEY; None means the mock gateway serves YooKassa payments
    pub yookassa_secret_key: Option<SecretString>,
    /// PRO_SUBSCRIPTION_PRICE, default 299
    pub pro_subscription_price: f64,
    /// PAYMENT_CURRENCY, default RUB
    pub payment_currency: String,
    /// DEFAULT_PAYMENT_PROVIDER used by the bot's /pro command, default yookassa
    pub default_payment_provider: PaymentProvider,
    /// PAYMENT_WEBHOOK_SECRET; when set, webhooks must send it in X-Webhook-Secret
    pub webhook_secret: Option<SecretString>,
    /// APP_ENV, default development
    pub app_env: AppEnv,
    /// PORT for the HTTP API, default 3000
    pub port: u16,
}

impl Config {
    /// Reads and validates configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = resolve_bot_token(get("BOT_TOKEN"), get("TELEGRAM_BOT_TOKEN"))?;

        let free_attempts: i64 = parse_var(get("FREE_ATTEMPTS"), "FREE_ATTEMPTS", 5)?;
        if free_attempts < 0 {
            return Err(AppError::Validation(format!(
                "FREE_ATTEMPTS must be a non-negative integer, got {}",
                free_attempts
            )));
        }

        let pro_subscription_price: f64 = parse_var(get("PRO_SUBSCRIPTION_PRICE"), "PRO_SUBSCRIPTION_PRICE", 299.0)?;
        if !pro_subscription_price.is_finite() || pro_subscription_price <= 0.0 {
            return Err(AppError::Validation(format!(
                "PRO_SUBSCRIPTION_PRICE must be a positive number, got {}",
                pro_subscription_price
            )));
        }

        Ok(Self {
            bot_token: bot_token.map(SecretString::from),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "database.sqlite".to_string()),
            openai: OpenAiConfig {
                api_key: get("OPENAI_API_KEY").map(SecretString::from),
                api_base: get("OPENAI_API_BASE")
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            },
            free_attempts,
            stripe_secret_key: get("STRIPE_SECRET_KEY").map(SecretString::from),
            yookassa_secret_key: get("YOOKASSA_SECRET_KEY").map(SecretString::from),
            pro_subscription_price,
            payment_currency: get("PAYMENT_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| "RUB".to_string()),
            default_payment_provider: parse_var(
                get("DEFAULT_PAYMENT_PROVIDER"),
                "DEFAULT_PAYMENT_PROVIDER",
                PaymentProvider::Yookassa,
            )?,
            webhook_secret: get("PAYMENT_WEBHOOK_SECRET").map(SecretString::from),
            app_env: parse_var(get("APP_ENV"), "APP_ENV", AppEnv::Development)?,
            port: parse_var(get("PORT"), "PORT", 3000)?,
        })
    }

    /// Token for the Telegram bot; errors when neither variable was set.
    pub fn bot_token(&self) -> AppResult<&SecretString> {
        self.bot_token.as_ref().ok_or_else(|| {
            AppError::Validation("one of BOT_TOKEN or TELEGRAM_BOT_TOKEN must be set to run the bot".to_string())
        })
    }
}

/// BOT_TOKEN and TELEGRAM_BOT_TOKEN are mutually exclusive.
fn resolve_bot_token(bot_token: Option<String>, telegram_bot_token: Option<String>) -> AppResult<Option<String>> {
    match (bot_token, telegram_bot_token) {
        (Some(_), Some(_)) => Err(AppError::Validation(
            "set only one of BOT_TOKEN and TELEGRAM_BOT_TOKEN".to_string(),
        )),
        (Some(token), None) | (None, Some(token)) => Ok(Some(token)),
        (None, None) => Ok(None),
    }
}

fn parse_var<T>(raw: Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e| AppError::Validation(format!("invalid {}={:?}: {}", name, value, e))),
    }
}
