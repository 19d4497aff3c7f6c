//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup report of which integrations run live and which are mocked

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config::Config as AppConfig;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs which integrations are live at application startup
///
/// Secrets are never printed, only whether they are configured.
pub fn log_startup_configuration(config: &AppConfig) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Startup Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("Environment: {}", config.app_env);
    log::info!("Database: {}", config.database_path);

    if config.openai.api_key.is_some() {
        log::info!(
            "✅ Vision model: {} via {}",
            config.openai.model,
            config.openai.api_base
        );
    } else {
        log::warn!("⚠️  OPENAI_API_KEY not set, analyses will return canned mock results");
    }

    let gateway_mode = |key: &Option<secrecy::SecretString>| if key.is_some() { "live" } else { "mock" };
    log::info!("Stripe gateway: {}", gateway_mode(&config.stripe_secret_key));
    log::info!("YooKassa gateway: {}", gateway_mode(&config.yookassa_secret_key));
    log::info!(
        "Pro subscription: {} {} (bot uses {})",
        config.pro_subscription_price,
        config.payment_currency,
        config.default_payment_provider
    );

    if config.webhook_secret.is_some() {
        log::info!("✅ Payment webhooks require X-Webhook-Secret");
    } else {
        log::warn!("⚠️  PAYMENT_WEBHOOK_SECRET not set, payment webhooks are unauthenticated");
    }

    log::info!("Free attempts per new user: {}", config.free_attempts);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
