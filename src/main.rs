use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::signal;

use life_analyzer::analysis::{AnalysisService, MockAnalyzer, OpenAiVisionClient, VisionAnalyzer};
use life_analyzer::cli::{Cli, Commands};
use life_analyzer::core::users::UserService;
use life_analyzer::core::web_server::{start_web_server, AppState};
use life_analyzer::core::{config, init_logger, log_startup_configuration, metrics, Config};
use life_analyzer::payments::{PaymentGateways, PaymentService};
use life_analyzer::storage::create_pool;
use life_analyzer::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the selected subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    let config = Config::from_env()?;

    match cli.command() {
        Commands::Migrate => {
            create_pool(&config.database_path)?;
            log::info!("Database {} is up to date", config.database_path);
            Ok(())
        }
        Commands::Run { http_only } => run(config, http_only).await,
    }
}

async fn run(config: Config, http_only: bool) -> Result<()> {
    log_startup_configuration(&config);
    metrics::init_metrics();

    let db_pool = Arc::new(create_pool(&config.database_path)?);

    let analyzer: Arc<dyn VisionAnalyzer> = match OpenAiVisionClient::from_config(&config.openai)? {
        Some(client) => Arc::new(client),
        None => Arc::new(MockAnalyzer),
    };

    let users = UserService::new(Arc::clone(&db_pool), config.free_attempts);
    let analysis = AnalysisService::new(Arc::clone(&db_pool), analyzer);
    let payments = PaymentService::new(
        Arc::clone(&db_pool),
        PaymentGateways::from_config(&config),
        config.pro_subscription_price,
        config.payment_currency.clone(),
    );

    let bot = if http_only {
        log::info!("Running in HTTP-only mode, the Telegram bot is disabled");
        None
    } else {
        Some(create_bot(config.bot_token()?)?)
    };

    let state = AppState {
        users: users.clone(),
        analysis: analysis.clone(),
        payments: payments.clone(),
        webhook_secret: config.webhook_secret.clone().map(Arc::new),
        bot: bot.clone(),
    };

    let port = config.port;
    let mut server = tokio::spawn(async move {
        if let Err(e) = start_web_server(port, state).await {
            log::error!("Web server error: {}", e);
        }
    });

    let Some(bot) = bot else {
        tokio::select! {
            _ = &mut server => log::warn!("Web server stopped"),
            _ = signal::ctrl_c() => log::info!("Received Ctrl-C, shutting down"),
        }
        server.abort();
        return Ok(());
    };

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let deps = HandlerDeps::new(users, analysis, payments, config.default_payment_provider);

    log::info!("Starting Telegram bot dispatcher");
    Dispatcher::builder(bot, schema(deps))
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    server.abort();
    Ok(())
}
