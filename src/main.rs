use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use wordzen::cli::{Cli, Commands};
use wordzen::core::session::InMemorySessions;
use wordzen::core::sweep::{run_sweep, spawn_sweep_task, Notifier};
use wordzen::core::{init_logger, log_configuration, Config};
use wordzen::storage::{create_pool, get_connection, ledger, DbPool};
use wordzen::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramNotifier};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (configuration, logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    let config = Arc::new(Config::from_env()?);
    init_logger(&config.log_file_path)?;
    log_configuration(&config);

    let db_pool = Arc::new(
        create_pool(&config.database_path).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );
    seed_promos(&db_pool, &config)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot(config, db_pool).await,
        Some(Commands::Sweep) => run_single_sweep(config, db_pool).await,
        Some(Commands::SeedPromos) => {
            log::info!("Promo codes seeded, exiting");
            Ok(())
        }
    }
}

fn seed_promos(db_pool: &DbPool, config: &Config) -> Result<()> {
    let conn = get_connection(db_pool)?;
    ledger::seed_promo_codes(&conn, &config.promo_codes, config.promo_bonus_days)?;
    Ok(())
}

/// One sweep pass for today, for use from an external scheduler
async fn run_single_sweep(config: Arc<Config>, db_pool: Arc<DbPool>) -> Result<()> {
    let bot = create_bot(&config)?;
    let notifier = TelegramNotifier::new(bot);
    let today = chrono::Local::now().date_naive();

    let report = run_sweep(&db_pool, &notifier, &config.admin_ids, today).await?;
    log::info!(
        "Sweep done: deactivated {:?}, reminded {:?}, {} failed deliveries",
        report.deactivated,
        report.reminded,
        report.failed_deliveries
    );
    Ok(())
}

async fn run_bot(config: Arc<Config>, db_pool: Arc<DbPool>) -> Result<()> {
    log::info!("Starting Wordzen bot...");
    let bot = create_bot(&config)?;

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));
    let sweep = spawn_sweep_task(
        Arc::clone(&db_pool),
        notifier,
        config.admin_ids.clone(),
        config.sweep_interval_hours,
    );

    let deps = HandlerDeps::new(db_pool, Arc::new(InMemorySessions::new()), config);

    // Create polling listener that drops pending updates on start
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    sweep.abort();
    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
