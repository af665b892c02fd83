//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
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

/// Logs the effective configuration at startup, without secrets.
pub fn log_configuration(config: &crate::core::config::Config) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Wordzen configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Database: {}", config.database_path);
    log::info!("Admins: {}", config.admin_ids.len());
    log::info!("Catalog: {} books", config.books.len());
    log::info!("Tariffs (months): {:?}", config.tariff_months);
    log::info!("Seeded promo codes: {}", config.promo_codes.len());
    log::info!("Trial: {} days", config.trial_days);
    log::info!("Sweep interval: {}h", config.sweep_interval_hours);
    if config.card_number.starts_with("1234") {
        log::warn!("⚠️  CARD_NUMBER is not set, using the placeholder card");
    }
}
