//! Configuration, errors, logging and the bot's transport-independent logic

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod sweep;
pub mod types;
pub mod wizard;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_configuration};
