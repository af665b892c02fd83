//! Telegram bot integration and handlers

pub mod bot;
pub mod callbacks;
pub mod format;
pub mod handlers;
pub mod keyboards;
pub mod notifications;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps};
pub use notifications::TelegramNotifier;
