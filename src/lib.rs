//! Wordzen - Telegram bot selling access to an English-learning book catalog
//!
//! Visitors register through a short wizard (source, optional promo code,
//! email, contact handle, three books) and get a free trial. Payment receipts
//! are reviewed by admins, and a periodic sweep deactivates subscribers whose
//! paid-through date passed without payment.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, session tracking, wizard rules and the sweep
//! - `storage`: database pool, subscriber ledger and message log
//! - `telegram`: Telegram bot integration and handlers

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, Config};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
