//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! Handlers take their dependencies explicitly, so integration tests can build
//! the same tree as production code.

pub mod admin;
pub mod payment;
pub mod profile;
pub mod registration;
mod router;
mod schema;
pub mod support;
mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError, HandlerResult};
