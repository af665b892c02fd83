//! Database pool, migrations, subscriber ledger and the support message log

pub mod db;
pub mod ledger;
pub mod messages;
pub mod migrations;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
