//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use tempfile::TempDir;
use wordzen::core::types::Source;
use wordzen::storage::ledger::{self, NewSubscriber, Registration};
use wordzen::storage::{create_pool, get_connection, DbPool};

/// File-backed pool in a temporary directory. Keep the `TempDir` alive for the
/// duration of the test.
pub fn test_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wordzen.sqlite");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    (dir, pool)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn books() -> Vec<String> {
    vec!["Essential 1".to_string(), "Essential 2".to_string(), "Essential 3".to_string()]
}

/// Registers `user_id` on `today` with a 3-day trial and no promo code.
pub fn register(pool: &DbPool, user_id: i64, today: NaiveDate) -> Registration {
    register_with_promo(pool, user_id, today, None)
}

pub fn register_with_promo(pool: &DbPool, user_id: i64, today: NaiveDate, promo: Option<&str>) -> Registration {
    let conn = get_connection(pool).unwrap();
    let email = format!("user{}@mail.uz", user_id);
    let telegram = format!("@user{}", user_id);
    let books = books();
    let new = NewSubscriber {
        user_id,
        source: if promo.is_some() { Source::Teacher } else { Source::Instagram },
        email: &email,
        telegram: &telegram,
        books: &books,
        promo_code: promo,
    };
    ledger::register_subscriber(&conn, &new, today, 3).unwrap()
}
