//! Support conversation log between subscribers and admins
//!
//! The log is append-only: rows are never updated or removed, not even when
//! the subscriber is deleted.

use rusqlite::{params, Connection, Result};

/// One logged support message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    /// true when the subscriber wrote it, false for admin replies
    pub is_from_user: bool,
    pub created_at: String,
}

/// Appends a message to a subscriber's support log.
pub fn add_message(conn: &Connection, user_id: i64, text: &str, is_from_user: bool) -> Result<i64> {
    conn.execute(
        "INSERT INTO messages (user_id, message_text, is_from_user) VALUES (?1, ?2, ?3)",
        params![user_id, text, is_from_user as i32],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The full support log of a subscriber, oldest first.
pub fn get_user_messages(conn: &Connection, user_id: i64) -> Result<Vec<LoggedMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, message_text, is_from_user, created_at
         FROM messages WHERE user_id = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(LoggedMessage {
            id: row.get(0)?,
            user_id: row.get(1)?,
            text: row.get(2)?,
            is_from_user: row.get::<_, i32>(3)? != 0,
            created_at: row.get(4)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}
