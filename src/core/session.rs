//! Per-user wizard sessions.
//!
//! A session holds the current wizard [`Step`] and the fields collected so
//! far. Sessions are ephemeral: they live in memory, are keyed by Telegram user
//! id and are discarded when the wizard completes or the user cancels.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::types::Source;

/// Wizard step a user is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    // Registration
    Source,
    Promo,
    Email,
    TelegramHandle,
    BookSelection,
    // Payment
    TariffSelected,
    AwaitingReceipt,
    // Support
    MessageToAdmin,
    ReplyToUser,
    // Re-selection of books by an existing subscriber
    ResetBooks,
}

impl Step {
    /// Steps that consume the next free-text message.
    pub fn expects_text(&self) -> bool {
        matches!(
            self,
            Step::Promo
                | Step::Email
                | Step::TelegramHandle
                | Step::BookSelection
                | Step::AwaitingReceipt
                | Step::MessageToAdmin
                | Step::ReplyToUser
                | Step::ResetBooks
        )
    }

    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Step::Source | Step::Promo | Step::Email | Step::TelegramHandle | Step::BookSelection
        )
    }
}

/// Fields collected by a wizard. `None` means "not collected yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub source: Option<Source>,
    pub promo_code: Option<String>,
    pub email: Option<String>,
    pub telegram: Option<String>,
    /// 0-based catalog indices in selection order
    pub books: Option<Vec<usize>>,
    /// Month count chosen on the tariff keyboard
    pub months: Option<u32>,
    /// User an admin is replying to
    pub target_user: Option<i64>,
}

impl SessionData {
    /// Copies every field set in `other` over `self`, leaving the rest untouched.
    pub fn merge(&mut self, other: SessionData) {
        if other.source.is_some() {
            self.source = other.source;
        }
        if other.promo_code.is_some() {
            self.promo_code = other.promo_code;
        }
        if other.email.is_some() {
            self.email = other.email;
        }
        if other.telegram.is_some() {
            self.telegram = other.telegram;
        }
        if other.books.is_some() {
            self.books = other.books;
        }
        if other.months.is_some() {
            self.months = other.months;
        }
        if other.target_user.is_some() {
            self.target_user = other.target_user;
        }
    }

    pub fn selected_books(&self) -> &[usize] {
        self.books.as_deref().unwrap_or(&[])
    }
}

/// A user's active wizard session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    pub data: SessionData,
}

/// Session storage used by the handlers.
///
/// Operations on a user without a session are silent no-ops.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Starts a fresh session at `step`, replacing any previous one.
    async fn begin(&self, user_id: i64, step: Step);

    /// Merges `fields` into the collected data. Ignored without a session.
    async fn update(&self, user_id: i64, fields: SessionData);

    /// Moves an existing session to `step`, keeping the collected data.
    async fn advance(&self, user_id: i64, step: Step);

    async fn current_step(&self, user_id: i64) -> Option<Step>;

    async fn data(&self, user_id: i64) -> Option<SessionData>;

    /// Discards the session. Returns the step it was in, if any.
    async fn end(&self, user_id: i64) -> Option<Step>;
}

/// In-memory [`SessionStore`]
#[derive(Clone, Default)]
pub struct InMemorySessions {
    sessions: Arc<Mutex<HashMap<i64, Session>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users currently inside a wizard
    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn begin(&self, user_id: i64, step: Step) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            user_id,
            Session {
                step,
                data: SessionData::default(),
            },
        );
        log::debug!("Session started for user {} at {:?}", user_id, step);
    }

    async fn update(&self, user_id: i64, fields: SessionData) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&user_id) {
            session.data.merge(fields);
        }
    }

    async fn advance(&self, user_id: i64, step: Step) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&user_id) {
            log::debug!("User {}: {:?} -> {:?}", user_id, session.step, step);
            session.step = step;
        }
    }

    async fn current_step(&self, user_id: i64) -> Option<Step> {
        self.sessions.lock().await.get(&user_id).map(|s| s.step)
    }

    async fn data(&self, user_id: i64) -> Option<SessionData> {
        self.sessions.lock().await.get(&user_id).map(|s| s.data.clone())
    }

    async fn end(&self, user_id: i64) -> Option<Step> {
        self.sessions.lock().await.remove(&user_id).map(|s| s.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_fields_not_in_update() {
        let mut data = SessionData {
            email: Some("a@x.io".to_string()),
            ..Default::default()
        };
        data.merge(SessionData {
            telegram: Some("@reader".to_string()),
            ..Default::default()
        });
        assert_eq!(data.email.as_deref(), Some("a@x.io"));
        assert_eq!(data.telegram.as_deref(), Some("@reader"));
    }

    #[test]
    fn selected_books_defaults_to_empty() {
        assert!(SessionData::default().selected_books().is_empty());
    }

    #[tokio::test]
    async fn update_without_session_is_ignored() {
        let sessions = InMemorySessions::new();
        sessions
            .update(
                1,
                SessionData {
                    email: Some("a@x.io".to_string()),
                    ..Default::default()
                },
            )
            .await;
        sessions.advance(1, Step::Email).await;
        assert_eq!(sessions.current_step(1).await, None);
        assert_eq!(sessions.data(1).await, None);
    }

    #[tokio::test]
    async fn begin_overwrites_previous_session() {
        let sessions = InMemorySessions::new();
        sessions.begin(1, Step::Email).await;
        sessions
            .update(
                1,
                SessionData {
                    email: Some("a@x.io".to_string()),
                    ..Default::default()
                },
            )
            .await;

        sessions.begin(1, Step::TariffSelected).await;
        assert_eq!(sessions.current_step(1).await, Some(Step::TariffSelected));
        assert_eq!(sessions.data(1).await, Some(SessionData::default()));
    }

    #[tokio::test]
    async fn sessions_are_per_user() {
        let sessions = InMemorySessions::new();
        sessions.begin(1, Step::Source).await;
        sessions.begin(2, Step::Email).await;

        assert_eq!(sessions.end(1).await, Some(Step::Source));
        assert_eq!(sessions.current_step(1).await, None);
        assert_eq!(sessions.current_step(2).await, Some(Step::Email));
        assert_eq!(sessions.active_count().await, 1);
    }
}
