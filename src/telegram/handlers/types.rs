//! Handler types, dependencies and shared reply helpers

use std::sync::Arc;

use chrono::NaiveDate;
use teloxide::prelude::*;

use crate::core::config::Config;
use crate::core::error::AppError;
use crate::core::session::SessionStore;
use crate::storage::db::DbPool;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of the individual handlers. Errors are reported by the schema.
pub type HandlerResult = Result<(), AppError>;

/// Reply shown when the ledger is unavailable
pub const TRY_AGAIN_LATER: &str = "⚠️ Что-то пошло не так. Пожалуйста, попробуйте позже.";

/// Reply for an operation on an id the ledger does not know
pub const NOT_REGISTERED: &str = "Вы ещё не зарегистрированы. Нажмите /start, чтобы начать.";

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<Config>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>, sessions: Arc<dyn SessionStore>, config: Arc<Config>) -> Self {
        Self {
            db_pool,
            sessions,
            config,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.config.is_admin(user_id)
    }
}

/// Calendar date used for all ledger date arithmetic
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Telegram user id of a message sender
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// Telegram user id of a callback sender
pub fn callback_sender_id(q: &CallbackQuery) -> Option<i64> {
    i64::try_from(q.from.id.0).ok()
}

/// Logs a failed handler and tells the user when the failure is on our side.
pub async fn report_failure(bot: &Bot, chat_id: ChatId, context: &str, err: AppError) {
    let reply = match &err {
        AppError::Telegram(e) => {
            log::warn!("{}: delivery to {} failed: {}", context, chat_id, e);
            return;
        }
        AppError::NotFound(what) => {
            log::info!("{}: {} not found", context, what);
            format!("Не найдено: {}", what)
        }
        AppError::Validation(reason) => {
            log::info!("{}: rejected input from {}: {}", context, chat_id, reason);
            reason.clone()
        }
        _ if err.is_persistence() => {
            log::error!("{}: ledger unavailable for chat {}: {}", context, chat_id, err);
            TRY_AGAIN_LATER.to_string()
        }
        _ => {
            log::error!("{} failed for chat {}: {}", context, chat_id, err);
            TRY_AGAIN_LATER.to_string()
        }
    };

    if let Err(e) = bot.send_message(chat_id, reply).await {
        log::warn!("{}: could not report the failure to {}: {}", context, chat_id, e);
    }
}
