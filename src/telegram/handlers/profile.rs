//! Main menu, profile view and book re-selection

use teloxide::prelude::*;

use super::payment::send_payment_options;
use super::registration::send_book_picker;
use super::types::{today, HandlerDeps, HandlerResult, NOT_REGISTERED};
use crate::core::error::AppError;
use crate::core::session::{SessionData, Step};
use crate::storage::get_connection;
use crate::storage::ledger::{self, Subscriber};
use crate::telegram::format::profile_text;
use crate::telegram::keyboards::{main_menu_keyboard, profile_keyboard, start_keyboard};
use crate::telegram::notifications::notify_admins;

pub async fn send_main_menu(bot: &Bot, user_id: i64) -> HandlerResult {
    bot.send_message(ChatId(user_id), "📋 Главное меню")
        .reply_markup(main_menu_keyboard())
        .await?;
    Ok(())
}

/// Entry point for users that are already in the ledger.
///
/// Active subscribers get the menu, deactivated ones go straight to payment.
pub async fn send_returning_user(bot: &Bot, deps: &HandlerDeps, subscriber: &Subscriber) -> HandlerResult {
    if subscriber.is_active {
        bot.send_message(ChatId(subscriber.user_id), "👋 С возвращением!").await?;
        send_main_menu(bot, subscriber.user_id).await
    } else {
        log::info!("Deactivated subscriber {} returned, offering payment", subscriber.user_id);
        bot.send_message(
            ChatId(subscriber.user_id),
            "⛔ Ваш доступ приостановлен. Оплатите подписку, чтобы продолжить.",
        )
        .await?;
        send_payment_options(bot, deps, subscriber.user_id).await
    }
}

pub async fn show_profile(bot: &Bot, deps: &HandlerDeps, user_id: i64) -> HandlerResult {
    let subscriber = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_subscriber(&conn, user_id)?
    };
    match subscriber {
        Some(subscriber) => {
            bot.send_message(ChatId(user_id), profile_text(&subscriber, &deps.config, today()))
                .reply_markup(profile_keyboard(user_id))
                .await?;
        }
        None => {
            bot.send_message(ChatId(user_id), NOT_REGISTERED)
                .reply_markup(start_keyboard())
                .await?;
        }
    }
    Ok(())
}

/// Clears the stored books of `user_id` and opens the picker in their chat.
///
/// Used both by the subscriber's own button and by the admin `/reset` command.
pub async fn begin_book_reset(bot: &Bot, deps: &HandlerDeps, user_id: i64) -> Result<bool, AppError> {
    let cleared = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::reset_books(&conn, user_id)?
    };
    if !cleared {
        return Ok(false);
    }

    deps.sessions.begin(user_id, Step::ResetBooks).await;
    deps.sessions
        .update(
            user_id,
            SessionData {
                books: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await;
    log::info!("Book selection reset for user {}", user_id);
    send_book_picker(bot, deps, user_id, &[]).await?;
    Ok(true)
}

/// Subscriber pressed "choose books again" on their profile.
pub async fn reset_own_books(bot: &Bot, deps: &HandlerDeps, caller: i64, target: i64) -> HandlerResult {
    if caller != target {
        log::warn!("User {} pressed a book reset button for {}", caller, target);
        return Ok(());
    }
    if !begin_book_reset(bot, deps, caller).await? {
        bot.send_message(ChatId(caller), NOT_REGISTERED).await?;
    }
    Ok(())
}

/// Terminal step of a book re-selection.
pub async fn store_new_books(bot: &Bot, deps: &HandlerDeps, user_id: i64, books: Vec<String>) -> HandlerResult {
    deps.sessions.end(user_id).await;
    let stored = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::set_books(&conn, user_id, &books)?
    };
    if !stored {
        bot.send_message(ChatId(user_id), NOT_REGISTERED).await?;
        return Ok(());
    }

    let label = books.join(", ");
    bot.send_message(ChatId(user_id), format!("✅ Книги обновлены: {}", label))
        .await?;
    send_main_menu(bot, user_id).await?;
    notify_admins(
        bot,
        &deps.config.admin_ids,
        &format!("📚 Подписчик {} выбрал новые книги: {}", user_id, label),
        None,
    )
    .await;
    Ok(())
}
