//! Support messages between subscribers and admins

use teloxide::prelude::*;

use super::types::{HandlerDeps, HandlerResult};
use crate::core::session::{SessionData, Step};
use crate::storage::get_connection;
use crate::storage::messages::add_message;
use crate::telegram::format::fit_message;
use crate::telegram::keyboards::reply_keyboard;
use crate::telegram::notifications::notify_admins;

pub async fn start_message_to_admin(bot: &Bot, deps: &HandlerDeps, user_id: i64) -> HandlerResult {
    deps.sessions.begin(user_id, Step::MessageToAdmin).await;
    bot.send_message(
        ChatId(user_id),
        "✉️ Напишите сообщение администратору одним сообщением. /cancel, чтобы отменить.",
    )
    .await?;
    Ok(())
}

/// Relays a support message to every admin.
///
/// The message is logged and the session closed only once an admin got it;
/// otherwise the user stays in the step and can send it again.
pub async fn handle_message_to_admin(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    text: &str,
    username: Option<&str>,
) -> HandlerResult {
    let from = username.map(|u| format!(" (@{})", u)).unwrap_or_default();
    let delivered = notify_admins(
        bot,
        &deps.config.admin_ids,
        &format!("✉️ Сообщение от {}{}:\n\n{}", user_id, from, text),
        Some(reply_keyboard(user_id)),
    )
    .await;

    if delivered == 0 {
        log::error!("Support message of user {} reached no admin", user_id);
        bot.send_message(
            ChatId(user_id),
            "⚠️ Не удалось отправить сообщение администратору. Попробуйте ещё раз позже.",
        )
        .await?;
        return Ok(());
    }

    {
        let conn = get_connection(&deps.db_pool)?;
        add_message(&conn, user_id, text, true)?;
    }
    deps.sessions.end(user_id).await;
    log::info!("Support message of user {} relayed to {} admin(s)", user_id, delivered);

    bot.send_message(ChatId(user_id), "✅ Сообщение отправлено. Администратор ответит здесь.")
        .await?;
    Ok(())
}

/// Admin pressed "reply" under a support message.
pub async fn start_reply(bot: &Bot, deps: &HandlerDeps, admin_id: i64, target: i64) -> HandlerResult {
    if !deps.is_admin(admin_id) {
        log::warn!("Non-admin {} pressed a reply button for {}", admin_id, target);
        return Ok(());
    }

    deps.sessions.begin(admin_id, Step::ReplyToUser).await;
    deps.sessions
        .update(
            admin_id,
            SessionData {
                target_user: Some(target),
                ..Default::default()
            },
        )
        .await;
    bot.send_message(ChatId(admin_id), format!("↩️ Введите ответ для {}:", target))
        .await?;
    Ok(())
}

pub async fn handle_reply(bot: &Bot, deps: &HandlerDeps, admin_id: i64, text: &str) -> HandlerResult {
    let target = deps.sessions.data(admin_id).await.and_then(|d| d.target_user);
    deps.sessions.end(admin_id).await;
    let Some(target) = target else {
        return Ok(());
    };

    if let Err(e) = bot
        .send_message(ChatId(target), fit_message(&format!("✉️ Ответ администратора:\n\n{}", text)))
        .await
    {
        log::warn!("Failed to deliver admin reply to {}: {}", target, e);
        bot.send_message(ChatId(admin_id), format!("❌ Не удалось доставить ответ пользователю {}.", target))
            .await?;
        return Ok(());
    }

    {
        let conn = get_connection(&deps.db_pool)?;
        add_message(&conn, target, text, false)?;
    }
    log::info!("Admin {} replied to {}", admin_id, target);
    bot.send_message(ChatId(admin_id), "✅ Ответ отправлен.").await?;
    Ok(())
}
