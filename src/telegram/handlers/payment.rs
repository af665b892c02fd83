//! Payment wizard and admin review

use teloxide::prelude::*;
use teloxide::types::MessageId;

use super::types::{today, HandlerDeps, HandlerResult, NOT_REGISTERED};
use crate::core::session::{SessionData, Step};
use crate::storage::get_connection;
use crate::storage::ledger;
use crate::telegram::format::{display_date, receipt_notice};
use crate::telegram::keyboards::{review_keyboard, tariff_keyboard};
use crate::telegram::notifications::{forward_receipt, Receipt};

/// Tariff choice for a registered subscriber.
pub async fn send_payment_options(bot: &Bot, deps: &HandlerDeps, user_id: i64) -> HandlerResult {
    let subscriber = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_subscriber(&conn, user_id)?
    };
    let Some(subscriber) = subscriber else {
        bot.send_message(ChatId(user_id), NOT_REGISTERED).await?;
        return Ok(());
    };

    bot.send_message(ChatId(user_id), "💳 Выберите тариф:")
        .reply_markup(tariff_keyboard(&deps.config, user_id, subscriber.has_promo()))
        .await?;
    Ok(())
}

/// Tariff button: opens the payment wizard and asks for the receipt.
pub async fn select_tariff(bot: &Bot, deps: &HandlerDeps, caller: i64, months: u32, target: i64) -> HandlerResult {
    if caller != target {
        log::warn!("User {} pressed a tariff button issued to {}", caller, target);
        return Ok(());
    }
    if !deps.config.tariff_months.contains(&months) {
        log::warn!("User {} picked a tariff that is no longer offered: {} month(s)", caller, months);
        return send_payment_options(bot, deps, caller).await;
    }

    let subscriber = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_subscriber(&conn, caller)?
    };
    let Some(subscriber) = subscriber else {
        bot.send_message(ChatId(caller), NOT_REGISTERED).await?;
        return Ok(());
    };

    deps.sessions.begin(caller, Step::TariffSelected).await;
    deps.sessions
        .update(
            caller,
            SessionData {
                months: Some(months),
                ..Default::default()
            },
        )
        .await;
    deps.sessions.advance(caller, Step::AwaitingReceipt).await;
    log::info!("User {} selected a {} month tariff", caller, months);

    bot.send_message(
        ChatId(caller),
        format!(
            "💳 Тариф: {} мес. по {}\n\n\
             Переведите оплату на карту:\n{}\n\n\
             Затем отправьте сюда чек: фото, файл или текст.",
            months,
            deps.config.price_for(subscriber.has_promo()),
            deps.config.card_number
        ),
    )
    .await?;
    Ok(())
}

/// Terminal payment step: forwards the receipt for review.
///
/// Payment is never confirmed here; the session stays open if no admin could
/// be reached so the user can send the receipt again.
pub async fn handle_receipt(bot: &Bot, deps: &HandlerDeps, user_id: i64, receipt: Receipt) -> HandlerResult {
    let months = deps
        .sessions
        .data(user_id)
        .await
        .and_then(|d| d.months)
        .unwrap_or(1);

    let subscriber = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_subscriber(&conn, user_id)?
    };
    let Some(subscriber) = subscriber else {
        deps.sessions.end(user_id).await;
        bot.send_message(ChatId(user_id), NOT_REGISTERED).await?;
        return Ok(());
    };

    let caption = receipt_notice(&subscriber, months, deps.config.price_for(subscriber.has_promo()));
    let delivered = forward_receipt(
        bot,
        &deps.config.admin_ids,
        &caption,
        &receipt,
        review_keyboard(user_id, months),
    )
    .await;

    if delivered == 0 {
        log::error!("Receipt of user {} reached no admin", user_id);
        bot.send_message(
            ChatId(user_id),
            "⚠️ Не удалось отправить чек администратору. Попробуйте отправить его ещё раз позже.",
        )
        .await?;
        return Ok(());
    }

    deps.sessions.end(user_id).await;
    log::info!("Receipt of user {} forwarded to {} admin(s)", user_id, delivered);
    bot.send_message(
        ChatId(user_id),
        "✅ Чек отправлен на проверку. Мы сообщим, когда оплата будет подтверждена.",
    )
    .await?;
    Ok(())
}

/// Drops the review buttons from a decided receipt message.
async fn close_review(bot: &Bot, review: Option<(ChatId, MessageId)>) {
    let Some((chat_id, message_id)) = review else {
        return;
    };
    if let Err(e) = bot.edit_message_reply_markup(chat_id, message_id).await {
        log::warn!(
            "Failed to remove review buttons from message {} in chat {}: {}",
            message_id.0,
            chat_id,
            e
        );
    }
}

/// Admin approve button. `review` is the receipt message the button sits under.
pub async fn approve_payment(
    bot: &Bot,
    deps: &HandlerDeps,
    admin_id: i64,
    user_id: i64,
    months: u32,
    bonus_months: u32,
    review: Option<(ChatId, MessageId)>,
) -> HandlerResult {
    if !deps.is_admin(admin_id) {
        log::warn!("Non-admin {} tried to approve a payment of {}", admin_id, user_id);
        return Ok(());
    }

    let updated = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::confirm_payment(&conn, user_id, months, bonus_months, today())?
    };
    close_review(bot, review).await;
    let Some(subscriber) = updated else {
        bot.send_message(ChatId(admin_id), format!("❌ Подписчик {} не найден.", user_id))
            .await?;
        return Ok(());
    };

    log::info!(
        "Admin {} approved payment of {}: {} + {} month(s)",
        admin_id,
        user_id,
        months,
        bonus_months
    );

    let bonus_note = if bonus_months > 0 {
        format!(" (включая {} мес. в подарок 🎁)", bonus_months)
    } else {
        String::new()
    };
    if let Err(e) = bot
        .send_message(
            ChatId(user_id),
            format!(
                "🎉 Оплата подтверждена! Доступ продлён на {} мес.{}\n⏳ Доступ до {}",
                months + bonus_months,
                bonus_note,
                display_date(subscriber.payment_due)
            ),
        )
        .await
    {
        log::warn!("Failed to tell user {} about the approved payment: {}", user_id, e);
    }

    bot.send_message(
        ChatId(admin_id),
        format!(
            "✅ Оплата {} подтверждена: {} мес., доступ до {}",
            user_id,
            months + bonus_months,
            display_date(subscriber.payment_due)
        ),
    )
    .await?;
    Ok(())
}

/// Admin reject button
pub async fn reject_payment(
    bot: &Bot,
    deps: &HandlerDeps,
    admin_id: i64,
    user_id: i64,
    review: Option<(ChatId, MessageId)>,
) -> HandlerResult {
    if !deps.is_admin(admin_id) {
        log::warn!("Non-admin {} tried to reject a payment of {}", admin_id, user_id);
        return Ok(());
    }

    log::info!("Admin {} rejected payment of {}", admin_id, user_id);
    close_review(bot, review).await;
    if let Err(e) = bot
        .send_message(
            ChatId(user_id),
            "❌ Оплата не подтверждена. Проверьте чек или напишите администратору через меню.",
        )
        .await
    {
        log::warn!("Failed to tell user {} about the rejected payment: {}", user_id, e);
    }
    bot.send_message(ChatId(admin_id), format!("❌ Оплата {} отклонена.", user_id))
        .await?;
    Ok(())
}
