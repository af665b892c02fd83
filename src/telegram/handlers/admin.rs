//! Admin commands

use teloxide::prelude::*;

use super::profile::begin_book_reset;
use super::types::{HandlerDeps, HandlerResult};
use crate::core::config::billing::MAX_GRANT_DAYS;
use crate::core::error::AppError;
use crate::storage::get_connection;
use crate::storage::ledger;
use crate::storage::messages::get_user_messages;
use crate::telegram::bot::parse_user_id_arg;
use crate::telegram::format::{history_line, promo_row, split_messages, stats_text, user_row};

const NO_PERMISSION: &str = "❌ У вас нет прав для этой команды.";

/// Replies with the permission error and returns false for non-admins.
async fn ensure_admin(bot: &Bot, deps: &HandlerDeps, user_id: i64, command: &str) -> Result<bool, AppError> {
    if deps.is_admin(user_id) {
        return Ok(true);
    }
    log::warn!("User {} tried to use {} without permission", user_id, command);
    bot.send_message(ChatId(user_id), NO_PERMISSION).await?;
    Ok(false)
}

fn user_id_arg(arg: &str, usage: &str) -> Result<i64, AppError> {
    parse_user_id_arg(arg).ok_or_else(|| AppError::Validation(format!("Использование: {}", usage)))
}

async fn send_chunks(bot: &Bot, chat_id: ChatId, header: &str, lines: &[String]) -> HandlerResult {
    for chunk in split_messages(header, lines) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

pub async fn handle_users_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/users").await? {
        return Ok(());
    }

    let subscribers = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_all_subscribers(&conn)?
    };
    if subscribers.is_empty() {
        bot.send_message(ChatId(admin_id), "👥 Подписчиков пока нет.").await?;
        return Ok(());
    }

    let header = format!("👥 Подписчики (всего: {})\n", subscribers.len());
    let lines: Vec<String> = subscribers.iter().map(user_row).collect();
    send_chunks(bot, ChatId(admin_id), &header, &lines).await
}

pub async fn handle_stats_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/stats").await? {
        return Ok(());
    }

    let stats = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_stats(&conn)?
    };
    bot.send_message(ChatId(admin_id), stats_text(&stats)).await?;
    Ok(())
}

pub async fn handle_promo_stats_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/promo_stats").await? {
        return Ok(());
    }

    let promos = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::list_promos(&conn)?
    };
    if promos.is_empty() {
        bot.send_message(ChatId(admin_id), "🎟 Промокодов нет.").await?;
        return Ok(());
    }
    let lines: Vec<String> = promos.iter().map(promo_row).collect();
    send_chunks(bot, ChatId(admin_id), "🎟 Промокоды\n", &lines).await
}

/// Parses `<cap|0> <bonus_days>`; a cap of 0 means unlimited.
/// Bonus days are limited to `MAX_GRANT_DAYS`.
pub fn parse_promo_new_args(args: &str) -> Option<(Option<i64>, i64)> {
    let mut parts = args.split_whitespace();
    let cap: i64 = parts.next()?.parse().ok()?;
    let bonus_days: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || cap < 0 || !(0..=MAX_GRANT_DAYS).contains(&bonus_days) {
        return None;
    }
    Some(((cap > 0).then_some(cap), bonus_days))
}

/// Random one-off code such as `WZ3F9A1C`
pub fn generate_promo_code() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("WZ{}", &id[..6])
}

pub async fn handle_promo_new_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64, args: &str) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/promo_new").await? {
        return Ok(());
    }
    let (cap, bonus_days) = parse_promo_new_args(args).ok_or_else(|| {
        AppError::Validation(format!(
            "Использование: /promo_new <лимит|0> <дни до {}>, например /promo_new 10 7",
            MAX_GRANT_DAYS
        ))
    })?;

    let code = {
        let conn = get_connection(&deps.db_pool)?;
        let mut attempts = 0;
        loop {
            let candidate = generate_promo_code();
            if ledger::create_promo(&conn, &candidate, Some("admin"), cap, bonus_days)? {
                break candidate;
            }
            attempts += 1;
            if attempts >= 5 {
                return Err(AppError::Validation("Не удалось создать уникальный промокод, попробуйте ещё раз.".to_string()));
            }
        }
    };

    log::info!(
        "Admin {} created promo code {} (cap={:?}, bonus_days={})",
        admin_id,
        code,
        cap,
        bonus_days
    );
    let cap_label = cap.map(|c| c.to_string()).unwrap_or_else(|| "без лимита".to_string());
    bot.send_message(
        ChatId(admin_id),
        format!(
            "✅ Промокод создан: {}\nЛимит: {}\nБонус: +{} дн.",
            code, cap_label, bonus_days
        ),
    )
    .await?;
    Ok(())
}

pub async fn handle_promo_reset_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64, args: &str) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/promo_reset").await? {
        return Ok(());
    }
    let code = args
        .split_whitespace()
        .next()
        .ok_or_else(|| AppError::Validation("Использование: /promo_reset <код>".to_string()))?;

    let reset = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::reset_promo_usage(&conn, code)?
    };
    if !reset {
        return Err(AppError::NotFound(format!("промокод {}", code.to_uppercase())));
    }

    log::info!("Admin {} reset promo code {}", admin_id, code.to_uppercase());
    bot.send_message(
        ChatId(admin_id),
        format!("✅ Счётчик промокода {} обнулён.", code.to_uppercase()),
    )
    .await?;
    Ok(())
}

pub async fn handle_reset_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64, args: &str) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/reset").await? {
        return Ok(());
    }
    let user_id = user_id_arg(args, "/reset <id>")?;

    if !begin_book_reset(bot, deps, user_id).await? {
        return Err(AppError::NotFound(format!("подписчик {}", user_id)));
    }
    log::info!("Admin {} reset books of {}", admin_id, user_id);
    bot.send_message(
        ChatId(admin_id),
        format!("✅ Книги подписчика {} сброшены, ему отправлен выбор.", user_id),
    )
    .await?;
    Ok(())
}

pub async fn handle_delete_user_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64, args: &str) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/delete_user").await? {
        return Ok(());
    }
    let user_id = user_id_arg(args, "/delete_user <id>")?;

    let deleted = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::delete_subscriber(&conn, user_id)?
    };
    if !deleted {
        return Err(AppError::NotFound(format!("подписчик {}", user_id)));
    }
    deps.sessions.end(user_id).await;

    log::info!("Admin {} deleted subscriber {}", admin_id, user_id);
    bot.send_message(ChatId(admin_id), format!("🗑 Подписчик {} удалён.", user_id))
        .await?;
    Ok(())
}

pub async fn handle_history_command(bot: &Bot, deps: &HandlerDeps, admin_id: i64, args: &str) -> HandlerResult {
    if !ensure_admin(bot, deps, admin_id, "/history").await? {
        return Ok(());
    }
    let user_id = user_id_arg(args, "/history <id>")?;

    let messages = {
        let conn = get_connection(&deps.db_pool)?;
        get_user_messages(&conn, user_id)?
    };
    if messages.is_empty() {
        bot.send_message(ChatId(admin_id), format!("У пользователя {} нет сообщений.", user_id))
            .await?;
        return Ok(());
    }

    let header = format!("💬 Переписка с {}\n", user_id);
    let lines: Vec<String> = messages.iter().map(history_line).collect();
    send_chunks(bot, ChatId(admin_id), &header, &lines).await
}
