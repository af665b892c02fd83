//! Registration wizard: source, promo, email, contact and book selection

use teloxide::prelude::*;
use teloxide::types::MessageId;

use super::profile::{send_main_menu, send_returning_user};
use super::types::{today, HandlerDeps, HandlerResult};
use crate::core::config::billing::BOOKS_PER_SUBSCRIBER;
use crate::core::error::AppError;
use crate::core::session::{SessionData, Step};
use crate::core::types::Source;
use crate::core::wizard::{self, PromoInput, Toggle, WizardError};
use crate::storage::get_connection;
use crate::storage::ledger::{self, NewSubscriber, Registration};
use crate::telegram::format::{catalog_text, display_date, registration_notice};
use crate::telegram::keyboards::{books_keyboard, source_keyboard, start_keyboard};
use crate::telegram::notifications::notify_admins;

const WELCOME: &str = "📚 Добро пожаловать в Wordzen!\n\n\
    Мы присылаем книги для изучения английского и даём 3 дня бесплатного доступа. \
    Нажмите «Продолжить», чтобы зарегистрироваться.";

/// `/start`: greets new users, sends known ones to the menu or to payment.
pub async fn handle_start(bot: &Bot, deps: &HandlerDeps, user_id: i64) -> HandlerResult {
    if let Some(step) = deps.sessions.end(user_id).await {
        log::info!("User {} restarted, dropped session at {:?}", user_id, step);
    }

    let existing = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_subscriber(&conn, user_id)?
    };
    match existing {
        Some(subscriber) => send_returning_user(bot, deps, &subscriber).await,
        None => {
            bot.send_message(ChatId(user_id), WELCOME)
                .reply_markup(start_keyboard())
                .await?;
            Ok(())
        }
    }
}

/// "Continue" button: opens the wizard at the source step.
pub async fn start_registration(bot: &Bot, deps: &HandlerDeps, user_id: i64) -> HandlerResult {
    let existing = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_subscriber(&conn, user_id)?
    };
    if let Some(subscriber) = existing {
        log::info!("User {} is already registered, skipping wizard", user_id);
        return send_returning_user(bot, deps, &subscriber).await;
    }

    deps.sessions.begin(user_id, Step::Source).await;
    log::info!("User {} started registration", user_id);
    bot.send_message(ChatId(user_id), "Откуда вы узнали о Wordzen?")
        .reply_markup(source_keyboard())
        .await?;
    Ok(())
}

pub async fn choose_source(bot: &Bot, deps: &HandlerDeps, user_id: i64, source: Source) -> HandlerResult {
    if deps.sessions.current_step(user_id).await != Some(Step::Source) {
        log::debug!("Ignoring source button from user {} outside the source step", user_id);
        return Ok(());
    }

    deps.sessions
        .update(
            user_id,
            SessionData {
                source: Some(source),
                ..Default::default()
            },
        )
        .await;

    if source.asks_for_promo() {
        deps.sessions.advance(user_id, Step::Promo).await;
        bot.send_message(
            ChatId(user_id),
            "🎟 Введите промокод от вашего учителя.\nЕсли промокода нет, напишите «нет».",
        )
        .await?;
    } else {
        deps.sessions.advance(user_id, Step::Email).await;
        ask_email(bot, user_id).await?;
    }
    Ok(())
}

async fn ask_email(bot: &Bot, user_id: i64) -> HandlerResult {
    bot.send_message(ChatId(user_id), "📧 Введите ваш email:").await?;
    Ok(())
}

async fn reprompt(bot: &Bot, user_id: i64, step: Step, err: &WizardError) -> HandlerResult {
    log::info!("User {} input rejected at {:?}: {}", user_id, step, err);
    bot.send_message(ChatId(user_id), err.user_message()).await?;
    Ok(())
}

pub async fn handle_promo_text(bot: &Bot, deps: &HandlerDeps, user_id: i64, text: &str) -> HandlerResult {
    let code = match wizard::parse_promo_input(text) {
        Ok(PromoInput::Skip) => {
            log::info!("User {} skipped the promo code", user_id);
            deps.sessions.advance(user_id, Step::Email).await;
            return ask_email(bot, user_id).await;
        }
        Ok(PromoInput::Code(code)) => code,
        Err(e) => return reprompt(bot, user_id, Step::Promo, &e).await,
    };

    let found = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_promo(&conn, &code)?
    };
    let promo = match wizard::check_promo(&code, found) {
        Ok(promo) => promo,
        Err(e) => return reprompt(bot, user_id, Step::Promo, &e).await,
    };

    deps.sessions
        .update(
            user_id,
            SessionData {
                promo_code: Some(promo.code.clone()),
                ..Default::default()
            },
        )
        .await;
    deps.sessions.advance(user_id, Step::Email).await;
    log::info!("User {} entered promo code {}", user_id, promo.code);

    bot.send_message(
        ChatId(user_id),
        format!(
            "✅ Промокод {} принят: +{} дн. к пробному периоду.",
            promo.code, promo.bonus_days
        ),
    )
    .await?;
    ask_email(bot, user_id).await
}

pub async fn handle_email_text(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    text: &str,
    username: Option<&str>,
) -> HandlerResult {
    let email = match wizard::validate_email(text) {
        Ok(email) => email,
        Err(e) => return reprompt(bot, user_id, Step::Email, &e).await,
    };

    let taken = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::email_in_use(&conn, &email, user_id)?
    };
    if taken {
        return reprompt(bot, user_id, Step::Email, &WizardError::EmailTaken(email)).await;
    }

    deps.sessions
        .update(
            user_id,
            SessionData {
                email: Some(email),
                ..Default::default()
            },
        )
        .await;
    deps.sessions.advance(user_id, Step::TelegramHandle).await;

    let hint = username
        .map(|u| format!("\n\nНапример: @{}", u))
        .unwrap_or_default();
    bot.send_message(
        ChatId(user_id),
        format!("💬 Укажите ваш Telegram для связи (username или номер телефона).{}", hint),
    )
    .await?;
    Ok(())
}

pub async fn handle_handle_text(bot: &Bot, deps: &HandlerDeps, user_id: i64, text: &str) -> HandlerResult {
    let handle = match wizard::normalize_handle(text) {
        Ok(handle) => handle,
        Err(e) => return reprompt(bot, user_id, Step::TelegramHandle, &e).await,
    };

    deps.sessions
        .update(
            user_id,
            SessionData {
                telegram: Some(handle),
                books: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await;
    deps.sessions.advance(user_id, Step::BookSelection).await;
    send_book_picker(bot, deps, user_id, &[]).await
}

/// Sends the numbered catalog with the selection keyboard.
pub async fn send_book_picker(bot: &Bot, deps: &HandlerDeps, user_id: i64, selected: &[usize]) -> HandlerResult {
    let catalog = &deps.config.books;
    bot.send_message(
        ChatId(user_id),
        format!(
            "📚 Выберите {} книги кнопками и нажмите «Готово», \
             или отправьте их номера через запятую.\n\n{}",
            BOOKS_PER_SUBSCRIBER,
            catalog_text(catalog, selected)
        ),
    )
    .reply_markup(books_keyboard(catalog, selected))
    .await?;
    Ok(())
}

fn is_book_step(step: Option<Step>) -> bool {
    matches!(step, Some(Step::BookSelection) | Some(Step::ResetBooks))
}

/// Book button. Returns the text for the callback answer, if any.
pub async fn toggle_book(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    index: usize,
    message: Option<(ChatId, MessageId)>,
) -> Result<Option<String>, AppError> {
    if !is_book_step(deps.sessions.current_step(user_id).await) {
        return Ok(None);
    }
    let mut selected = deps
        .sessions
        .data(user_id)
        .await
        .map(|d| d.selected_books().to_vec())
        .unwrap_or_default();

    match wizard::toggle_book(&mut selected, index, deps.config.books.len()) {
        Ok(toggle) => {
            log::debug!("User {} {:?} book {}", user_id, toggle, index);
            deps.sessions
                .update(
                    user_id,
                    SessionData {
                        books: Some(selected.clone()),
                        ..Default::default()
                    },
                )
                .await;
            if let Some((chat_id, message_id)) = message {
                bot.edit_message_reply_markup(chat_id, message_id)
                    .reply_markup(books_keyboard(&deps.config.books, &selected))
                    .await?;
            }
            Ok(match toggle {
                Toggle::Added => Some(format!("Выбрано {}/{}", selected.len(), BOOKS_PER_SUBSCRIBER)),
                Toggle::Removed => None,
            })
        }
        Err(e) => Ok(Some(e.user_message())),
    }
}

/// "Done" button. Returns the text for the callback answer, if any.
pub async fn confirm_books(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    username: Option<&str>,
) -> Result<Option<String>, AppError> {
    if !is_book_step(deps.sessions.current_step(user_id).await) {
        return Ok(None);
    }
    let selected = deps
        .sessions
        .data(user_id)
        .await
        .map(|d| d.selected_books().to_vec())
        .unwrap_or_default();

    if let Err(e) = wizard::confirm_selection(&selected) {
        log::info!("User {} confirmed an incomplete selection: {}", user_id, e);
        return Ok(Some(e.user_message()));
    }
    finish_book_selection(bot, deps, user_id, selected, username).await?;
    Ok(None)
}

pub async fn handle_books_text(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    text: &str,
    username: Option<&str>,
) -> HandlerResult {
    let step = deps.sessions.current_step(user_id).await.unwrap_or(Step::BookSelection);
    match wizard::parse_book_indices(text, deps.config.books.len()) {
        Ok(indices) => finish_book_selection(bot, deps, user_id, indices, username).await,
        Err(e) => reprompt(bot, user_id, step, &e).await,
    }
}

async fn finish_book_selection(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    indices: Vec<usize>,
    username: Option<&str>,
) -> HandlerResult {
    let titles = wizard::resolve_titles(&indices, &deps.config.books);
    match deps.sessions.current_step(user_id).await {
        Some(Step::BookSelection) => complete_registration(bot, deps, user_id, titles, username).await,
        Some(Step::ResetBooks) => super::profile::store_new_books(bot, deps, user_id, titles).await,
        _ => Ok(()),
    }
}

/// Terminal registration step: ledger insert and admin notification.
async fn complete_registration(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    books: Vec<String>,
    username: Option<&str>,
) -> HandlerResult {
    let data = deps.sessions.data(user_id).await.unwrap_or_default();
    deps.sessions.end(user_id).await;

    let (Some(source), Some(email), Some(telegram)) = (data.source, data.email.as_deref(), data.telegram.as_deref())
    else {
        log::warn!("User {} reached book selection with incomplete data: {:?}", user_id, data);
        bot.send_message(ChatId(user_id), "Не удалось завершить регистрацию. Нажмите /start, чтобы начать заново.")
            .await?;
        return Ok(());
    };

    let new = NewSubscriber {
        user_id,
        source,
        email,
        telegram,
        books: &books,
        promo_code: data.promo_code.as_deref(),
    };
    let registration = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::register_subscriber(&conn, &new, today(), deps.config.trial_days)?
    };

    match registration {
        Registration::Created(subscriber) => {
            bot.send_message(
                ChatId(user_id),
                format!(
                    "🎉 Регистрация завершена!\n\n📚 Ваши книги: {}\n⏳ Бесплатный доступ до {}",
                    books.join(", "),
                    display_date(subscriber.trial_end)
                ),
            )
            .await?;
            send_main_menu(bot, user_id).await?;
            notify_admins(
                bot,
                &deps.config.admin_ids,
                &registration_notice(&subscriber, username),
                None,
            )
            .await;
        }
        Registration::AlreadyRegistered(subscriber) => {
            bot.send_message(ChatId(user_id), "Вы уже зарегистрированы.").await?;
            send_returning_user(bot, deps, &subscriber).await?;
        }
    }
    Ok(())
}
