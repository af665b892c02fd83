//! Routes commands, button presses and free-form messages to the handlers

use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, MessageId};

use super::types::{callback_sender_id, report_failure, sender_id, HandlerDeps, HandlerResult};
use super::{admin, payment, profile, registration, support};
use crate::core::error::AppError;
use crate::core::session::Step;
use crate::storage::get_connection;
use crate::storage::ledger;
use crate::telegram::bot::Command;
use crate::telegram::callbacks::CallbackAction;
use crate::telegram::notifications::Receipt;

const USE_BUTTONS: &str = "Пожалуйста, воспользуйтесь кнопками выше.";
const SEND_TEXT: &str = "Пожалуйста, отправьте ответ текстом.";
const SEND_RECEIPT: &str = "Отправьте чек об оплате: фото, файл или текст.";

pub async fn route_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) {
    let Some(user_id) = sender_id(&msg) else {
        return;
    };
    let context = format!("{:?}", cmd);
    log::info!("Command {} from user {}", context, user_id);

    let result = match cmd {
        Command::Start => registration::handle_start(&bot, &deps, user_id).await,
        Command::Cancel => handle_cancel(&bot, &deps, user_id).await,
        Command::Users => admin::handle_users_command(&bot, &deps, user_id).await,
        Command::Stats => admin::handle_stats_command(&bot, &deps, user_id).await,
        Command::PromoStats => admin::handle_promo_stats_command(&bot, &deps, user_id).await,
        Command::PromoNew(args) => admin::handle_promo_new_command(&bot, &deps, user_id, &args).await,
        Command::PromoReset(args) => admin::handle_promo_reset_command(&bot, &deps, user_id, &args).await,
        Command::Reset(args) => admin::handle_reset_command(&bot, &deps, user_id, &args).await,
        Command::DeleteUser(args) => admin::handle_delete_user_command(&bot, &deps, user_id, &args).await,
        Command::History(args) => admin::handle_history_command(&bot, &deps, user_id, &args).await,
    };

    if let Err(e) = result {
        report_failure(&bot, msg.chat.id, &context, e).await;
    }
}

async fn handle_cancel(bot: &Bot, deps: &HandlerDeps, user_id: i64) -> HandlerResult {
    match deps.sessions.end(user_id).await {
        Some(step) => {
            if step.is_registration() {
                log::info!("User {} abandoned registration at {:?}", user_id, step);
            } else {
                log::info!("User {} cancelled at {:?}", user_id, step);
            }
            bot.send_message(ChatId(user_id), "❎ Отменено.").await?;
        }
        None => {
            bot.send_message(ChatId(user_id), "Нечего отменять.").await?;
        }
    }

    let registered = {
        let conn = get_connection(&deps.db_pool)?;
        ledger::get_subscriber(&conn, user_id)?.is_some()
    };
    if registered {
        profile::send_main_menu(bot, user_id).await?;
    }
    Ok(())
}

pub async fn route_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) {
    let callback_id = q.id.clone();
    let Some(user_id) = callback_sender_id(&q) else {
        answer_callback(&bot, callback_id, None).await;
        return;
    };

    let action = match q.data.as_deref().map(str::parse::<CallbackAction>) {
        Some(Ok(action)) => action,
        Some(Err(e)) => {
            log::warn!("User {}: {}", user_id, e);
            answer_callback(&bot, callback_id, None).await;
            return;
        }
        None => {
            answer_callback(&bot, callback_id, None).await;
            return;
        }
    };
    log::info!("Callback {} from user {}", action, user_id);

    let message = q.message.as_ref().map(|m| (m.chat().id, m.id()));
    let username = q.from.username.as_deref();

    let (answer, result) = dispatch_callback(&bot, &deps, user_id, action, message, username).await;

    answer_callback(&bot, callback_id, answer).await;

    if let Err(e) = result {
        let chat_id = message.map(|(chat_id, _)| chat_id).unwrap_or(ChatId(user_id));
        report_failure(&bot, chat_id, &action.to_string(), e).await;
    }
}

/// Stops the button spinner. A late or duplicate answer is rejected by Telegram and only logged.
async fn answer_callback(bot: &Bot, callback_id: CallbackQueryId, text: Option<String>) {
    let mut request = bot.answer_callback_query(callback_id);
    if let Some(text) = text {
        request = request.text(text);
    }
    if let Err(e) = request.await {
        log::debug!("Failed to answer callback query: {}", e);
    }
}

async fn dispatch_callback(
    bot: &Bot,
    deps: &HandlerDeps,
    user_id: i64,
    action: CallbackAction,
    message: Option<(ChatId, MessageId)>,
    username: Option<&str>,
) -> (Option<String>, HandlerResult) {
    let result = match action {
        CallbackAction::Book(index) => {
            return split(registration::toggle_book(bot, deps, user_id, index, message).await);
        }
        CallbackAction::ConfirmBooks => {
            return split(registration::confirm_books(bot, deps, user_id, username).await);
        }
        CallbackAction::StartRegistration => registration::start_registration(bot, deps, user_id).await,
        CallbackAction::Source(source) => registration::choose_source(bot, deps, user_id, source).await,
        CallbackAction::PaymentOptions | CallbackAction::ExtendSubscription => {
            payment::send_payment_options(bot, deps, user_id).await
        }
        CallbackAction::Pay { months, user_id: target } => {
            payment::select_tariff(bot, deps, user_id, months, target).await
        }
        CallbackAction::Approve {
            user_id: target,
            months,
            bonus_months,
        } => payment::approve_payment(bot, deps, user_id, target, months, bonus_months, message).await,
        CallbackAction::Reject { user_id: target } => {
            payment::reject_payment(bot, deps, user_id, target, message).await
        }
        CallbackAction::BackToMenu => profile::send_main_menu(bot, user_id).await,
        CallbackAction::Profile => profile::show_profile(bot, deps, user_id).await,
        CallbackAction::MessageAdmin => support::start_message_to_admin(bot, deps, user_id).await,
        CallbackAction::ReplyTo { user_id: target } => support::start_reply(bot, deps, user_id, target).await,
        CallbackAction::ResetBooks { user_id: target } => {
            profile::reset_own_books(bot, deps, user_id, target).await
        }
    };
    (None, result)
}

fn split(result: Result<Option<String>, AppError>) -> (Option<String>, HandlerResult) {
    match result {
        Ok(answer) => (answer, Ok(())),
        Err(e) => (None, Err(e)),
    }
}

/// Attachment sent as payment evidence, if the message carries one
fn receipt_from(msg: &Message) -> Option<Receipt> {
    if let Some(photos) = msg.photo() {
        let largest = photos.iter().max_by_key(|p| p.width * p.height)?;
        return Some(Receipt::Photo(largest.file.id.0.clone()));
    }
    if let Some(document) = msg.document() {
        return Some(Receipt::Document(document.file.id.0.clone()));
    }
    msg.text().map(|text| Receipt::Text(text.to_string()))
}

pub async fn route_message(bot: Bot, msg: Message, deps: HandlerDeps) {
    let Some(user_id) = sender_id(&msg) else {
        return;
    };
    let step = deps.sessions.current_step(user_id).await;
    let result = handle_step_message(&bot, &deps, &msg, user_id, step).await;

    if let Err(e) = result {
        report_failure(&bot, msg.chat.id, &format!("message at {:?}", step), e).await;
    }
}

async fn handle_step_message(
    bot: &Bot,
    deps: &HandlerDeps,
    msg: &Message,
    user_id: i64,
    step: Option<Step>,
) -> HandlerResult {
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());

    let Some(step) = step else {
        bot.send_message(msg.chat.id, "Нажмите /start, чтобы открыть меню.").await?;
        return Ok(());
    };

    if step == Step::AwaitingReceipt {
        return match receipt_from(msg) {
            Some(receipt) => payment::handle_receipt(bot, deps, user_id, receipt).await,
            None => {
                bot.send_message(msg.chat.id, SEND_RECEIPT).await?;
                Ok(())
            }
        };
    }

    if !step.expects_text() {
        bot.send_message(msg.chat.id, USE_BUTTONS).await?;
        return Ok(());
    }
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, SEND_TEXT).await?;
        return Ok(());
    };

    match step {
        Step::Promo => registration::handle_promo_text(bot, deps, user_id, text).await,
        Step::Email => registration::handle_email_text(bot, deps, user_id, text, username).await,
        Step::TelegramHandle => registration::handle_handle_text(bot, deps, user_id, text).await,
        Step::BookSelection | Step::ResetBooks => {
            registration::handle_books_text(bot, deps, user_id, text, username).await
        }
        Step::MessageToAdmin => support::handle_message_to_admin(bot, deps, user_id, text, username).await,
        Step::ReplyToUser => support::handle_reply(bot, deps, user_id, text).await,
        Step::Source | Step::TariffSelected | Step::AwaitingReceipt => {
            bot.send_message(msg.chat.id, USE_BUTTONS).await?;
            Ok(())
        }
    }
}
