//! Inline keyboards

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config::billing::BOOKS_PER_SUBSCRIBER;
use crate::core::config::Config;
use crate::core::sweep::Notice;
use crate::core::types::Source;
use crate::core::wizard::suggested_bonus_months;
use crate::telegram::callbacks::CallbackAction;

fn button(label: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.into(), action.to_string())
}

pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(
        "▶️ Продолжить",
        CallbackAction::StartRegistration,
    )]])
}

pub fn source_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("📸 Instagram", CallbackAction::Source(Source::Instagram))],
        vec![button("👩‍🏫 От учителя", CallbackAction::Source(Source::Teacher))],
    ])
}

/// One button per catalog entry, two per row, plus the confirm button.
pub fn books_keyboard(catalog: &[String], selected: &[usize]) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    let mut current_row = Vec::new();

    for (index, title) in catalog.iter().enumerate() {
        let label = if selected.contains(&index) {
            format!("✅ {}", title)
        } else {
            title.clone()
        };
        current_row.push(button(label, CallbackAction::Book(index)));
        if current_row.len() == 2 {
            rows.push(std::mem::take(&mut current_row));
        }
    }
    if !current_row.is_empty() {
        rows.push(current_row);
    }

    rows.push(vec![button(
        format!("📦 Готово ({}/{})", selected.len(), BOOKS_PER_SUBSCRIBER),
        CallbackAction::ConfirmBooks,
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("👤 Профиль", CallbackAction::Profile)],
        vec![button("💳 Оплатить", CallbackAction::PaymentOptions)],
        vec![button("✉️ Написать администратору", CallbackAction::MessageAdmin)],
    ])
}

/// Tariff buttons with the subscriber's price
pub fn tariff_keyboard(config: &Config, user_id: i64, has_promo: bool) -> InlineKeyboardMarkup {
    let price = config.price_for(has_promo);
    let mut rows: Vec<Vec<InlineKeyboardButton>> = config
        .tariff_months
        .iter()
        .map(|&months| {
            let bonus = suggested_bonus_months(months);
            let label = if bonus > 0 {
                format!("📅 {} мес. по {} +{} мес. 🎁", months, price, bonus)
            } else {
                format!("📅 {} мес. по {}", months, price)
            };
            vec![button(label, CallbackAction::Pay { months, user_id })]
        })
        .collect();
    rows.push(vec![button("🔙 Назад", CallbackAction::BackToMenu)]);
    InlineKeyboardMarkup::new(rows)
}

/// Approve/reject buttons under a forwarded receipt.
///
/// Approval is offered with the suggested bonus and, when that differs, with
/// one extra month.
pub fn review_keyboard(user_id: i64, months: u32) -> InlineKeyboardMarkup {
    let suggested = suggested_bonus_months(months);
    let mut approve_row = vec![button(
        format!("✅ Подтвердить ({} мес.)", months + suggested),
        CallbackAction::Approve {
            user_id,
            months,
            bonus_months: suggested,
        },
    )];
    if suggested == 0 {
        approve_row.push(button(
            "✅ +1 мес. бонус",
            CallbackAction::Approve {
                user_id,
                months,
                bonus_months: 1,
            },
        ));
    }

    InlineKeyboardMarkup::new(vec![
        approve_row,
        vec![button("❌ Отклонить", CallbackAction::Reject { user_id })],
    ])
}

pub fn profile_keyboard(user_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("💳 Продлить подписку", CallbackAction::ExtendSubscription)],
        vec![button("📚 Выбрать книги заново", CallbackAction::ResetBooks { user_id })],
        vec![button("🔙 Назад", CallbackAction::BackToMenu)],
    ])
}

/// Single button opening the tariff list
pub fn pay_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("💳 Оплатить", CallbackAction::PaymentOptions)]])
}

/// Buttons attached to a sweep notice. Only subscriber-facing notices get one.
pub fn notice_keyboard(notice: &Notice) -> Option<InlineKeyboardMarkup> {
    match notice {
        Notice::SubscriptionExpired | Notice::TrialEndingReminder { .. } => Some(pay_keyboard()),
        Notice::SubscriberDeactivated { .. } | Notice::TrialEnding { .. } => None,
    }
}

pub fn reply_keyboard(user_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("↩️ Ответить", CallbackAction::ReplyTo { user_id })]])
}
