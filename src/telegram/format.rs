//! Message texts built from ledger records.
//!
//! All texts are sent as plain text; nothing here needs Markdown escaping.

use chrono::NaiveDate;

use crate::core::config::Config;
use crate::core::sweep::Notice;
use crate::storage::ledger::{LedgerStats, PromoCode, Subscriber};
use crate::storage::messages::LoggedMessage;

const NOT_SET: &str = "—";

/// Bot API limit is 4096 characters; leave room for the header
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Bot API limit for media captions
pub const MAX_CAPTION_LENGTH: usize = 1024;

/// Breaks an email address with zero-width spaces so Telegram does not turn it
/// into a `mailto:` link in admin chats.
pub fn obfuscate_email(email: &str) -> String {
    let mut out = String::with_capacity(email.len() + 8);
    for c in email.chars() {
        match c {
            '@' => out.push_str("@\u{200B}"),
            '.' => out.push_str("\u{200B}."),
            _ => out.push(c),
        }
    }
    out
}

pub fn display_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

fn email_for_admin(email: Option<&str>) -> String {
    email.map(obfuscate_email).unwrap_or_else(|| NOT_SET.to_string())
}

/// Numbered catalog, with a check mark on selected entries.
pub fn catalog_text(catalog: &[String], selected: &[usize]) -> String {
    catalog
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let mark = if selected.contains(&i) { "✅ " } else { "" };
            format!("{}{}. {}", mark, i + 1, title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Profile shown to the subscriber
pub fn profile_text(subscriber: &Subscriber, config: &Config, today: NaiveDate) -> String {
    let access_until = if subscriber.payment_confirmed {
        subscriber.payment_due
    } else {
        subscriber.trial_end
    };
    let status = if !subscriber.is_active {
        "⛔ Доступ приостановлен"
    } else if subscriber.payment_confirmed {
        "✅ Оплачено"
    } else if subscriber.trial_end >= today {
        "🕒 Пробный период"
    } else {
        "⏳ Ожидает оплаты"
    };

    format!(
        "👤 Ваш профиль\n\n\
         📧 Email: {}\n\
         💬 Telegram: {}\n\
         📚 Книги: {}\n\
         ⏳ Доступ до: {}\n\
         💰 Оплачено месяцев: {}\n\
         💵 Цена за месяц: {}\n\
         Статус: {}",
        subscriber.email.as_deref().unwrap_or(NOT_SET),
        subscriber.telegram.as_deref().unwrap_or(NOT_SET),
        subscriber.books_label().unwrap_or_else(|| "не выбраны".to_string()),
        display_date(access_until),
        subscriber.paid_months,
        config.price_for(subscriber.has_promo()),
        status
    )
}

/// Admin notification about a completed registration
pub fn registration_notice(subscriber: &Subscriber, username: Option<&str>) -> String {
    format!(
        "🆕 Новая регистрация\n\n\
         🆔 ID: {}\n\
         👤 Username: {}\n\
         📍 Источник: {}\n\
         🎟 Промокод: {}\n\
         📧 Email: {}\n\
         💬 Telegram: {}\n\
         📚 Книги: {}\n\
         ⏳ Пробный период до: {}",
        subscriber.user_id,
        username.map(|u| format!("@{}", u)).unwrap_or_else(|| NOT_SET.to_string()),
        subscriber.source.map(|s| s.display_name()).unwrap_or(NOT_SET),
        subscriber.promo_code.as_deref().unwrap_or(NOT_SET),
        email_for_admin(subscriber.email.as_deref()),
        subscriber.telegram.as_deref().unwrap_or(NOT_SET),
        subscriber.books_label().unwrap_or_else(|| NOT_SET.to_string()),
        display_date(subscriber.trial_end)
    )
}

/// Header of a receipt forwarded to admins for review
pub fn receipt_notice(subscriber: &Subscriber, months: u32, price: &str) -> String {
    format!(
        "💳 Чек на проверку\n\n\
         🆔 ID: {}\n\
         📧 Email: {}\n\
         💬 Telegram: {}\n\
         📅 Тариф: {} мес. по {}",
        subscriber.user_id,
        email_for_admin(subscriber.email.as_deref()),
        subscriber.telegram.as_deref().unwrap_or(NOT_SET),
        months,
        price
    )
}

/// One line of the `/users` listing
pub fn user_row(subscriber: &Subscriber) -> String {
    let paid = if subscriber.payment_confirmed { "💰" } else { "🆓" };
    let active = if subscriber.is_active { "" } else { " ⛔" };
    format!(
        "{}{} {} | {} | {} | до {}",
        paid,
        active,
        subscriber.user_id,
        email_for_admin(subscriber.email.as_deref()),
        subscriber.telegram.as_deref().unwrap_or(NOT_SET),
        display_date(if subscriber.payment_confirmed {
            subscriber.payment_due
        } else {
            subscriber.trial_end
        })
    )
}

pub fn stats_text(stats: &LedgerStats) -> String {
    format!(
        "📊 Статистика\n\n\
         👥 Всего подписчиков: {}\n\
         💰 Оплатили: {}\n\
         🎟 С промокодом: {}",
        stats.total, stats.paid, stats.with_promo
    )
}

pub fn promo_row(promo: &PromoCode) -> String {
    let cap = promo
        .max_uses
        .map(|m| m.to_string())
        .unwrap_or_else(|| "∞".to_string());
    let label = promo
        .label
        .as_deref()
        .filter(|l| *l != promo.code)
        .map(|l| format!(" ({})", l))
        .unwrap_or_default();
    format!(
        "{}{}: {}/{} использований, +{} дн.",
        promo.code, label, promo.used_count, cap, promo.bonus_days
    )
}

/// One entry of the `/history` output
pub fn history_line(message: &LoggedMessage) -> String {
    let who = if message.is_from_user { "👤" } else { "🛡" };
    format!("{} [{}] {}", who, message.created_at, message.text)
}

/// Cuts `text` to `limit` characters, marking the cut with `…`.
pub fn fit_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn fit_message(text: &str) -> String {
    fit_text(text, MAX_MESSAGE_LENGTH)
}

/// Body of a text receipt forwarded to admins
pub fn receipt_text(caption: &str, text: &str) -> String {
    fit_message(&format!("{}\n\n📝 {}", caption, text))
}

/// Splits one line into pieces of at most `MAX_MESSAGE_LENGTH` characters.
fn line_pieces(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(MAX_MESSAGE_LENGTH).map(|piece| piece.iter().collect()).collect()
}

/// Packs `lines` under `header` into as few messages as the length limit allows.
/// A line longer than the limit is spread over several messages.
pub fn split_messages(header: &str, lines: &[String]) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = header.to_string();
    let mut current_len = current.chars().count();

    for piece in lines.iter().flat_map(|line| line_pieces(line)) {
        let piece_len = piece.chars().count();
        if current_len + piece_len + 1 > MAX_MESSAGE_LENGTH && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&piece);
        current_len += piece_len;
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

/// Text for a sweep notice
pub fn notice_text(notice: &Notice) -> String {
    match notice {
        Notice::SubscriptionExpired => "⛔ Срок вашего доступа истёк, а оплата не поступила. \
             Доступ к книгам приостановлен. Оплатите подписку, чтобы продолжить."
            .to_string(),
        Notice::SubscriberDeactivated {
            user_id,
            email,
            telegram,
        } => format!(
            "⛔ Подписчик отключён за неоплату\n\n🆔 ID: {}\n📧 Email: {}\n💬 Telegram: {}",
            user_id,
            email_for_admin(email.as_deref()),
            telegram.as_deref().unwrap_or(NOT_SET)
        ),
        Notice::TrialEndingReminder { trial_end } => format!(
            "⏰ Напоминаем: пробный период заканчивается {}. Оплатите подписку, чтобы не потерять доступ.",
            display_date(*trial_end)
        ),
        Notice::TrialEnding {
            user_id,
            email,
            telegram,
            trial_end,
        } => format!(
            "⏰ Завтра заканчивается пробный период\n\n🆔 ID: {}\n📧 Email: {}\n💬 Telegram: {}\n📅 {}",
            user_id,
            email_for_admin(email.as_deref()),
            telegram.as_deref().unwrap_or(NOT_SET),
            display_date(*trial_end)
        ),
    }
}
