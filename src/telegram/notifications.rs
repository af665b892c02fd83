use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardMarkup, InputFile};

use crate::core::error::AppResult;
use crate::core::sweep::{Notice, Notifier};
use crate::telegram::format::{fit_message, fit_text, notice_text, receipt_text, MAX_CAPTION_LENGTH};
use crate::telegram::keyboards::notice_keyboard;

/// Sweep notifier backed by the Bot API
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, chat_id: i64, notice: &Notice) -> AppResult<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), notice_text(notice));
        if let Some(markup) = notice_keyboard(notice) {
            request = request.reply_markup(markup);
        }
        request.await?;
        Ok(())
    }
}

/// Evidence attached to a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    Text(String),
    Photo(String),
    Document(String),
}

/// Sends `text` to every admin, cut to one message. Failures are logged per admin.
///
/// Returns how many admins received the message.
pub async fn notify_admins(
    bot: &Bot,
    admin_ids: &[i64],
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> usize {
    let text = fit_message(text);
    let mut delivered = 0;
    for &admin_id in admin_ids {
        let mut request = bot.send_message(ChatId(admin_id), text.clone());
        if let Some(markup) = keyboard.clone() {
            request = request.reply_markup(markup);
        }
        match request.await {
            Ok(_) => delivered += 1,
            Err(e) => log::error!("Failed to notify admin {}: {}", admin_id, e),
        }
    }
    delivered
}

/// Forwards a payment receipt to every admin with the review buttons.
/// Text receipts are cut to one message and captions to the caption limit.
pub async fn forward_receipt(
    bot: &Bot,
    admin_ids: &[i64],
    caption: &str,
    receipt: &Receipt,
    keyboard: InlineKeyboardMarkup,
) -> usize {
    let caption = fit_text(caption, MAX_CAPTION_LENGTH);
    let mut delivered = 0;
    for &admin_id in admin_ids {
        let chat_id = ChatId(admin_id);
        let result = match receipt {
            Receipt::Text(text) => bot
                .send_message(chat_id, receipt_text(&caption, text))
                .reply_markup(keyboard.clone())
                .await
                .map(|_| ()),
            Receipt::Photo(file_id) => bot
                .send_photo(chat_id, InputFile::file_id(FileId(file_id.clone())))
                .caption(caption.clone())
                .reply_markup(keyboard.clone())
                .await
                .map(|_| ()),
            Receipt::Document(file_id) => bot
                .send_document(chat_id, InputFile::file_id(FileId(file_id.clone())))
                .caption(caption.clone())
                .reply_markup(keyboard.clone())
                .await
                .map(|_| ()),
        };
        match result {
            Ok(()) => delivered += 1,
            Err(e) => log::error!("Failed to forward receipt to admin {}: {}", admin_id, e),
        }
    }
    delivered
}
