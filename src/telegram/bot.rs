//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config::{self, Config};

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Команды:")]
pub enum Command {
    #[command(description = "начать регистрацию или открыть меню")]
    Start,
    #[command(description = "отменить текущий шаг")]
    Cancel,
    #[command(description = "список подписчиков (только для администраторов)")]
    Users,
    #[command(description = "статистика (только для администраторов)")]
    Stats,
    #[command(description = "использование промокодов (только для администраторов)")]
    PromoStats,
    #[command(description = "создать промокод: /promo_new <лимит|0> <дни>")]
    PromoNew(String),
    #[command(description = "обнулить счётчик промокода: /promo_reset <код>")]
    PromoReset(String),
    #[command(description = "сбросить книги подписчика: /reset <id>")]
    Reset(String),
    #[command(description = "удалить подписчика: /delete_user <id>")]
    DeleteUser(String),
    #[command(description = "переписка с подписчиком: /history <id>")]
    History(String),
}

/// Creates a Bot instance with the configured token and request timeout
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the HTTP client
pub fn create_bot(config: &Config) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(config.bot_token.clone(), client))
}

/// Publishes the user-facing commands in the Telegram UI
///
/// Admin commands are left out of the menu.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "начать регистрацию или открыть меню"),
        BotCommand::new("cancel", "отменить текущий шаг"),
    ])
    .await?;

    Ok(())
}

/// Parses the numeric user id argument of an admin command.
pub fn parse_user_id_arg(arg: &str) -> Option<i64> {
    arg.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_commands_use_snake_case() {
        assert_eq!(Command::parse("/promo_stats", "wordzen_bot").unwrap(), Command::PromoStats);
        assert_eq!(
            Command::parse("/delete_user 42", "wordzen_bot").unwrap(),
            Command::DeleteUser("42".to_string())
        );
        assert_eq!(
            Command::parse("/promo_new 10 7", "wordzen_bot").unwrap(),
            Command::PromoNew("10 7".to_string())
        );
    }

    #[test]
    fn descriptions_mention_start() {
        let list = Command::descriptions().to_string();
        assert!(list.contains("Команды"));
        assert!(list.contains("/start"));
        assert!(list.contains("/promo_reset"));
    }

    #[test]
    fn user_id_argument() {
        assert_eq!(parse_user_id_arg(" 42 "), Some(42));
        assert_eq!(parse_user_id_arg("abc"), None);
        assert_eq!(parse_user_id_arg(""), None);
    }
}
