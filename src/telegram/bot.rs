//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command list registration

use reqwest::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "приветствие и остаток попыток")]
    Start,
    #[command(description = "список команд")]
    Help,
    #[command(description = "как отправить фото на анализ (режим: merch, food, character, general)")]
    Analyze(String),
    #[command(description = "остаток бесплатных попыток и статус Pro")]
    Balance,
    #[command(description = "оформить Pro подписку")]
    Pro,
}

/// Creates a Bot instance with a request timeout
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the HTTP client
pub fn create_bot(token: &SecretString) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(token.expose_secret(), client))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/balance", "bot").unwrap(), Command::Balance);
        assert_eq!(
            Command::parse("/analyze food", "bot").unwrap(),
            Command::Analyze("food".to_string())
        );
        assert_eq!(Command::parse("/analyze", "bot").unwrap(), Command::Analyze(String::new()));
        assert!(Command::parse("/unknown", "bot").is_err());
    }

    #[test]
    fn test_command_list_registered() {
        let names: Vec<String> = Command::bot_commands()
            .into_iter()
            .map(|c| c.command.trim_start_matches('/').to_string())
            .collect();
        assert_eq!(names, vec!["start", "help", "analyze", "balance", "pro"]);
    }
}
