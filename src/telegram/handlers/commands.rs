//! Command handler implementations (/start, /help, /analyze, /balance, /pro)

use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;

use super::photo::parse_mode;
use super::types::{profile_from_message, HandlerDeps, HandlerError};
use crate::core::entitlement::{entitlement_of, Entitlement};
use crate::telegram::bot::Command;

const MODES_HELP: &str = "Режимы анализа:\n\
    • merch — товар или мерч\n\
    • food — блюдо\n\
    • character — персонаж или образ\n\
    • general — любое изображение";

fn balance_line(entitlement: Entitlement) -> String {
    match entitlement {
        Entitlement::Pro => "⭐ У вас Pro подписка: анализы без ограничений.".to_string(),
        Entitlement::Free(n) => format!("Бесплатных попыток осталось: {}.", n),
        Entitlement::Exhausted => "Бесплатные попытки закончились. Оформите Pro: /pro".to_string(),
    }
}

/// Handle /start command
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user = deps.users.find_or_create_user(&profile_from_message(msg))?;
    let name = user.first_name.clone().unwrap_or_else(|| "друг".to_string());

    let text = format!(
        "Привет, {}! 👋\n\n\
         Я оцениваю фотографии с помощью нейросети: присылайте фото, \
         а в подписи укажите режим анализа.\n\n{}\n\n{}",
        name,
        MODES_HELP,
        balance_line(entitlement_of(&user))
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub(super) async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
    Ok(())
}

pub(super) async fn handle_analyze_command(bot: &Bot, msg: &Message, mode: &str) -> Result<(), HandlerError> {
    let mode = mode.trim();
    let text = if mode.is_empty() {
        format!(
            "Отправьте фото, а в подписи первым словом укажите режим.\n\
             Например: «food домашняя паста».\n\n{}",
            MODES_HELP
        )
    } else {
        match parse_mode(mode) {
            Some(kind) => format!(
                "Режим {}: отправьте фото с подписью, которая начинается с «{}».",
                kind,
                kind.as_ref().to_lowercase()
            ),
            None => format!("Неизвестный режим «{}».\n\n{}", mode, MODES_HELP),
        }
    };

    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub(super) async fn handle_balance_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user = deps.users.find_or_create_user(&profile_from_message(msg))?;
    bot.send_message(msg.chat.id, balance_line(entitlement_of(&user))).await?;
    Ok(())
}

pub(super) async fn handle_pro_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user = deps.users.find_or_create_user(&profile_from_message(msg))?;
    if user.is_pro {
        bot.send_message(msg.chat.id, "У вас уже есть Pro подписка ⭐").await?;
        return Ok(());
    }

    let result = deps
        .payments
        .create_pro_subscription_payment(user.id, Some(deps.default_provider))
        .await?;

    let text = match result.payment_url {
        Some(url) => format!(
            "Pro подписка: {} {}.\nОплатить: {}\n\nПосле оплаты я пришлю подтверждение.",
            deps.payments.pro_price(),
            deps.payments.currency(),
            url
        ),
        None => "Не удалось создать ссылку на оплату, попробуйте позже.".to_string(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
