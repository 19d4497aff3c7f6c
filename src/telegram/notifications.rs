use teloxide::prelude::*;
use teloxide::types::ChatId;

/// Tells a user that their payment went through and Pro is active.
///
/// Telegram private chat ids equal user ids, so the stored telegram_id is the chat.
pub async fn notify_pro_activated(bot: &Bot, telegram_id: i64) -> Result<(), teloxide::RequestError> {
    bot.send_message(
        ChatId(telegram_id),
        "🎉 Оплата прошла успешно! Pro подписка активирована: анализы теперь без ограничений.",
    )
    .await?;

    log::info!("Sent Pro activation notice to {}", telegram_id);
    Ok(())
}
