//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{
    handle_analyze_command, handle_balance_command, handle_help_command, handle_pro_command, handle_start_command,
};
use super::photo::handle_photo;
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;

const APOLOGY_TEXT: &str = "Произошла ошибка, попробуйте позже 🙏";

/// Creates the main dispatcher schema for the Telegram bot.
///
/// # Arguments
/// * `deps` - Handler dependencies (services shared with the HTTP API)
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_photos = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(photo_handler(deps_photos))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                let result = match &cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await,
                    Command::Help => handle_help_command(&bot, &msg).await,
                    Command::Analyze(mode) => handle_analyze_command(&bot, &msg, mode).await,
                    Command::Balance => handle_balance_command(&bot, &msg, &deps).await,
                    Command::Pro => handle_pro_command(&bot, &msg, &deps).await,
                };

                if let Err(e) = result {
                    log::error!("❌ Command {:?} failed for chat {}: {}", cmd, msg.chat.id, e);
                    let _ = bot.send_message(msg.chat.id, APOLOGY_TEXT).await;
                }
                Ok(())
            }
        },
    ))
}

fn photo_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.photo().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_photo(&bot, &msg, &deps).await {
                    log::error!("❌ Photo analysis failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot.send_message(msg.chat.id, APOLOGY_TEXT).await;
                }
                Ok(())
            }
        })
}
