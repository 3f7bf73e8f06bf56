//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineQuery, Message};

use super::callbacks::handle_callback;
use super::commands::{handle_broadcast_command, handle_command};
use super::ingest::{drive, input_from_message};
use super::types::{HandlerDeps, HandlerError};
use crate::core::config;
use crate::telegram::bot::{sender_id, Command};
use crate::telegram::inline::answer_search;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Branch order matters: banned users first, commands before free text.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_banned = deps.clone();
    let deps_broadcast = deps.clone();
    let deps_commands = deps.clone();
    let deps_ingest = deps.clone();
    let deps_callback = deps.clone();
    let deps_inline = deps.clone();

    dptree::entry()
        // Banned users are dropped before anything else sees the message
        .branch(banned_user_handler(deps_banned))
        // Hidden admin command (not in Command enum)
        .branch(broadcast_handler(deps_broadcast))
        .branch(command_handler(deps_commands))
        // Admin messages feeding a running course draft
        .branch(ingest_handler(deps_ingest))
        .branch(callback_handler(deps_callback))
        .branch(inline_handler(deps_inline))
}

fn banned_user_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(move |msg: Message| {
            let user_id = sender_id(&msg);
            !config::admin::is_admin(user_id) && deps.is_banned(user_id)
        })
        .endpoint(|msg: Message| async move {
            log::debug!("Ignoring message from banned user {}", sender_id(&msg));
            Ok(())
        })
}

/// Handler for /broadcast admin command (hidden, not in Command enum)
fn broadcast_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|text| text.starts_with("/broadcast")).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = sender_id(&msg);
                let message_text = msg.text().unwrap_or_default();

                if let Err(e) = handle_broadcast_command(&bot, msg.chat.id, user_id, message_text, &deps).await {
                    log::error!("/broadcast handler failed for user {}: {}", user_id, e);
                    let _ = bot.send_message(msg.chat.id, format!("Error: {}", e)).await;
                }
                Ok(())
            }
        })
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                let chat_id = msg.chat.id;
                if let Err(e) = handle_command(bot.clone(), msg, cmd, deps).await {
                    log::error!("Command failed in chat {}: {}", chat_id, e);
                    let _ = bot.send_message(chat_id, "❌ Something went wrong, please try again.").await;
                }
                Ok(())
            }
        },
    ))
}

fn ingest_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_filter = deps.clone();
    Update::filter_message()
        .filter(move |msg: Message| {
            let user_id = sender_id(&msg);
            msg.chat.is_private()
                && config::admin::is_admin(user_id)
                && deps_filter.machine.state_of(user_id).is_some()
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let admin_id = sender_id(&msg);
                let input = input_from_message(&msg);
                if let Err(e) = drive(&bot, &deps, msg.chat.id, admin_id, input).await {
                    log::error!("Ingestion reply to admin {} failed: {}", admin_id, e);
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let user_id = q.from.id.0;
            if let Err(e) = handle_callback(bot, q, deps).await {
                log::error!("Callback from {} failed: {}", user_id, e);
            }
            Ok(())
        }
    })
}

fn inline_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_inline_query().endpoint(move |bot: Bot, query: InlineQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = answer_search(
                &bot,
                deps.db_pool.clone(),
                deps.shortener.as_deref(),
                &deps.bot_username,
                &query,
            )
            .await
            {
                log::error!("Inline query '{}' failed: {}", query.query, e);
            }
            Ok(())
        }
    })
}
