//! Inline keyboard callbacks

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use super::ingest::drive;
use super::types::{HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::error::AppResult;
use crate::course::{AdminInput, ConfirmSelection};
use crate::telegram::broadcast::run_broadcast;
use crate::telegram::delivery::{request_course, request_file, DeliveryOutcome};
use crate::telegram::gates::is_channel_member;
use crate::telegram::keyboards::{
    BROADCAST_CANCEL, BROADCAST_CONFIRM, CHECK_SUB_PREFIX, DOWNLOAD_PREFIX, FILE_PREFIX, SEND_ALL_PREFIX,
};
use crate::telegram::texts;
use crate::telegram::Bot;

/// A decoded callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Ingest(ConfirmSelection),
    Download(String),
    SendFile { course_id: String, file_order: i64 },
    SendAll(String),
    CheckSubscription(String),
    ConfirmBroadcast,
    CancelBroadcast,
    Unknown,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        if let Some(selection) = ConfirmSelection::from_callback(data) {
            return Self::Ingest(selection);
        }
        if let Some(course_id) = data.strip_prefix(DOWNLOAD_PREFIX) {
            return Self::Download(course_id.to_string());
        }
        if let Some(rest) = data.strip_prefix(FILE_PREFIX) {
            return match rest.rsplit_once('_') {
                Some((course_id, order)) if !course_id.is_empty() => match order.parse() {
                    Ok(file_order) => Self::SendFile {
                        course_id: course_id.to_string(),
                        file_order,
                    },
                    Err(_) => Self::Unknown,
                },
                _ => Self::Unknown,
            };
        }
        if let Some(course_id) = data.strip_prefix(SEND_ALL_PREFIX) {
            return Self::SendAll(course_id.to_string());
        }
        if let Some(course_id) = data.strip_prefix(CHECK_SUB_PREFIX) {
            return Self::CheckSubscription(course_id.to_string());
        }
        match data {
            BROADCAST_CONFIRM => Self::ConfirmBroadcast,
            BROADCAST_CANCEL => Self::CancelBroadcast,
            _ => Self::Unknown,
        }
    }
}

/// Turns a flood-control failure into a "try again" notice instead of an error.
async fn settle_delivery(bot: &Bot, chat_id: ChatId, result: AppResult<DeliveryOutcome>) -> Result<(), HandlerError> {
    match result {
        Ok(outcome) => {
            log::debug!("Delivery to {}: {:?}", chat_id, outcome);
            Ok(())
        }
        Err(e) if e.is_rate_limited() => {
            log::warn!("Delivery to {} rate limited: {}", chat_id, e);
            bot.send_message(chat_id, texts::TRY_AGAIN_LATER).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Ok(user_id) = i64::try_from(q.from.id.0) else {
        return Ok(());
    };
    let chat_id = ChatId(user_id);

    if deps.is_banned(user_id) && !config::admin::is_admin(user_id) {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }

    let action = CallbackAction::parse(q.data.as_deref().unwrap_or_default());
    log::debug!("Callback {:?} from {}", action, user_id);

    match action {
        CallbackAction::Ingest(selection) => {
            bot.answer_callback_query(q.id.clone()).await?;
            if config::admin::is_admin(user_id) {
                drive(&bot, &deps, chat_id, user_id, AdminInput::Selection(selection)).await?;
            }
        }
        CallbackAction::Download(course_id) | CallbackAction::SendAll(course_id) => {
            bot.answer_callback_query(q.id.clone()).text("Sending course...").await?;
            let result = request_course(
                &bot,
                Arc::clone(&deps.db_pool),
                &deps.pending_downloads,
                chat_id,
                user_id,
                &course_id,
            )
            .await;
            settle_delivery(&bot, chat_id, result).await?;
        }
        CallbackAction::SendFile { course_id, file_order } => {
            bot.answer_callback_query(q.id.clone()).text("Sending file...").await?;
            let result = request_file(
                &bot,
                Arc::clone(&deps.db_pool),
                &deps.pending_downloads,
                chat_id,
                user_id,
                &course_id,
                file_order,
            )
            .await;
            settle_delivery(&bot, chat_id, result).await?;
        }
        CallbackAction::CheckSubscription(course_id) => {
            if !is_channel_member(&bot, user_id).await {
                bot.answer_callback_query(q.id.clone())
                    .text(texts::STILL_NOT_JOINED)
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            bot.answer_callback_query(q.id.clone()).await?;

            let pending = deps
                .pending_downloads
                .remove(&user_id)
                .map(|(_, course)| course)
                .unwrap_or(course_id);
            if *config::access::AUTO_SEND_AFTER_SUBSCRIBE && !pending.is_empty() {
                let result = request_course(
                    &bot,
                    Arc::clone(&deps.db_pool),
                    &deps.pending_downloads,
                    chat_id,
                    user_id,
                    &pending,
                )
                .await;
                settle_delivery(&bot, chat_id, result).await?;
            } else {
                bot.send_message(chat_id, texts::JOINED_THANKS).await?;
            }
        }
        CallbackAction::ConfirmBroadcast => {
            if !config::admin::is_admin(user_id) {
                bot.answer_callback_query(q.id.clone()).await?;
                return Ok(());
            }
            let Some((_, text)) = deps.pending_broadcasts.remove(&user_id) else {
                bot.answer_callback_query(q.id.clone())
                    .text("Nothing to broadcast.")
                    .await?;
                return Ok(());
            };
            bot.answer_callback_query(q.id.clone()).text("Broadcast started").await?;

            let pool = Arc::clone(&deps.db_pool);
            tokio::spawn(async move {
                if let Err(e) = run_broadcast(&bot, pool, chat_id, &text).await {
                    log::error!("Broadcast by {} failed: {}", user_id, e);
                    let _ = bot.send_message(chat_id, format!("❌ Broadcast failed: {}", e)).await;
                }
            });
        }
        CallbackAction::CancelBroadcast => {
            deps.pending_broadcasts.remove(&user_id);
            bot.answer_callback_query(q.id.clone()).text("Broadcast cancelled").await?;
            bot.send_message(chat_id, "Broadcast cancelled.").await?;
        }
        CallbackAction::Unknown => {
            bot.answer_callback_query(q.id.clone()).await?;
        }
    }
    Ok(())
}
