//! Admin broadcasts to every known user.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::utils::readable_duration;
use crate::storage::db::{self, DbPool};
use crate::telegram::Bot;

/// Broadcast text waiting for the admin's confirmation, keyed by admin id.
pub type PendingBroadcasts = DashMap<i64, String>;

pub const BLOCKED_REASON: &str = "User blocked the bot";
pub const DEACTIVATED_REASON: &str = "User account deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Blocked,
    Deactivated,
    Failed,
}

impl Delivery {
    pub fn from_error(error: &RequestError) -> Self {
        match error {
            RequestError::Api(ApiError::BotBlocked) => Delivery::Blocked,
            RequestError::Api(ApiError::UserDeactivated) => Delivery::Deactivated,
            _ => Delivery::Failed,
        }
    }

    /// Reason stored when the recipient gets banned as a result.
    pub fn ban_reason(self) -> Option<&'static str> {
        match self {
            Delivery::Blocked => Some(BLOCKED_REASON),
            Delivery::Deactivated => Some(DEACTIVATED_REASON),
            _ => None,
        }
    }
}

/// Running counters of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub total: usize,
    pub done: usize,
    pub success: usize,
    pub blocked: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl BroadcastStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, delivery: Delivery) {
        self.done += 1;
        match delivery {
            Delivery::Sent => self.success += 1,
            Delivery::Blocked => self.blocked += 1,
            Delivery::Deactivated => self.deleted += 1,
            Delivery::Failed => self.failed += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.blocked + self.deleted + self.failed
    }

    pub fn status_text(&self) -> String {
        format!(
            "📣 Broadcast in progress...\n\nTotal: {}\nCompleted: {} / {}\nSuccess: {}\nBlocked: {}\nDeleted: {}\nFailed: {}",
            self.total, self.done, self.total, self.success, self.blocked, self.deleted, self.failed
        )
    }

    pub fn summary(&self, elapsed: std::time::Duration) -> String {
        format!(
            "✅ Broadcast completed in {}\n\nTotal users: {}\nSuccess: {}\nFailed: {}\n  blocked: {}\n  deleted: {}\n  other: {}",
            readable_duration(elapsed),
            self.total,
            self.success,
            self.failures(),
            self.blocked,
            self.deleted,
            self.failed
        )
    }
}

async fn send_one(bot: &Bot, user_id: i64, text: &str) -> Delivery {
    let mut result = bot.send_message(ChatId(user_id), text).await;
    if let Err(RequestError::RetryAfter(wait)) = &result {
        log::warn!("Broadcast rate limited, waiting {:?}", wait.duration());
        tokio::time::sleep(wait.duration()).await;
        result = bot.send_message(ChatId(user_id), text).await;
    }
    match result {
        Ok(_) => Delivery::Sent,
        Err(e) => {
            let delivery = Delivery::from_error(&e);
            if delivery == Delivery::Failed {
                log::error!("Broadcast to {} failed: {}", user_id, e);
            }
            delivery
        }
    }
}

/// Sends `text` to every non-banned user, editing a status message as it goes.
///
/// Users who blocked the bot or deleted their account are banned so later
/// broadcasts skip them.
pub async fn run_broadcast(bot: &Bot, pool: Arc<DbPool>, admin_chat: ChatId, text: &str) -> AppResult<BroadcastStats> {
    let users = {
        let conn = db::get_connection(&pool)?;
        db::get_all_users(&conn)?
    };

    let mut stats = BroadcastStats::new(users.len());
    let status = bot.send_message(admin_chat, stats.status_text()).await?;
    let started = Instant::now();
    let mut last_update = Instant::now();

    log::info!("Broadcast to {} users started", users.len());

    for user_id in users {
        let delivery = send_one(bot, user_id, text).await;
        if let Some(reason) = delivery.ban_reason() {
            match db::get_connection(&pool) {
                Ok(conn) => {
                    if let Err(e) = db::ban_user(&conn, user_id, reason) {
                        log::error!("Failed to ban unreachable user {}: {}", user_id, e);
                    }
                }
                Err(e) => log::error!("Failed to get DB connection: {}", e),
            }
        }
        stats.record(delivery);

        if last_update.elapsed() >= config::broadcast::status_interval() {
            last_update = Instant::now();
            if let Err(e) = bot.edit_message_text(admin_chat, status.id, stats.status_text()).await {
                log::debug!("Broadcast status edit failed: {}", e);
            }
        }
        tokio::time::sleep(config::broadcast::send_delay()).await;
    }

    let summary = stats.summary(started.elapsed());
    if let Err(e) = bot.edit_message_text(admin_chat, status.id, &summary).await {
        log::warn!("Broadcast summary edit failed, sending instead: {}", e);
        bot.send_message(admin_chat, summary).await?;
    }
    log::info!(
        "Broadcast finished: {} sent, {} failed",
        stats.success,
        stats.failures()
    );
    Ok(stats)
}
