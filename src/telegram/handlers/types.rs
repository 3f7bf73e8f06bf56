//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use crate::course::IngestionMachine;
use crate::storage::db::{self, add_user, is_banned};
use crate::storage::get_connection;
use crate::telegram::broadcast::PendingBroadcasts;
use crate::telegram::delivery::PendingDownloads;
use crate::telegram::notifications::notify_new_user;
use crate::telegram::shortener::Shortener;
use crate::telegram::Bot;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<db::DbPool>,
    pub machine: Arc<IngestionMachine>,
    pub pending_downloads: Arc<PendingDownloads>,
    pub pending_broadcasts: Arc<PendingBroadcasts>,
    pub shortener: Option<Arc<Shortener>>,
    pub bot_username: String,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        db_pool: Arc<db::DbPool>,
        machine: Arc<IngestionMachine>,
        shortener: Option<Arc<Shortener>>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            machine,
            pending_downloads: Arc::new(PendingDownloads::new()),
            pending_broadcasts: Arc::new(PendingBroadcasts::new()),
            shortener,
            bot_username: bot_username.into(),
        }
    }

    /// Whether `user_id` is banned. Lookup failures count as not banned.
    pub fn is_banned(&self, user_id: i64) -> bool {
        match get_connection(&self.db_pool) {
            Ok(conn) => is_banned(&conn, user_id).unwrap_or_else(|e| {
                log::error!("Ban lookup for {} failed: {}", user_id, e);
                false
            }),
            Err(e) => {
                log::error!("Failed to get DB connection for ban lookup: {}", e);
                false
            }
        }
    }
}

/// Result of ensure_user_exists operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCreationResult {
    /// User already existed
    Existed,
    /// User was newly created
    Created,
    /// Failed to get DB connection or write the row
    DbError,
}

/// Registers a user on first contact and announces them in the log channel.
pub fn ensure_user_exists(db_pool: &Arc<db::DbPool>, bot: &Bot, user_id: i64, first_name: &str) -> UserCreationResult {
    let conn = match get_connection(db_pool) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to get DB connection for user {}: {}", user_id, e);
            return UserCreationResult::DbError;
        }
    };

    match add_user(&conn, user_id, first_name) {
        Ok(true) => {
            log::info!("New user {} ({})", user_id, first_name);
            let bot = bot.clone();
            let first_name = first_name.to_string();
            tokio::spawn(async move {
                notify_new_user(&bot, user_id, &first_name).await;
            });
            UserCreationResult::Created
        }
        Ok(false) => UserCreationResult::Existed,
        Err(e) => {
            log::error!("Failed to register user {}: {}", user_id, e);
            UserCreationResult::DbError
        }
    }
}
