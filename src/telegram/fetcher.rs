//! Resolving channel message links into media through the Bot API.
//!
//! The Bot API cannot read channel history directly, so each linked message is
//! forwarded into a storage chat, its media is taken from the copy, and the copy
//! is deleted again.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, Recipient};
use teloxide::{ApiError, RequestError};

use crate::core::config;
use crate::course::{ChannelRef, FetchError, FileDescriptor, LinkRef, MessageFetcher};
use crate::telegram::bot::channel_recipient;
use crate::telegram::media::extract_file;
use crate::telegram::Bot;

pub struct ForwardingFetcher {
    bot: Bot,
    storage_chat: Option<Recipient>,
}

impl ForwardingFetcher {
    /// Forwards into `STORAGE_CHAT` when configured, otherwise into the admin's chat.
    pub fn new(bot: Bot) -> Self {
        let storage_chat = config::channels::STORAGE_CHAT.as_deref().map(channel_recipient);
        Self { bot, storage_chat }
    }

    fn target(&self, admin_id: i64) -> Recipient {
        self.storage_chat
            .clone()
            .unwrap_or(Recipient::Id(ChatId(admin_id)))
    }
}

fn source(channel: &ChannelRef) -> Recipient {
    match channel {
        ChannelRef::Private(id) => Recipient::Id(ChatId(*id)),
        ChannelRef::Public(name) => Recipient::ChannelUsername(format!("@{}", name)),
    }
}

/// Maps a Bot API failure onto the fetch error the ingestion machine understands.
pub fn classify_error(error: &RequestError) -> FetchError {
    match error {
        RequestError::RetryAfter(seconds) => FetchError::RateLimited(seconds.duration()),
        RequestError::Api(ApiError::MessageToForwardNotFound)
        | RequestError::Api(ApiError::MessageIdInvalid)
        | RequestError::Api(ApiError::ChatNotFound) => FetchError::NotFound,
        other => FetchError::Other(other.to_string()),
    }
}

#[async_trait]
impl MessageFetcher for ForwardingFetcher {
    async fn fetch(&self, admin_id: i64, link: &LinkRef) -> Result<FileDescriptor, FetchError> {
        let target = self.target(admin_id);
        let copy = self
            .bot
            .forward_message(target.clone(), source(&link.channel), MessageId(link.message_id))
            .disable_notification(true)
            .await
            .map_err(|e| {
                log::warn!("Forwarding {} failed: {}", link, e);
                classify_error(&e)
            })?;

        let descriptor = extract_file(&copy);

        if let Err(e) = self.bot.delete_message(target, copy.id).await {
            log::debug!("Could not delete forwarded copy of {}: {}", link, e);
        }

        let mut descriptor = descriptor.ok_or(FetchError::NoMedia)?;
        descriptor.source_order = link.message_id as i64;
        Ok(descriptor)
    }
}
