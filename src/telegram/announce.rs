//! Posting newly published courses to the public channel.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, ParseMode, Recipient};

use crate::core::config;
use crate::core::error::AppResult;
use crate::course::{Announcement, Announcer};
use crate::telegram::bot::channel_recipient;
use crate::telegram::keyboards::download_link_keyboard;
use crate::telegram::texts;
use crate::telegram::Bot;

pub struct ChannelAnnouncer {
    bot: Bot,
    channel: Option<Recipient>,
}

impl ChannelAnnouncer {
    /// Announces into `PUBLIC_CHANNEL`; without one, announcements are skipped.
    pub fn new(bot: Bot) -> Self {
        let channel = config::channels::PUBLIC_CHANNEL.as_deref().map(channel_recipient);
        Self { bot, channel }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> AppResult<()> {
        let Some(channel) = self.channel.clone() else {
            log::info!(
                "No public channel configured, skipping announcement of {}",
                announcement.course_id
            );
            return Ok(());
        };

        let text = texts::announcement(
            &announcement.course_name,
            announcement.file_count,
            announcement.total_size,
        );
        let keyboard = download_link_keyboard(&announcement.deep_link);

        if let Some(banner) = &announcement.banner_id {
            let mut request = self
                .bot
                .send_photo(channel.clone(), InputFile::file_id(FileId(banner.clone())))
                .caption(text.clone())
                .parse_mode(ParseMode::Html);
            if let Some(keyboard) = keyboard.clone() {
                request = request.reply_markup(keyboard);
            }
            match request.await {
                Ok(_) => return Ok(()),
                Err(e) => log::warn!(
                    "Banner announcement for {} failed, falling back to text: {}",
                    announcement.course_id,
                    e
                ),
            }
        }

        let mut request = self.bot.send_message(channel, text).parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?;
        log::info!("Announced course {} ({})", announcement.course_name, announcement.course_id);
        Ok(())
    }
}
