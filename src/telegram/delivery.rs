//! Sending a published course to a user.
//!
//! Files are re-sent by their stored Telegram file ids, one by one, in course
//! order. Nothing is downloaded or re-uploaded.

use std::sync::Arc;

use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, MessageId, ParseMode};

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::utils::{readable_duration, render_caption};
use crate::course::MediaKind;
use crate::storage::courses::{self, Course, CourseFile};
use crate::storage::db::{self, DbPool};
use crate::telegram::bot::channel_url;
use crate::telegram::gates::{self, GateDecision, GateSettings};
use crate::telegram::keyboards::{completion_keyboard, course_files_keyboard, join_channel_keyboard, tutorial_keyboard};
use crate::telegram::texts;
use crate::telegram::Bot;

/// Course a user asked for while failing the subscription gate, keyed by user id.
pub type PendingDownloads = DashMap<i64, String>;

/// Telegram's caption limit in characters.
const MAX_CAPTION_CHARS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { sent: usize, total: usize },
    NotFound,
    Empty,
    Gated(GateDecision),
    MenuShown { files: usize },
}

pub fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= MAX_CAPTION_CHARS {
        return caption.to_string();
    }
    let mut truncated: String = caption.chars().take(MAX_CAPTION_CHARS - 1).collect();
    truncated.push('…');
    truncated
}

fn caption_for(file: &CourseFile, course_name: &str) -> String {
    let caption = match file.caption.as_deref() {
        Some(caption) if !caption.trim().is_empty() => caption.to_string(),
        _ => render_caption(&config::captions::CUSTOM_FILE_CAPTION, &file.file_name, course_name),
    };
    truncate_caption(&caption)
}

macro_rules! send_cached {
    ($request:expr, $caption:expr, $keyboard:expr) => {{
        let mut request = $request
            .caption($caption)
            .protect_content(*config::delivery::PROTECT_CONTENT);
        if let Some(keyboard) = $keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await
    }};
}

async fn send_file(bot: &Bot, chat_id: ChatId, file: &CourseFile, course_name: &str) -> Result<Message, teloxide::RequestError> {
    let input = InputFile::file_id(FileId(file.file_id.clone()));
    let caption = caption_for(file, course_name);
    let keyboard = config::delivery::TUTORIAL_URL.as_deref().and_then(tutorial_keyboard);

    match file.media_kind {
        MediaKind::Document => send_cached!(bot.send_document(chat_id, input), caption, keyboard),
        MediaKind::Video => send_cached!(bot.send_video(chat_id, input), caption, keyboard),
        MediaKind::Audio => send_cached!(bot.send_audio(chat_id, input), caption, keyboard),
        MediaKind::Photo => send_cached!(bot.send_photo(chat_id, input), caption, keyboard),
        MediaKind::Animation => send_cached!(bot.send_animation(chat_id, input), caption, keyboard),
        MediaKind::Voice => send_cached!(bot.send_voice(chat_id, input), caption, keyboard),
    }
}

fn schedule_deletion(bot: Bot, chat_id: ChatId, message_ids: Vec<MessageId>, after: std::time::Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        for message_id in message_ids {
            if let Err(e) = bot.delete_message(chat_id, message_id).await {
                log::debug!("Auto-delete of {} in {} failed: {}", message_id.0, chat_id, e);
            }
        }
    });
}

/// Sends every file of `course`, then the completion message.
///
/// Per-file failures are logged and skipped. Returns how many files went out.
pub async fn send_course(bot: &Bot, chat_id: ChatId, course: &Course, files: &[CourseFile]) -> AppResult<usize> {
    let total_size = files.iter().map(|f| f.file_size).sum();
    let intro = bot
        .send_message(chat_id, texts::delivery_start(&course.course_name, files.len(), total_size))
        .parse_mode(ParseMode::Html)
        .await?;

    let mut sent_ids = vec![intro.id];
    for (index, file) in files.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(config::delivery::send_delay()).await;
        }
        match send_file(bot, chat_id, file, &course.course_name).await {
            Ok(message) => sent_ids.push(message.id),
            Err(teloxide::RequestError::RetryAfter(wait)) => {
                log::warn!("Rate limited delivering {}, waiting {:?}", course.course_id, wait.duration());
                tokio::time::sleep(wait.duration()).await;
                match send_file(bot, chat_id, file, &course.course_name).await {
                    Ok(message) => sent_ids.push(message.id),
                    Err(e) => log::error!("Failed to send {} of {}: {}", file.file_name, course.course_id, e),
                }
            }
            Err(e) => log::error!("Failed to send {} of {}: {}", file.file_name, course.course_id, e),
        }
    }
    let sent = sent_ids.len() - 1;

    let updates = config::channels::PUBLIC_CHANNEL.as_deref().and_then(channel_url);
    let done = bot
        .send_message(chat_id, texts::delivery_done(sent, files.len()))
        .reply_markup(completion_keyboard(updates))
        .await?;

    if let Some(after) = config::delivery::auto_delete_after() {
        sent_ids.push(done.id);
        let notice = bot
            .send_message(chat_id, texts::auto_delete_notice(&readable_duration(after)))
            .await?;
        sent_ids.push(notice.id);
        schedule_deletion(bot.clone(), chat_id, sent_ids, after);
    }

    log::info!(
        "Delivered {}/{} files of course {} to {}",
        sent,
        files.len(),
        course.course_id,
        chat_id
    );
    Ok(sent)
}

fn load_course(pool: &DbPool, course_id: &str) -> AppResult<(Option<Course>, Vec<CourseFile>)> {
    let conn = db::get_connection(pool)?;
    let course = courses::get_course_by_id(&conn, course_id)?;
    let files = match &course {
        Some(_) => courses::get_files_for_course(&conn, course_id)?,
        None => Vec::new(),
    };
    Ok((course, files))
}

/// Runs the access gates for `user_id` and tells them what is missing.
///
/// Returns the decision; anything but `Allow` has already been answered.
async fn check_gates(
    bot: &Bot,
    pool: &DbPool,
    pending: &PendingDownloads,
    chat_id: ChatId,
    user_id: i64,
    course_id: &str,
) -> AppResult<GateDecision> {
    let settings = GateSettings::from_config();
    let facts = gates::collect_facts(bot, pool, settings, user_id).await?;
    let decision = gates::decide(settings, facts);
    match decision {
        GateDecision::Allow | GateDecision::Ignore => {}
        GateDecision::JoinChannel => {
            pending.insert(user_id, course_id.to_string());
            let invite = config::channels::FORCE_SUB_CHANNEL.as_deref().and_then(channel_url);
            bot.send_message(chat_id, texts::JOIN_CHANNEL)
                .parse_mode(ParseMode::Html)
                .reply_markup(join_channel_keyboard(invite, course_id))
                .await?;
        }
        GateDecision::NeedsVerification => {
            bot.send_message(chat_id, texts::NEEDS_VERIFICATION)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        GateDecision::NeedsPremium => {
            bot.send_message(chat_id, texts::NEEDS_PREMIUM).await?;
        }
    }
    Ok(decision)
}

/// Handles a download request: lookup, gates, then delivery.
pub async fn request_course(
    bot: &Bot,
    pool: Arc<DbPool>,
    pending: &PendingDownloads,
    chat_id: ChatId,
    user_id: i64,
    course_id: &str,
) -> AppResult<DeliveryOutcome> {
    let (course, files) = load_course(&pool, course_id)?;

    let Some(course) = course else {
        bot.send_message(chat_id, texts::COURSE_NOT_FOUND).await?;
        return Ok(DeliveryOutcome::NotFound);
    };
    if files.is_empty() {
        bot.send_message(chat_id, texts::COURSE_EMPTY).await?;
        return Ok(DeliveryOutcome::Empty);
    }

    match check_gates(bot, &pool, pending, chat_id, user_id, &course.course_id).await? {
        GateDecision::Allow => {}
        decision => return Ok(DeliveryOutcome::Gated(decision)),
    }

    pending.remove(&user_id);
    let sent = send_course(bot, chat_id, &course, &files).await?;
    Ok(DeliveryOutcome::Delivered {
        sent,
        total: files.len(),
    })
}

/// Sends the single file at `file_order`, behind the same gates as a full course.
pub async fn request_file(
    bot: &Bot,
    pool: Arc<DbPool>,
    pending: &PendingDownloads,
    chat_id: ChatId,
    user_id: i64,
    course_id: &str,
    file_order: i64,
) -> AppResult<DeliveryOutcome> {
    let (course, files) = load_course(&pool, course_id)?;

    let Some(course) = course else {
        bot.send_message(chat_id, texts::COURSE_NOT_FOUND).await?;
        return Ok(DeliveryOutcome::NotFound);
    };
    let Some(file) = files.iter().find(|f| f.file_order == file_order) else {
        bot.send_message(chat_id, texts::FILE_NOT_FOUND).await?;
        return Ok(DeliveryOutcome::NotFound);
    };

    match check_gates(bot, &pool, pending, chat_id, user_id, &course.course_id).await? {
        GateDecision::Allow => {}
        decision => return Ok(DeliveryOutcome::Gated(decision)),
    }

    pending.remove(&user_id);
    let message = send_file(bot, chat_id, file, &course.course_name).await?;
    if let Some(after) = config::delivery::auto_delete_after() {
        schedule_deletion(bot.clone(), chat_id, vec![message.id], after);
    }
    log::info!(
        "Delivered file {} of course {} to {}",
        file.file_order,
        course.course_id,
        chat_id
    );
    Ok(DeliveryOutcome::Delivered { sent: 1, total: 1 })
}

/// Shows a course card with one button per file and a "download all" button.
///
/// The card goes on the banner when the course has one. No gates apply until a
/// button is pressed.
pub async fn show_course_menu(bot: &Bot, pool: &DbPool, chat_id: ChatId, course_id: &str) -> AppResult<DeliveryOutcome> {
    let (course, files) = load_course(pool, course_id)?;

    let Some(course) = course else {
        bot.send_message(chat_id, texts::COURSE_NOT_FOUND).await?;
        return Ok(DeliveryOutcome::NotFound);
    };
    if files.is_empty() {
        bot.send_message(chat_id, texts::COURSE_EMPTY).await?;
        return Ok(DeliveryOutcome::Empty);
    }

    let total_size = files.iter().map(|f| f.file_size).sum();
    let card = texts::course_menu(&course.course_name, files.len(), total_size);
    let keyboard = course_files_keyboard(&course.course_id, &files);

    let on_banner = match course.banner_id.as_deref() {
        Some(banner) => match bot
            .send_photo(chat_id, InputFile::file_id(FileId(banner.to_string())))
            .caption(card.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Banner of {} could not be sent, using text card: {}", course.course_id, e);
                false
            }
        },
        None => false,
    };
    if !on_banner {
        bot.send_message(chat_id, card)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
    }

    Ok(DeliveryOutcome::MenuShown { files: files.len() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(caption: Option<&str>) -> CourseFile {
        CourseFile {
            course_id: "c1".to_string(),
            file_id: "f1".to_string(),
            file_name: "intro.pdf".to_string(),
            file_size: 10,
            caption: caption.map(str::to_string),
            file_order: 1,
            media_kind: MediaKind::Document,
        }
    }

    #[test]
    fn test_stored_caption_wins() {
        assert_eq!(caption_for(&file(Some("Lesson 1")), "Chess"), "Lesson 1");
    }

    #[test]
    fn test_missing_caption_uses_template() {
        let caption = caption_for(&file(Some("   ")), "Chess");
        assert!(caption.contains("intro.pdf"));
    }

    #[test]
    fn test_truncate_caption() {
        assert_eq!(truncate_caption("short"), "short");
        let long = "a".repeat(2000);
        let truncated = truncate_caption(&long);
        assert_eq!(truncated.chars().count(), MAX_CAPTION_CHARS);
        assert!(truncated.ends_with('…'));
    }
}
