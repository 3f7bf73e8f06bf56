//! Inline course search (`@bot <query>` from any chat).

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineQuery, InlineQueryResult, InlineQueryResultArticle, InlineQueryResultCachedPhoto,
    InputMessageContent, InputMessageContentText, ParseMode,
};
use teloxide::utils::html;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::utils::format_size;
use crate::course::deep_link;
use crate::storage::courses::{self, Course};
use crate::storage::db::{self, DbPool};
use crate::telegram::keyboards::inline_result_keyboard;
use crate::telegram::shortener::{maybe_shorten, Shortener};
use crate::telegram::Bot;

/// Short cache for hint and empty-result answers.
const HINT_CACHE_SECS: u32 = 5;

pub fn parse_offset(raw: &str) -> usize {
    raw.trim().parse().unwrap_or(0)
}

fn text_article(id: &str, title: &str, description: String, body: String) -> InlineQueryResult {
    InlineQueryResult::Article(
        InlineQueryResultArticle::new(
            id,
            title,
            InputMessageContent::Text(InputMessageContentText::new(body).parse_mode(ParseMode::Html)),
        )
        .description(description),
    )
}

pub fn hint_result(bot_username: &str) -> InlineQueryResult {
    text_article(
        "hint",
        "Search for courses",
        "Type a course name to search".to_string(),
        format!(
            "<b>How to use inline search:</b>\nType <code>@{bot} course name</code> in any chat.\n\nExample: <code>@{bot} opening strategies</code>",
            bot = bot_username
        ),
    )
}

pub fn no_results(query: &str) -> InlineQueryResult {
    text_article(
        "no_results",
        "No courses found",
        format!("Nothing matches '{}'", query),
        format!("No courses found for: <b>{}</b>", html::escape(query)),
    )
}

fn course_card(course: &Course) -> String {
    format!(
        "<b>📚 {}</b>\n\nFiles: {}\nTotal size: {}",
        html::escape(&course.course_name),
        course.file_count,
        format_size(course.total_size)
    )
}

/// One search hit. Courses with a banner show as a cached photo.
pub fn course_result(course: &Course, link: &str) -> InlineQueryResult {
    let description = format!("{} files • {}", course.file_count, format_size(course.total_size));
    let keyboard = inline_result_keyboard(link);

    if let Some(banner) = &course.banner_id {
        let mut photo = InlineQueryResultCachedPhoto::new(course.course_id.clone(), FileId(banner.clone()))
            .title(course.course_name.clone())
            .description(description)
            .caption(course_card(course))
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            photo = photo.reply_markup(keyboard);
        }
        return InlineQueryResult::CachedPhoto(photo);
    }

    let body = format!("{}\n\nUse the button below to get this course.", course_card(course));
    let mut article = InlineQueryResultArticle::new(
        course.course_id.clone(),
        course.course_name.clone(),
        InputMessageContent::Text(InputMessageContentText::new(body).parse_mode(ParseMode::Html)),
    )
    .description(description);
    if let Some(keyboard) = keyboard {
        article = article.reply_markup(keyboard);
    }
    InlineQueryResult::Article(article)
}

/// Answers an inline query with one page of matching courses.
pub async fn answer_search(
    bot: &Bot,
    pool: Arc<DbPool>,
    shortener: Option<&Shortener>,
    bot_username: &str,
    query: &InlineQuery,
) -> AppResult<()> {
    let text = query.query.trim();
    if text.is_empty() {
        bot.answer_inline_query(query.id.clone(), vec![hint_result(bot_username)])
            .cache_time(HINT_CACHE_SECS)
            .await?;
        return Ok(());
    }

    let offset = parse_offset(&query.offset);
    let page = {
        let conn = db::get_connection(&pool)?;
        courses::search_courses(&conn, text, config::search::INLINE_PAGE_SIZE, offset)?
    };

    if page.courses.is_empty() && offset == 0 {
        bot.answer_inline_query(query.id.clone(), vec![no_results(text)])
            .cache_time(HINT_CACHE_SECS)
            .await?;
        return Ok(());
    }

    let mut results = Vec::with_capacity(page.courses.len());
    for course in &page.courses {
        let link = maybe_shorten(shortener, &deep_link(bot_username, &course.course_id)).await;
        results.push(course_result(course, &link));
    }

    log::debug!(
        "Inline query '{}' offset {}: {} of {} courses",
        text,
        offset,
        results.len(),
        page.total
    );

    bot.answer_inline_query(query.id.clone(), results)
        .cache_time(config::search::INLINE_CACHE_SECS)
        .next_offset(page.next_offset.map(|o| o.to_string()).unwrap_or_default())
        .await?;
    Ok(())
}
