//! Command handlers (/start, admin commands, tokens)

use std::sync::Arc;

use chrono::{Duration, Utc};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html;

use super::ingest::drive;
use super::types::{ensure_user_exists, HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::error::AppError;
use crate::core::utils::format_size;
use crate::course::publish::DEEP_LINK_PREFIX;
use crate::course::{AdminInput, IngestMode};
use crate::storage::courses;
use crate::storage::db;
use crate::storage::get_connection;
use crate::storage::tokens::{self, TokenVerdict};
use crate::telegram::bot::{sender_id, Command};
use crate::telegram::delivery::{request_course, show_course_menu};
use crate::telegram::keyboards::{broadcast_keyboard, course_download_button};
use crate::telegram::texts;
use crate::telegram::Bot;

/// `/addcourse links` starts link mode, anything else forward mode.
pub fn parse_ingest_mode(arg: &str) -> IngestMode {
    match arg.trim().to_lowercase().as_str() {
        "links" | "link" => IngestMode::Links,
        _ => IngestMode::Forward,
    }
}

/// Splits `<user_id> [rest]`.
pub fn parse_user_arg(arg: &str) -> Option<(i64, String)> {
    let mut parts = arg.trim().splitn(2, char::is_whitespace);
    let user_id = parts.next()?.parse().ok()?;
    let rest = parts.next().unwrap_or_default().trim().to_string();
    Some((user_id, rest))
}

/// 1-based page number, defaulting to the first page.
pub fn parse_page(arg: &str) -> usize {
    arg.trim().parse::<usize>().ok().filter(|p| *p > 0).unwrap_or(1)
}

/// Course id from `/course`, with or without the deep-link prefix.
pub fn parse_course_arg(arg: &str) -> &str {
    let arg = arg.trim();
    arg.strip_prefix(DEEP_LINK_PREFIX).unwrap_or(arg)
}

/// Row offset of a 1-based page.
pub fn page_offset(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// `[uses] [days]` for `/gentoken`, each falling back to its default.
pub fn parse_token_args(arg: &str) -> (i64, i64) {
    let mut parts = arg.split_whitespace();
    let uses = parts
        .next()
        .and_then(|p| p.parse().ok())
        .filter(|v: &i64| *v > 0)
        .unwrap_or(config::tokens::DEFAULT_USES);
    let days = parts
        .next()
        .and_then(|p| p.parse().ok())
        .filter(|v: &i64| *v > 0)
        .unwrap_or(config::tokens::DEFAULT_DAYS);
    (uses, days)
}

/// Days for `/premium`; `0` means no end date.
pub fn parse_premium_days(rest: &str) -> Option<i64> {
    match rest.split_whitespace().next().and_then(|p| p.parse::<i64>().ok()) {
        Some(0) => None,
        Some(days) if days > 0 => Some(days),
        _ => Some(config::premium::DEFAULT_DAYS),
    }
}

async fn reply_html(bot: &Bot, chat_id: ChatId, text: impl Into<String>) -> Result<(), HandlerError> {
    bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

/// Dispatches a parsed command.
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(&msg);
    let chat_id = msg.chat.id;
    log::info!("Command {:?} from {}", cmd, user_id);

    match cmd {
        Command::Start(arg) => handle_start_command(&bot, &msg, &deps, &arg).await,
        Command::Help => reply_html(&bot, chat_id, texts::HELP_TEXT).await,
        Command::About => {
            let count = {
                let conn = get_connection(&deps.db_pool)?;
                courses::course_count(&conn)?
            };
            reply_html(&bot, chat_id, texts::about_text(&deps.bot_username, count)).await
        }
        Command::Verify(token) => handle_verify_command(&bot, chat_id, user_id, &token, &deps).await,
        Command::Course(arg) => {
            let course_id = parse_course_arg(&arg);
            if course_id.is_empty() {
                return reply_html(&bot, chat_id, "Usage: <code>/course &lt;course_id&gt;</code>").await;
            }
            show_course_menu(&bot, &deps.db_pool, chat_id, course_id).await?;
            Ok(())
        }
        admin_cmd => {
            if !config::admin::is_admin(user_id) {
                bot.send_message(chat_id, texts::ADMIN_ONLY).await?;
                return Ok(());
            }
            handle_admin_command(&bot, chat_id, user_id, admin_cmd, &deps).await
        }
    }
}

/// /start with an optional `course_<id>` deep-link parameter
pub async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, arg: &str) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let first_name = msg.from.as_ref().map(|u| u.first_name.clone()).unwrap_or_default();
    ensure_user_exists(&deps.db_pool, bot, user_id, &first_name);

    if let Some(course_id) = arg.trim().strip_prefix(DEEP_LINK_PREFIX) {
        request_course(
            bot,
            Arc::clone(&deps.db_pool),
            &deps.pending_downloads,
            msg.chat.id,
            user_id,
            course_id,
        )
        .await?;
        return Ok(());
    }

    reply_html(bot, msg.chat.id, texts::start_text(&first_name, &deps.bot_username)).await
}

async fn handle_verify_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    token: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if !*config::access::TOKEN_VERIFICATION_ENABLED {
        bot.send_message(chat_id, texts::TOKENS_DISABLED).await?;
        return Ok(());
    }
    let token = token.trim();
    if token.is_empty() {
        return reply_html(bot, chat_id, texts::NEEDS_VERIFICATION).await;
    }

    let verdict = {
        let conn = get_connection(&deps.db_pool)?;
        let verdict = tokens::verify_token(&conn, token)?;
        if verdict == TokenVerdict::Valid {
            db::update_user_verification(&conn, user_id, true)?;
        }
        verdict
    };
    log::info!("User {} redeemed token: {:?}", user_id, verdict);

    let prefix = if verdict == TokenVerdict::Valid { "✅" } else { "❌" };
    bot.send_message(chat_id, format!("{} {}", prefix, verdict)).await?;
    Ok(())
}

async fn handle_admin_command(
    bot: &Bot,
    chat_id: ChatId,
    admin_id: i64,
    cmd: Command,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    match cmd {
        Command::Addcourse(arg) => {
            let mode = parse_ingest_mode(&arg);
            drive(bot, deps, chat_id, admin_id, AdminInput::Start { mode }).await?;
        }
        Command::Done => drive(bot, deps, chat_id, admin_id, AdminInput::Done).await?,
        Command::Skip => drive(bot, deps, chat_id, admin_id, AdminInput::Skip).await?,
        Command::Cancel => drive(bot, deps, chat_id, admin_id, AdminInput::Cancel).await?,
        Command::Stats => handle_stats_command(bot, chat_id, deps).await?,
        Command::Courses(arg) => handle_courses_command(bot, chat_id, deps, parse_page(&arg)).await?,
        Command::Deletecourse(arg) => {
            let course_id = arg.trim();
            if course_id.is_empty() {
                return reply_html(bot, chat_id, "Usage: <code>/deletecourse &lt;course_id&gt;</code>").await;
            }
            let result = {
                let conn = get_connection(&deps.db_pool)?;
                courses::delete_course(&conn, course_id)
            };
            let text = match result {
                Ok(()) => {
                    log::info!("Admin {} deleted course {}", admin_id, course_id);
                    format!("🗑 Course <code>{}</code> deleted.", html::escape(course_id))
                }
                Err(AppError::NotFound(_)) => texts::COURSE_NOT_FOUND.to_string(),
                Err(e) => return Err(e.into()),
            };
            reply_html(bot, chat_id, text).await?;
        }
        Command::Premium(arg) => handle_premium_command(bot, chat_id, deps, &arg).await?,
        Command::Unpremium(arg) => {
            let Some((user_id, _)) = parse_user_arg(&arg) else {
                return reply_html(bot, chat_id, "Usage: <code>/unpremium &lt;user_id&gt;</code>").await;
            };
            {
                let conn = get_connection(&deps.db_pool)?;
                db::set_premium_status(&conn, user_id, false, None)?;
            }
            reply_html(bot, chat_id, format!("Premium removed from <code>{}</code>.", user_id)).await?;
        }
        Command::Ban(arg) => {
            let Some((user_id, reason)) = parse_user_arg(&arg) else {
                return reply_html(bot, chat_id, "Usage: <code>/ban &lt;user_id&gt; [reason]</code>").await;
            };
            let reason = if reason.is_empty() { "No reason given".to_string() } else { reason };
            {
                let conn = get_connection(&deps.db_pool)?;
                db::ban_user(&conn, user_id, &reason)?;
            }
            log::info!("Admin {} banned {}: {}", admin_id, user_id, reason);
            reply_html(
                bot,
                chat_id,
                format!("🚫 <code>{}</code> banned: {}", user_id, html::escape(&reason)),
            )
            .await?;
        }
        Command::Unban(arg) => {
            let Some((user_id, _)) = parse_user_arg(&arg) else {
                return reply_html(bot, chat_id, "Usage: <code>/unban &lt;user_id&gt;</code>").await;
            };
            let unbanned = {
                let conn = get_connection(&deps.db_pool)?;
                db::unban_user(&conn, user_id)?
            };
            let text = if unbanned {
                format!("✅ <code>{}</code> unbanned.", user_id)
            } else {
                format!("No user <code>{}</code> found.", user_id)
            };
            reply_html(bot, chat_id, text).await?;
        }
        Command::Gentoken(arg) => {
            if !*config::access::TOKEN_VERIFICATION_ENABLED {
                bot.send_message(chat_id, texts::TOKENS_DISABLED).await?;
                return Ok(());
            }
            let (uses, days) = parse_token_args(&arg);
            let token = {
                let conn = get_connection(&deps.db_pool)?;
                tokens::create_token(&conn, admin_id, days, uses)?
            };
            reply_html(
                bot,
                chat_id,
                texts::token_created(&token.token, uses, days, &deps.bot_username),
            )
            .await?;
        }
        Command::Mytokens => {
            if !*config::access::TOKEN_VERIFICATION_ENABLED {
                bot.send_message(chat_id, texts::TOKENS_DISABLED).await?;
                return Ok(());
            }
            let list = {
                let conn = get_connection(&deps.db_pool)?;
                tokens::list_tokens_by(&conn, admin_id)?
            };
            let text = if list.is_empty() {
                "You haven't created any tokens.".to_string()
            } else {
                let mut text = String::from("🔑 <b>Your tokens</b>\n");
                for token in list {
                    text.push_str(&format!(
                        "\n<code>{}</code>\n{} / {} uses, expires {}, {}\n",
                        token.token,
                        token.usage_count,
                        token.usage_limit,
                        token.expires_at,
                        if token.is_active { "active" } else { "revoked" }
                    ));
                }
                text
            };
            reply_html(bot, chat_id, text).await?;
        }
        Command::Revoketoken(arg) => {
            if !*config::access::TOKEN_VERIFICATION_ENABLED {
                bot.send_message(chat_id, texts::TOKENS_DISABLED).await?;
                return Ok(());
            }
            let token = arg.trim();
            let revoked = {
                let conn = get_connection(&deps.db_pool)?;
                tokens::deactivate_token(&conn, token)?
            };
            let text = if revoked { "Token revoked." } else { "Token not found." };
            bot.send_message(chat_id, text).await?;
        }
        Command::Start(_) | Command::Help | Command::About | Command::Verify(_) | Command::Course(_) => {}
    }
    Ok(())
}

async fn handle_stats_command(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (course_count, user_count, used, banned) = {
        let conn = get_connection(&deps.db_pool)?;
        (
            courses::course_count(&conn)?,
            db::user_count(&conn)?,
            courses::used_storage(&conn)?,
            db::get_banned(&conn)?.len(),
        )
    };
    let text = format!(
        "📊 <b>Bot statistics</b>\n\nCourses: {}\nUsers: {}\nBanned: {}\nStorage used: {}\nDrafts in progress: {}",
        course_count,
        user_count,
        banned,
        format_size(used),
        deps.machine.conversations().len()
    );
    reply_html(bot, chat_id, text).await
}

async fn handle_courses_command(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, page: usize) -> Result<(), HandlerError> {
    let page_size = config::search::LIST_PAGE_SIZE;
    let listing = {
        let conn = get_connection(&deps.db_pool)?;
        courses::get_all_courses(&conn, page_size, page_offset(page, page_size))?
    };

    if listing.courses.is_empty() {
        bot.send_message(chat_id, "No courses on this page.").await?;
        return Ok(());
    }

    let pages = listing.total.div_ceil(page_size);
    let mut text = format!("📚 <b>Courses</b> (page {} of {}, {} total)\n", page, pages, listing.total);
    for course in &listing.courses {
        text.push_str(&format!(
            "\n• {} ({} files, {})\n  <code>{}</code>",
            html::escape(&course.course_name),
            course.file_count,
            format_size(course.total_size),
            course.course_id
        ));
    }
    if listing.next_offset.is_some() {
        text.push_str(&format!("\n\nNext page: /courses {}", page.saturating_add(1)));
    }

    let buttons = listing
        .courses
        .iter()
        .map(|c| vec![course_download_button(&c.course_name, &c.course_id)])
        .collect::<Vec<_>>();

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(InlineKeyboardMarkup::new(buttons))
        .await?;
    Ok(())
}

async fn handle_premium_command(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, arg: &str) -> Result<(), HandlerError> {
    let Some((user_id, rest)) = parse_user_arg(arg) else {
        return reply_html(bot, chat_id, "Usage: <code>/premium &lt;user_id&gt; [days]</code>").await;
    };
    let days = parse_premium_days(&rest);
    let expiry = days.map(|d| Utc::now() + Duration::days(d));
    let known = {
        let conn = get_connection(&deps.db_pool)?;
        let known = db::is_user_exist(&conn, user_id)?;
        db::set_premium_status(&conn, user_id, true, expiry)?;
        known
    };

    let period = match days {
        Some(d) => format!("for {} day(s)", d),
        None => "without an end date".to_string(),
    };
    log::info!("Premium granted to {} {}", user_id, period);
    reply_html(bot, chat_id, format!("💎 <code>{}</code> is premium {}.", user_id, period)).await?;

    // Users who never started the bot cannot be messaged
    if !known {
        reply_html(bot, chat_id, "ℹ️ This user hasn't started the bot yet, so they were not notified.").await?;
        return Ok(());
    }
    if let Err(e) = bot
        .send_message(ChatId(user_id), format!("💎 You've been granted premium access {}.", period))
        .await
    {
        log::warn!("Could not notify {} about premium: {}", user_id, e);
    }
    Ok(())
}

/// /broadcast (hidden): stores the text and asks for confirmation
pub async fn handle_broadcast_command(bot: &Bot, chat_id: ChatId, admin_id: i64, message_text: &str, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !config::admin::is_admin(admin_id) {
        bot.send_message(chat_id, texts::ADMIN_ONLY).await?;
        return Ok(());
    }

    let text = message_text
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default();
    if text.is_empty() {
        return reply_html(bot, chat_id, texts::BROADCAST_USAGE).await;
    }

    let users = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_all_users(&conn)?.len() as i64
    };
    deps.pending_broadcasts.insert(admin_id, text.to_string());
    bot.send_message(chat_id, texts::broadcast_confirm(text, users))
        .parse_mode(ParseMode::Html)
        .reply_markup(broadcast_keyboard())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingest_mode() {
        assert_eq!(parse_ingest_mode(""), IngestMode::Forward);
        assert_eq!(parse_ingest_mode(" Links "), IngestMode::Links);
        assert_eq!(parse_ingest_mode("whatever"), IngestMode::Forward);
    }

    #[test]
    fn test_parse_user_arg() {
        assert_eq!(parse_user_arg("42 spamming a lot"), Some((42, "spamming a lot".to_string())));
        assert_eq!(parse_user_arg("42"), Some((42, String::new())));
        assert_eq!(parse_user_arg("abc"), None);
        assert_eq!(parse_user_arg(""), None);
    }

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(""), 1);
        assert_eq!(parse_page("0"), 1);
        assert_eq!(parse_page("3"), 3);
    }

    #[test]
    fn test_parse_course_arg() {
        assert_eq!(parse_course_arg(" course_abc-1 "), "abc-1");
        assert_eq!(parse_course_arg("abc-1"), "abc-1");
        assert_eq!(parse_course_arg("  "), "");
    }

    #[test]
    fn test_page_offset_saturates() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        let huge = parse_page(&usize::MAX.to_string());
        assert_eq!(page_offset(huge, 10), usize::MAX);
    }

    #[test]
    fn test_parse_token_args() {
        assert_eq!(parse_token_args(""), (config::tokens::DEFAULT_USES, config::tokens::DEFAULT_DAYS));
        assert_eq!(parse_token_args("5 7"), (5, 7));
        assert_eq!(parse_token_args("-1 x"), (config::tokens::DEFAULT_USES, config::tokens::DEFAULT_DAYS));
    }

    #[test]
    fn test_parse_premium_days() {
        assert_eq!(parse_premium_days(""), Some(config::premium::DEFAULT_DAYS));
        assert_eq!(parse_premium_days("7"), Some(7));
        assert_eq!(parse_premium_days("0"), None);
    }
}
