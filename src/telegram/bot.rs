//! Bot initialization and command definitions
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation and command menu setup
//! - Channel addressing helpers shared by announcements and gates

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, BotCommandScope, Recipient};
use teloxide::utils::command::BotCommands;
use url::Url;

use crate::core::config;

/// Bot commands enum with descriptions
///
/// Commands that take arguments carry the raw remainder of the message.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot or open a course link")]
    Start(String),
    #[command(description = "how to find and download courses")]
    Help,
    #[command(description = "about this bot")]
    About,
    #[command(description = "verify an access token: /verify <token>")]
    Verify(String),
    #[command(description = "pick single files of a course: /course <course_id>")]
    Course(String),
    #[command(description = "add a course (admin): /addcourse [links]")]
    Addcourse(String),
    #[command(description = "finish adding files (admin)")]
    Done,
    #[command(description = "skip the banner step (admin)")]
    Skip,
    #[command(description = "cancel course creation (admin)")]
    Cancel,
    #[command(description = "bot statistics (admin)")]
    Stats,
    #[command(description = "list courses (admin): /courses [page]")]
    Courses(String),
    #[command(description = "delete a course (admin): /deletecourse <id>")]
    Deletecourse(String),
    #[command(description = "grant premium (admin): /premium <user_id> [days]")]
    Premium(String),
    #[command(description = "revoke premium (admin): /unpremium <user_id>")]
    Unpremium(String),
    #[command(description = "ban a user (admin): /ban <user_id> [reason]")]
    Ban(String),
    #[command(description = "unban a user (admin): /unban <user_id>")]
    Unban(String),
    #[command(description = "create an access token (admin): /gentoken [uses] [days]")]
    Gentoken(String),
    #[command(description = "list your access tokens (admin)")]
    Mytokens,
    #[command(description = "deactivate an access token (admin): /revoketoken <token>")]
    Revoketoken(String),
}

/// Creates a Bot instance from `BOT_TOKEN` (or `TELOXIDE_TOKEN`)
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token or HTTP client setup failure
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.trim();
    if token.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::with_client(token, client).set_api_url(url)
    } else {
        Bot::with_client(token, client)
    };

    Ok(bot)
}

fn user_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "start the bot"),
        BotCommand::new("help", "how to find and download courses"),
        BotCommand::new("about", "about this bot"),
        BotCommand::new("verify", "verify an access token"),
        BotCommand::new("course", "pick single files of a course"),
    ]
}

fn admin_commands() -> Vec<BotCommand> {
    let mut commands = user_commands();
    commands.extend([
        BotCommand::new("addcourse", "add a course (append 'links' for link mode)"),
        BotCommand::new("done", "finish adding files"),
        BotCommand::new("skip", "skip the banner"),
        BotCommand::new("cancel", "cancel course creation"),
        BotCommand::new("stats", "bot statistics"),
        BotCommand::new("courses", "list courses"),
        BotCommand::new("deletecourse", "delete a course"),
        BotCommand::new("premium", "grant premium"),
        BotCommand::new("unpremium", "revoke premium"),
        BotCommand::new("ban", "ban a user"),
        BotCommand::new("unban", "unban a user"),
        BotCommand::new("broadcast", "message every user"),
        BotCommand::new("gentoken", "create an access token"),
        BotCommand::new("mytokens", "list your tokens"),
        BotCommand::new("revoketoken", "deactivate a token"),
    ]);
    commands
}

/// Sets up bot commands in Telegram UI
///
/// Everyone sees the user commands; each admin's private chat additionally
/// lists the admin commands.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(user_commands()).await?;

    for admin_id in config::admin::ADMIN_IDS.iter() {
        if let Err(e) = bot
            .set_my_commands(admin_commands())
            .scope(BotCommandScope::Chat {
                chat_id: Recipient::Id(ChatId(*admin_id)),
            })
            .await
        {
            log::warn!("Failed to set admin commands for {}: {}", admin_id, e);
        }
    }

    Ok(())
}

/// Addresses a configured channel: numeric ids as chat ids, anything else as
/// a public `@username`.
pub fn channel_recipient(channel: &str) -> Recipient {
    match channel.trim().parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(format!("@{}", channel.trim().trim_start_matches('@'))),
    }
}

/// Public `t.me` URL of a channel configured by username.
pub fn channel_url(channel: &str) -> Option<Url> {
    match channel_recipient(channel) {
        Recipient::ChannelUsername(name) => Url::parse(&format!("https://t.me/{}", name.trim_start_matches('@'))).ok(),
        Recipient::Id(_) => None,
    }
}

/// Telegram user id of a message sender, 0 for anonymous senders.
pub fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions() {
        let commands = Command::descriptions();
        let command_list = format!("{}", commands);

        assert!(command_list.contains("Available commands"));
        assert!(command_list.contains("addcourse"));
        assert!(command_list.contains("verify"));
    }

    #[test]
    fn test_command_parsing_keeps_arguments() {
        assert_eq!(
            Command::parse("/addcourse links", "CourseBot").unwrap(),
            Command::Addcourse("links".to_string())
        );
        assert_eq!(
            Command::parse("/start course_abc", "CourseBot").unwrap(),
            Command::Start("course_abc".to_string())
        );
        assert_eq!(
            Command::parse("/course abc-1", "CourseBot").unwrap(),
            Command::Course("abc-1".to_string())
        );
        assert_eq!(Command::parse("/done", "CourseBot").unwrap(), Command::Done);
    }

    #[test]
    fn test_channel_recipient() {
        assert_eq!(channel_recipient("-1001234"), Recipient::Id(ChatId(-1001234)));
        assert_eq!(
            channel_recipient("@courses"),
            Recipient::ChannelUsername("@courses".to_string())
        );
        assert_eq!(
            channel_url("courses").map(|u| u.to_string()),
            Some("https://t.me/courses".to_string())
        );
        assert!(channel_url("-1001234").is_none());
    }

    #[test]
    fn test_admin_menu_extends_user_menu() {
        assert!(admin_commands().len() > user_commands().len());
        assert!(admin_commands().iter().any(|c| c.command == "broadcast"));
    }
}
