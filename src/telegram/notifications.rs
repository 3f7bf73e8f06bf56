use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;

use crate::core::config;
use crate::telegram::bot::channel_recipient;
use crate::telegram::Bot;

/// Every admin plus `extra`, each once, in configuration order.
pub fn admin_recipients(admins: &[i64], extra: i64) -> Vec<i64> {
    let mut recipients = admins.to_vec();
    if !recipients.contains(&extra) {
        recipients.push(extra);
    }
    recipients
}

async fn notify_each(bot: &Bot, recipients: &[i64], text: &str) {
    for admin_id in recipients {
        if let Err(e) = bot
            .send_message(ChatId(*admin_id), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            log::error!("Failed to notify admin {}: {}", admin_id, e);
        }
    }
}

/// Sends an HTML message to every configured admin.
///
/// Failures are logged per admin and never propagated.
pub async fn notify_admins(bot: &Bot, text: &str) {
    notify_each(bot, &config::admin::ADMIN_IDS, text).await;
}

/// Like [`notify_admins`], making sure `acting_admin` hears about it too.
pub async fn notify_admins_and(bot: &Bot, acting_admin: i64, text: &str) {
    notify_each(bot, &admin_recipients(&config::admin::ADMIN_IDS, acting_admin), text).await;
}

/// Posts an HTML line to `LOG_CHANNEL`, if one is configured.
pub async fn log_to_channel(bot: &Bot, text: &str) {
    let Some(channel) = config::channels::LOG_CHANNEL.as_deref() else {
        return;
    };
    if let Err(e) = bot
        .send_message(channel_recipient(channel), text)
        .parse_mode(ParseMode::Html)
        .await
    {
        log::warn!("Failed to write to log channel: {}", e);
    }
}

pub fn new_user_line(user_id: i64, first_name: &str) -> String {
    format!(
        "#NewUser\nID: <code>{}</code>\nName: <a href=\"tg://user?id={}\">{}</a>",
        user_id,
        user_id,
        html::escape(first_name)
    )
}

pub async fn notify_new_user(bot: &Bot, user_id: i64, first_name: &str) {
    log_to_channel(bot, &new_user_line(user_id, first_name)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_recipients_include_actor_once() {
        assert_eq!(admin_recipients(&[1, 2, 3], 2), vec![1, 2, 3]);
        assert_eq!(admin_recipients(&[1, 2], 9), vec![1, 2, 9]);
        assert_eq!(admin_recipients(&[], 9), vec![9]);
    }

    #[test]
    fn test_new_user_line_escapes_name() {
        let line = new_user_line(42, "<Ann>");
        assert!(line.contains("<code>42</code>"));
        assert!(line.contains("&lt;Ann&gt;"));
    }
}
