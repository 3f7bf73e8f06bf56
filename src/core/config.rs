use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: courses.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "courses.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: coursebot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "coursebot.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Public URL Telegram should deliver updates to in webhook mode
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env_non_empty("WEBHOOK_URL"));

/// Local port the webhook listener binds to
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
});

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    pub(crate) fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    /// Whether the given Telegram user id belongs to an admin
    pub fn is_admin(user_id: i64) -> bool {
        ADMIN_IDS.contains(&user_id)
    }
}

/// Channel configuration
///
/// Channel values are either numeric chat ids (`-100...`) or public usernames
/// (with or without a leading `@`).
pub mod channels {
    use super::env_non_empty;
    use once_cell::sync::Lazy;

    /// Channel new courses are announced in
    pub static PUBLIC_CHANNEL: Lazy<Option<String>> = Lazy::new(|| env_non_empty("PUBLIC_CHANNEL"));

    /// Channel receiving startup and new-user log lines
    pub static LOG_CHANNEL: Lazy<Option<String>> = Lazy::new(|| env_non_empty("LOG_CHANNEL"));

    /// Channel users must join before downloading (falls back to PUBLIC_CHANNEL)
    pub static FORCE_SUB_CHANNEL: Lazy<Option<String>> =
        Lazy::new(|| env_non_empty("FORCE_SUB_CHANNEL").or_else(|| PUBLIC_CHANNEL.clone()));

    /// Chat the bot forwards linked messages into while resolving course links.
    /// Defaults to the admin's own private chat when unset.
    pub static STORAGE_CHAT: Lazy<Option<String>> = Lazy::new(|| env_non_empty("STORAGE_CHAT"));
}

/// Access gate switches
pub mod access {
    use super::env_flag;
    use once_cell::sync::Lazy;

    /// Require membership in the force-subscribe channel before delivery
    pub static FORCE_SUB: Lazy<bool> = Lazy::new(|| env_flag("FORCE_SUB", false));

    /// Require a verified access token before delivery
    pub static TOKEN_VERIFICATION_ENABLED: Lazy<bool> = Lazy::new(|| env_flag("TOKEN_VERIFICATION_ENABLED", false));

    /// Only premium users (and admins) receive course files
    pub static PREMIUM_ONLY: Lazy<bool> = Lazy::new(|| env_flag("PREMIUM_ONLY", false));

    /// Deliver remembered courses once a user passes the subscription re-check
    pub static AUTO_SEND_AFTER_SUBSCRIBE: Lazy<bool> = Lazy::new(|| env_flag("AUTO_SEND_AFTER_SUBSCRIBE", true));
}

/// File delivery configuration
pub mod delivery {
    use super::{env_flag, env_non_empty, Duration};
    use once_cell::sync::Lazy;
    use std::env;

    /// Default delay between two consecutive file sends (milliseconds)
    pub const DEFAULT_SEND_DELAY_MS: u64 = 500;

    /// Forbid forwarding/saving of delivered files
    pub static PROTECT_CONTENT: Lazy<bool> = Lazy::new(|| env_flag("PROTECT_CONTENT", false));

    /// Delete delivered files after this many seconds (0 disables)
    pub static AUTO_DELETE_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("AUTO_DELETE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    });

    /// Optional tutorial link attached to every delivered file
    pub static TUTORIAL_URL: Lazy<Option<String>> = Lazy::new(|| env_non_empty("TUTORIAL_URL"));

    /// Delay between two consecutive file sends (milliseconds)
    pub static SEND_DELAY_MS: Lazy<u64> = Lazy::new(|| {
        env::var("SEND_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SEND_DELAY_MS)
    });

    pub fn send_delay() -> Duration {
        Duration::from_millis(*SEND_DELAY_MS)
    }

    pub fn auto_delete_after() -> Option<Duration> {
        match *AUTO_DELETE_SECS {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Caption templates
pub mod captions {
    use once_cell::sync::Lazy;
    use std::env;

    /// Template used when a course file has no caption of its own.
    /// Placeholders: `{file_name}`, `{course_name}`.
    pub const DEFAULT_FILE_CAPTION: &str = "📚 {file_name}\n\nCourse: {course_name}";

    pub static CUSTOM_FILE_CAPTION: Lazy<String> =
        Lazy::new(|| env::var("CUSTOM_FILE_CAPTION").unwrap_or_else(|_| DEFAULT_FILE_CAPTION.to_string()));
}

/// URL shortener configuration
pub mod shortener {
    use super::{env_flag, env_non_empty};
    use once_cell::sync::Lazy;

    pub static ENABLED: Lazy<bool> = Lazy::new(|| env_flag("SHORTENER_ENABLED", false));

    /// API URL template with `{link}` and `{api}` placeholders
    pub static API_URL: Lazy<Option<String>> = Lazy::new(|| env_non_empty("SHORTENER_API"));

    pub static API_KEY: Lazy<Option<String>> = Lazy::new(|| env_non_empty("SHORTENER_API_KEY"));

    /// Shortener host used when no API template is configured
    pub static DOMAIN: Lazy<Option<String>> = Lazy::new(|| env_non_empty("SHORTENER_DOMAIN"));
}

/// Broadcast configuration
pub mod broadcast {
    use super::Duration;

    /// Interval between status message edits (in seconds)
    pub const STATUS_INTERVAL_SECS: u64 = 5;

    /// Delay between two broadcast sends (in milliseconds)
    pub const SEND_DELAY_MS: u64 = 100;

    pub fn status_interval() -> Duration {
        Duration::from_secs(STATUS_INTERVAL_SECS)
    }

    pub fn send_delay() -> Duration {
        Duration::from_millis(SEND_DELAY_MS)
    }
}

/// Premium configuration
pub mod premium {
    use super::Duration;

    /// Premium period granted by `/premium <user_id>` without an explicit day count
    pub const DEFAULT_DAYS: i64 = 30;

    /// How often expired premium users are demoted (in seconds)
    pub const EXPIRY_CHECK_INTERVAL_SECS: u64 = 60 * 60;

    pub fn expiry_check_interval() -> Duration {
        Duration::from_secs(EXPIRY_CHECK_INTERVAL_SECS)
    }
}

/// Access token defaults
pub mod tokens {
    pub const DEFAULT_DAYS: i64 = 30;
    pub const DEFAULT_USES: i64 = 1;
}

/// Search configuration
pub mod search {
    /// Results per inline query page
    pub const INLINE_PAGE_SIZE: usize = 20;

    /// Courses per `/courses` page
    pub const LIST_PAGE_SIZE: usize = 10;

    /// Seconds Telegram may cache inline results
    pub const INLINE_CACHE_SECS: u32 = 300;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API and shortener calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Dispatcher restart configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}
