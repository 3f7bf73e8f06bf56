//! Access gates checked before a course is delivered.

use chrono::Utc;
use teloxide::prelude::*;

use crate::core::config;
use crate::core::error::AppResult;
use crate::storage::db::{self, DbPool};
use crate::telegram::bot::channel_recipient;
use crate::telegram::Bot;

/// Which gates are switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateSettings {
    pub force_sub: bool,
    pub token_verification: bool,
    pub premium_only: bool,
}

impl GateSettings {
    pub fn from_config() -> Self {
        Self {
            force_sub: *config::access::FORCE_SUB && config::channels::FORCE_SUB_CHANNEL.is_some(),
            token_verification: *config::access::TOKEN_VERIFICATION_ENABLED,
            premium_only: *config::access::PREMIUM_ONLY,
        }
    }
}

/// What is known about the requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserFacts {
    pub is_admin: bool,
    pub is_banned: bool,
    /// `false` only when the channel check positively found a non-member
    pub is_member: bool,
    pub is_verified: bool,
    pub has_premium: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Banned users get no reply at all
    Ignore,
    JoinChannel,
    NeedsVerification,
    NeedsPremium,
}

/// Applies the gates in order: ban, subscription, token, premium.
/// Admins pass every gate.
pub fn decide(settings: GateSettings, facts: UserFacts) -> GateDecision {
    if facts.is_banned {
        return GateDecision::Ignore;
    }
    if facts.is_admin {
        return GateDecision::Allow;
    }
    if settings.force_sub && !facts.is_member {
        return GateDecision::JoinChannel;
    }
    if settings.token_verification && !facts.is_verified {
        return GateDecision::NeedsVerification;
    }
    if settings.premium_only && !facts.has_premium {
        return GateDecision::NeedsPremium;
    }
    GateDecision::Allow
}

/// Asks Telegram whether the user is a member of the force-subscribe channel.
///
/// Lookup failures count as membership so a misconfigured channel never locks
/// everybody out.
pub async fn is_channel_member(bot: &Bot, user_id: i64) -> bool {
    let Some(channel) = config::channels::FORCE_SUB_CHANNEL.as_deref() else {
        return true;
    };
    let Ok(uid) = u64::try_from(user_id) else {
        return false;
    };
    match bot.get_chat_member(channel_recipient(channel), UserId(uid)).await {
        Ok(member) => member.is_present(),
        Err(e) => {
            log::warn!("Membership check for {} in {} failed: {}", user_id, channel, e);
            true
        }
    }
}

/// Gathers the facts the enabled gates need.
pub async fn collect_facts(bot: &Bot, pool: &DbPool, settings: GateSettings, user_id: i64) -> AppResult<UserFacts> {
    let user = {
        let conn = db::get_connection(pool)?;
        db::get_user(&conn, user_id)?
    };

    let is_admin = config::admin::is_admin(user_id);
    let is_member = if settings.force_sub && !is_admin {
        is_channel_member(bot, user_id).await
    } else {
        true
    };

    Ok(UserFacts {
        is_admin,
        is_banned: user.as_ref().map(|u| u.is_banned).unwrap_or(false),
        is_member,
        is_verified: user.as_ref().map(|u| u.is_verified).unwrap_or(false),
        has_premium: user.as_ref().map(|u| u.has_active_premium(Utc::now())).unwrap_or(false),
    })
}
