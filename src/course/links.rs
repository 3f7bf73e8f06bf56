//! Message link recognition for link-mode ingestion.

use lazy_regex::regex;

use crate::course::draft::{ChannelRef, LinkRef};

/// Prefix Telegram puts in front of a channel's internal id to form its chat id.
pub const PRIVATE_CHANNEL_MARKER: &str = "-100";

/// Turns a numeric channel part into a full chat id.
///
/// `1234567` becomes `-1001234567`; ids already carrying the marker are kept.
pub fn normalize_private_id(raw: &str) -> Option<i64> {
    let full = if raw.starts_with(PRIVATE_CHANNEL_MARKER) {
        raw.to_string()
    } else {
        format!("{}{}", PRIVATE_CHANNEL_MARKER, raw.trim_start_matches('-'))
    };
    full.parse().ok()
}

/// Extracts every message link from free text, in the order they appear.
///
/// A link looks like `scheme://host/[c/]channel/message_id`. Public channel
/// names need at least four characters, so a private link missing its message
/// id is never read as channel `c`. The message id must end at a word
/// boundary. Anything that does not fit (including ids that overflow) is
/// skipped silently.
pub fn parse_links(text: &str) -> Vec<LinkRef> {
    regex!(r"(?i)[a-z][a-z0-9+.\-]*://[^\s/]+/(?:c/)?(-?\d+|[a-z][a-z0-9_]{3,})/(\d+)\b")
        .captures_iter(text)
        .filter_map(|caps| {
            let channel_part = caps.get(1)?.as_str();
            let message_id = caps.get(2)?.as_str().parse::<i32>().ok()?;

            let channel = if channel_part.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()) {
                ChannelRef::Private(normalize_private_id(channel_part)?)
            } else {
                ChannelRef::Public(channel_part.to_string())
            };

            Some(LinkRef { channel, message_id })
        })
        .collect()
}
