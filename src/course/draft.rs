//! In-progress course data owned by one admin's conversation.

use std::fmt;

/// How a course file has to be re-sent through the Bot API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Document,
    Video,
    Audio,
    Photo,
    Animation,
    Voice,
}

/// A media item the bot can re-send by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub caption: Option<String>,
    /// Message id the file was taken from
    pub source_order: i64,
    pub media_kind: MediaKind,
}

/// Channel part of a message link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    /// Full chat id, already carrying the `-100` marker
    Private(i64),
    /// Public username without the leading `@`
    Public(String),
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Private(id) => write!(f, "{}", id),
            ChannelRef::Public(name) => write!(f, "@{}", name),
        }
    }
}

/// A not-yet-resolved reference to a channel message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkRef {
    pub channel: ChannelRef,
    pub message_id: i32,
}

impl fmt::Display for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.message_id)
    }
}

/// How files reach the draft. Fixed when the draft is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum IngestMode {
    /// Admin forwards media messages to the bot
    Forward,
    /// Admin pastes message links that are resolved on `/done`
    Links,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDraft {
    pub course_name: Option<String>,
    pub files: Vec<FileDescriptor>,
    pub links: Vec<LinkRef>,
    pub banner: Option<String>,
    pub mode: IngestMode,
}

impl CourseDraft {
    pub fn new(mode: IngestMode) -> Self {
        Self {
            course_name: None,
            files: Vec::new(),
            links: Vec::new(),
            banner: None,
            mode,
        }
    }

    pub fn total_size(&self) -> i64 {
        self.files.iter().map(|f| f.file_size.max(0)).sum()
    }

    pub fn summary(&self) -> DraftSummary {
        DraftSummary {
            course_name: self.course_name.clone().unwrap_or_default(),
            file_count: self.files.len(),
            total_size: self.total_size(),
            has_banner: self.banner.is_some(),
        }
    }
}

/// What the admin sees on the confirmation menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSummary {
    pub course_name: String,
    pub file_count: usize,
    pub total_size: i64,
    pub has_banner: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConversationState {
    AwaitingName,
    AwaitingFiles,
    AwaitingBanner,
    AwaitingConfirmation,
}

/// State and draft travel together, so one never exists without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub state: ConversationState,
    pub draft: CourseDraft,
}

impl Conversation {
    pub fn start(mode: IngestMode) -> Self {
        Self {
            state: ConversationState::AwaitingName,
            draft: CourseDraft::new(mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn file(size: i64) -> FileDescriptor {
        FileDescriptor {
            file_id: "id".to_string(),
            file_name: "a.pdf".to_string(),
            file_size: size,
            caption: None,
            source_order: 1,
            media_kind: MediaKind::Document,
        }
    }

    #[test]
    fn test_media_kind_names_survive_storage() {
        for kind in MediaKind::iter() {
            assert_eq!(MediaKind::from_str(kind.as_ref()).unwrap(), kind);
        }
        assert_eq!(MediaKind::Animation.to_string(), "animation");
    }

    #[test]
    fn test_total_size_ignores_negative() {
        let mut draft = CourseDraft::new(IngestMode::Forward);
        draft.files = vec![file(100), file(-1), file(50)];
        assert_eq!(draft.total_size(), 150);
        assert_eq!(draft.summary().file_count, 3);
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(ChannelRef::Private(-1001234).to_string(), "-1001234");
        let link = LinkRef {
            channel: ChannelRef::Public("chess".to_string()),
            message_id: 9,
        };
        assert_eq!(link.to_string(), "@chess/9");
    }
}
