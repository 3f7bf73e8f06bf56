//! Admin inputs understood by the ingestion machine.

use crate::course::draft::{FileDescriptor, IngestMode};

/// Callback data prefix of the confirmation menu buttons.
pub const COURSE_ACTION_PREFIX: &str = "course_action_";

/// One inbound admin event, already classified by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminInput {
    Start { mode: IngestMode },
    Text(String),
    Media(FileDescriptor),
    Done,
    Skip,
    Cancel,
    Selection(ConfirmSelection),
}

/// Choices on the confirmation menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConfirmSelection {
    Banner,
    EditName,
    Confirm,
    Cancel,
    Unrecognized,
}

impl ConfirmSelection {
    /// Decodes a typed reply such as `3`, `yes` or `edit name`.
    pub fn from_reply(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "yes" | "y" | "confirm" | "3" | "confirm and publish" | "publish" => Self::Confirm,
            "no" | "n" | "cancel" | "4" => Self::Cancel,
            "1" | "add banner" | "banner" | "change banner" => Self::Banner,
            "2" | "modify name" | "edit name" | "rename" => Self::EditName,
            _ => Self::Unrecognized,
        }
    }

    /// Decodes `course_action_<choice>` callback data.
    pub fn from_callback(data: &str) -> Option<Self> {
        let action = data.strip_prefix(COURSE_ACTION_PREFIX)?;
        Some(match action {
            "banner" => Self::Banner,
            "edit_name" => Self::EditName,
            "confirm" => Self::Confirm,
            "cancel" => Self::Cancel,
            _ => Self::Unrecognized,
        })
    }

    /// Callback data for a menu button.
    pub fn callback_data(self) -> String {
        format!("{}{}", COURSE_ACTION_PREFIX, self.as_ref())
    }
}
