//! Inline keyboards and their callback data.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::core::utils::format_size;
use crate::course::ConfirmSelection;
use crate::storage::courses::CourseFile;

pub const DOWNLOAD_PREFIX: &str = "course_download_";
pub const FILE_PREFIX: &str = "file_";
pub const SEND_ALL_PREFIX: &str = "sendall_";
pub const CHECK_SUB_PREFIX: &str = "checksub_";
pub const BROADCAST_CONFIRM: &str = "broadcast_confirm";
pub const BROADCAST_CANCEL: &str = "broadcast_cancel";

/// Confirmation menu shown before a course is published.
pub fn confirmation_keyboard(has_banner: bool) -> InlineKeyboardMarkup {
    let banner_label = if has_banner { "🖼 Change banner" } else { "🖼 Add banner" };
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(banner_label, ConfirmSelection::Banner.callback_data()),
            InlineKeyboardButton::callback("✏️ Edit name", ConfirmSelection::EditName.callback_data()),
        ],
        vec![
            InlineKeyboardButton::callback("✅ Confirm & publish", ConfirmSelection::Confirm.callback_data()),
            InlineKeyboardButton::callback("❌ Cancel", ConfirmSelection::Cancel.callback_data()),
        ],
    ])
}

/// Button under a channel announcement.
pub fn download_link_keyboard(deep_link: &str) -> Option<InlineKeyboardMarkup> {
    let url = Url::parse(deep_link).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "⬇️ Download Now",
        url,
    )]]))
}

/// Button under an inline search result.
pub fn inline_result_keyboard(link: &str) -> Option<InlineKeyboardMarkup> {
    let url = Url::parse(link).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "⬇️ Download Course",
        url,
    )]]))
}

/// Join button plus a re-check for the force-subscribe gate.
pub fn join_channel_keyboard(invite: Option<Url>, course_id: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(invite) = invite {
        rows.push(vec![InlineKeyboardButton::url("📢 Join Channel", invite)]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "🔄 Try Again",
        format!("{}{}", CHECK_SUB_PREFIX, course_id),
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Shown after a course has been delivered.
pub fn completion_keyboard(updates_channel: Option<Url>) -> InlineKeyboardMarkup {
    let mut row = vec![InlineKeyboardButton::switch_inline_query_current_chat(
        "🔍 Browse more",
        "",
    )];
    if let Some(url) = updates_channel {
        row.push(InlineKeyboardButton::url("📢 Updates", url));
    }
    InlineKeyboardMarkup::new(vec![row])
}

pub fn tutorial_keyboard(tutorial: &str) -> Option<InlineKeyboardMarkup> {
    let url = Url::parse(tutorial).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        "📖 How to use",
        url,
    )]]))
}

pub fn broadcast_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Send", BROADCAST_CONFIRM),
        InlineKeyboardButton::callback("❌ Cancel", BROADCAST_CANCEL),
    ]])
}

fn shorten_label(text: &str, max_chars: usize) -> String {
    let mut label: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        label.push('…');
    }
    label
}

/// Button that delivers a course from a `/courses` listing.
pub fn course_download_button(course_name: &str, course_id: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(shorten_label(course_name, 40), format!("{}{}", DOWNLOAD_PREFIX, course_id))
}

/// Callback data for one file of a course: `file_<course_id>_<file_order>`.
///
/// Files are addressed by position because Telegram file ids do not fit the
/// 64-byte callback limit.
pub fn file_callback_data(course_id: &str, file_order: i64) -> String {
    format!("{}{}_{}", FILE_PREFIX, course_id, file_order)
}

/// One button per file plus a "download all" row.
pub fn course_files_keyboard(course_id: &str, files: &[CourseFile]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = files
        .iter()
        .map(|file| {
            let label = format!("{} ({})", shorten_label(&file.file_name, 40), format_size(file.file_size));
            vec![InlineKeyboardButton::callback(
                label,
                file_callback_data(course_id, file.file_order),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "📦 Download All Files",
        format!("{}{}", SEND_ALL_PREFIX, course_id),
    )]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(button: &InlineKeyboardButton) -> Option<&str> {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_confirmation_keyboard_decodes() {
        let keyboard = confirmation_keyboard(false);
        let all: Vec<_> = keyboard.inline_keyboard.iter().flatten().collect();
        assert_eq!(all.len(), 4);
        for button in all {
            let data = callback_data(button).unwrap();
            assert_ne!(
                ConfirmSelection::from_callback(data),
                Some(ConfirmSelection::Unrecognized)
            );
        }
    }

    #[test]
    fn test_join_keyboard_without_invite() {
        let keyboard = join_channel_keyboard(None, "abc");
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(callback_data(&keyboard.inline_keyboard[0][0]), Some("checksub_abc"));
    }

    #[test]
    fn test_invalid_links_give_no_keyboard() {
        assert!(download_link_keyboard("not a url").is_none());
        assert!(download_link_keyboard("https://t.me/bot?start=course_1").is_some());
    }

    #[test]
    fn test_course_files_keyboard() {
        use crate::course::MediaKind;

        let course_id = "0b9c6a3e-5a8f-4c57-a1d2-7d35f1b0c9e4";
        let files: Vec<CourseFile> = (1..=2)
            .map(|order| CourseFile {
                course_id: course_id.to_string(),
                file_id: "x".repeat(80),
                file_name: format!("lesson{}.mp4", order),
                file_size: 2048,
                caption: None,
                file_order: order,
                media_kind: MediaKind::Video,
            })
            .collect();

        let keyboard = course_files_keyboard(course_id, &files);
        assert_eq!(keyboard.inline_keyboard.len(), 3);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "lesson1.mp4 (2.00 KB)");

        let data = callback_data(&keyboard.inline_keyboard[1][0]).unwrap();
        assert_eq!(data, format!("file_{}_2", course_id));
        assert!(data.len() <= 64);
        assert_eq!(
            callback_data(&keyboard.inline_keyboard[2][0]),
            Some(format!("sendall_{}", course_id).as_str())
        );
    }

    #[test]
    fn test_course_button_truncates() {
        let button = course_download_button(&"x".repeat(60), "id1");
        assert_eq!(button.text.chars().count(), 41);
        assert_eq!(callback_data(&button), Some("course_download_id1"));
    }
}
