//! Extracting re-sendable media from Telegram messages.

use teloxide::types::Message;

use crate::course::{FileDescriptor, MediaKind};

/// Name used when Telegram does not carry one (photos, voice notes, some videos).
pub fn fallback_name(kind: MediaKind, message_id: i32) -> String {
    let extension = match kind {
        MediaKind::Document => "bin",
        MediaKind::Video => "mp4",
        MediaKind::Audio => "mp3",
        MediaKind::Photo => "jpg",
        MediaKind::Animation => "gif",
        MediaKind::Voice => "ogg",
    };
    format!("{}_{}.{}", kind, message_id, extension)
}

fn descriptor(
    msg: &Message,
    kind: MediaKind,
    file_id: &str,
    file_name: Option<&str>,
    file_size: u32,
) -> FileDescriptor {
    let file_name = file_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_name(kind, msg.id.0));

    FileDescriptor {
        file_id: file_id.to_string(),
        file_name,
        file_size: file_size as i64,
        caption: msg.caption().map(str::to_string).filter(|c| !c.trim().is_empty()),
        source_order: msg.id.0 as i64,
        media_kind: kind,
    }
}

/// The media item carried by a message, if any.
///
/// Photos resolve to their largest size.
pub fn extract_file(msg: &Message) -> Option<FileDescriptor> {
    if let Some(doc) = msg.document() {
        return Some(descriptor(
            msg,
            MediaKind::Document,
            &doc.file.id.0,
            doc.file_name.as_deref(),
            doc.file.size,
        ));
    }
    if let Some(video) = msg.video() {
        return Some(descriptor(
            msg,
            MediaKind::Video,
            &video.file.id.0,
            video.file_name.as_deref(),
            video.file.size,
        ));
    }
    if let Some(audio) = msg.audio() {
        let name = audio.file_name.as_deref().or(audio.title.as_deref());
        return Some(descriptor(msg, MediaKind::Audio, &audio.file.id.0, name, audio.file.size));
    }
    if let Some(animation) = msg.animation() {
        return Some(descriptor(
            msg,
            MediaKind::Animation,
            &animation.file.id.0,
            animation.file_name.as_deref(),
            animation.file.size,
        ));
    }
    if let Some(voice) = msg.voice() {
        return Some(descriptor(msg, MediaKind::Voice, &voice.file.id.0, None, voice.file.size));
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.iter().max_by_key(|p| p.width * p.height)) {
        return Some(descriptor(msg, MediaKind::Photo, &photo.file.id.0, None, photo.file.size));
    }
    None
}
