//! User-facing message texts (HTML parse mode).

use indoc::{formatdoc, indoc};
use teloxide::utils::html;

use crate::core::utils::format_size;
use crate::course::{DraftSummary, IngestMode};

pub const HELP_TEXT: &str = indoc! {"
    <b>How to get a course</b>

    • Type <code>@botname course name</code> in any chat to search the catalogue.
    • Tap <b>Download Course</b> on a result, then press <b>Start</b>.
    • The bot sends every file of the course here, in order.
    • To pick single files instead, send <code>/course &lt;course_id&gt;</code>.

    Some courses need an access token: get one from an admin and send
    <code>/verify &lt;token&gt;</code>.
"};

pub fn start_text(first_name: &str, bot_username: &str) -> String {
    formatdoc! {"
        👋 Hello {name}!

        I keep a catalogue of courses and send them to you on request.
        Search right from the message box: <code>@{bot} python</code>

        Send /help to see how it works.",
        name = html::escape(first_name),
        bot = bot_username,
    }
}

pub fn about_text(bot_username: &str, course_count: i64) -> String {
    formatdoc! {"
        📚 <b>@{bot}</b>

        Courses in the catalogue: <b>{count}</b>
        Built with Rust and teloxide.",
        bot = bot_username,
        count = course_count,
    }
}

pub const ADMIN_ONLY: &str = "⛔ This command is for admins only.";

pub fn name_prompt(mode: IngestMode) -> String {
    let how = match mode {
        IngestMode::Forward => "forwarding files",
        IngestMode::Links => "message links",
    };
    format!(
        "📝 New course ({}).\n\nSend the <b>course name</b>.\nSend /cancel at any time to abort.",
        how
    )
}

pub const NAME_REJECTED: &str = "⚠️ Please provide a valid course name.";

pub fn files_prompt(name: &str, mode: IngestMode) -> String {
    match mode {
        IngestMode::Forward => formatdoc! {"
            Great! Now forward all files for <b>{name}</b> from the storage channel.

            When you've sent every file, send /done.",
            name = html::escape(name),
        },
        IngestMode::Links => formatdoc! {"
            Great! Now send the message links for <b>{name}</b>, one or many per message:
            <code>https://t.me/c/1234567890/42</code>

            When you've sent every link, send /done.",
            name = html::escape(name),
        },
    }
}

pub fn file_added(count: usize) -> String {
    format!("✅ File {} added. Forward more or send /done.", count)
}

pub fn links_queued(added: usize, queued: usize) -> String {
    format!(
        "🔗 {} link(s) added, {} queued. Send more or /done to fetch them.",
        added, queued
    )
}

pub const NO_LINKS_FOUND: &str = "⚠️ No message links found. Links look like <code>https://t.me/c/1234567890/42</code>.";
pub const MEDIA_EXPECTED: &str = "📎 Please forward a file (document, video, audio, photo) or send /done.";
pub const LINKS_EXPECTED: &str = "🔗 This course is built from links. Send message links or /done.";

pub fn nothing_collected(mode: IngestMode) -> &'static str {
    match mode {
        IngestMode::Forward => "⚠️ You haven't added any files yet. Forward files from the storage channel first.",
        IngestMode::Links => "⚠️ You haven't added any links yet. Send message links first.",
    }
}

pub fn resolution_failed(attempted: usize) -> String {
    format!(
        "❌ None of the {} link(s) could be fetched. Check that the bot can see those messages, then send /done to try again.",
        attempted
    )
}

pub const RESOLVING_LINKS: &str = "⏳ Fetching linked messages...";

pub fn files_collected(files: usize, failed: usize) -> String {
    let mut text = format!("✅ {} file(s) collected.", files);
    if failed > 0 {
        text.push_str(&format!("\n⚠️ {} link(s) could not be fetched and were skipped.", failed));
    }
    text.push_str("\n\n🖼 Now send a banner image for the announcement, or /skip.");
    text
}

pub const BANNER_EXPECTED: &str = "🖼 Please send a photo for the banner, or /skip to go without one.";
pub const BANNER_REQUESTED: &str = "🖼 Send a photo to use as the course banner.";
pub const NAME_REQUESTED: &str = "📝 Send the new course name.";

pub fn confirmation(summary: &DraftSummary, repeated: bool) -> String {
    let header = if repeated {
        "Please choose one of the options:"
    } else {
        "📋 <b>Course summary</b>"
    };
    formatdoc! {"
        {header}

        Name: <b>{name}</b>
        Files: {files}
        Size: {size}
        Banner: {banner}

        1. Add or change the banner
        2. Modify the name
        3. Confirm and publish
        4. Cancel",
        header = header,
        name = html::escape(&summary.course_name),
        files = summary.file_count,
        size = format_size(summary.total_size),
        banner = if summary.has_banner { "yes" } else { "no" },
    }
}

pub fn published(course_name: &str, course_id: &str, deep_link: &str) -> String {
    formatdoc! {"
        🎉 <b>{name}</b> is published!

        ID: <code>{id}</code>
        Link: {link}",
        name = html::escape(course_name),
        id = course_id,
        link = deep_link,
    }
}

pub fn publish_failed(reason: &str) -> String {
    format!(
        "❌ Failed to save the course: {}\nYour draft is kept, choose <b>Confirm</b> to try again.",
        html::escape(reason)
    )
}

pub const CANCELLED: &str = "🗑 Course creation cancelled.";
pub const NOT_IN_CONVERSATION: &str = "There is no course creation in progress.";
pub const NOT_COLLECTING_FILES: &str = "You're not currently adding course files.";

pub fn announcement(course_name: &str, file_count: usize, total_size: i64) -> String {
    formatdoc! {"
        📚 <b>New course:</b> {name}

        📁 Files: {files}
        💾 Size: {size}",
        name = html::escape(course_name),
        files = file_count,
        size = format_size(total_size),
    }
}

pub fn announcement_failed(course_name: &str, error: &str) -> String {
    format!(
        "⚠️ Course <b>{}</b> was published but the announcement failed:\n<code>{}</code>",
        html::escape(course_name),
        html::escape(error)
    )
}

pub const COURSE_NOT_FOUND: &str = "❌ Course not found. It may have been removed.";
pub const COURSE_EMPTY: &str = "⚠️ This course has no files yet.";
pub const FILE_NOT_FOUND: &str = "❌ That file is no longer part of the course.";
pub const TRY_AGAIN_LATER: &str = "⏳ Telegram is asking us to slow down. Please try again in a minute.";

/// Card above the per-file menu of `/course`.
pub fn course_menu(course_name: &str, file_count: usize, total_size: i64) -> String {
    formatdoc! {"
        📚 <b>{name}</b>

        Total files: {files}
        Total size: {size}

        Select a file to download:",
        name = html::escape(course_name),
        files = file_count,
        size = format_size(total_size),
    }
}

pub fn delivery_start(course_name: &str, file_count: usize, total_size: i64) -> String {
    formatdoc! {"
        📚 Sending <b>{name}</b>
        {files} file(s), {size}. Please wait...",
        name = html::escape(course_name),
        files = file_count,
        size = format_size(total_size),
    }
}

pub fn delivery_done(sent: usize, total: usize) -> String {
    if sent == total {
        format!("✅ All {} file(s) sent. Enjoy the course!", total)
    } else {
        format!(
            "⚠️ Sent {} of {} file(s). Some files could not be delivered.",
            sent, total
        )
    }
}

pub fn auto_delete_notice(after: &str) -> String {
    format!(
        "⏳ These files will be deleted in {}. Save them somewhere if you need them later.",
        after
    )
}

pub const JOIN_CHANNEL: &str = "🔒 Please join our channel to download courses, then tap <b>Try Again</b>.";
pub const STILL_NOT_JOINED: &str = "You haven't joined the channel yet.";
pub const JOINED_THANKS: &str = "✅ Thanks for joining! Open the course link again to download it.";
pub const NEEDS_VERIFICATION: &str = "🔑 You need to verify an access token first: /verify <code>&lt;token&gt;</code>";
pub const NEEDS_PREMIUM: &str = "💎 Downloads are for premium users only. Contact an admin to get premium.";

pub const TOKENS_DISABLED: &str = "Token verification is disabled.";

pub fn token_created(token: &str, uses: i64, days: i64, bot_username: &str) -> String {
    formatdoc! {"
        🔑 Token created

        <code>{token}</code>
        Uses: {uses}, valid for {days} day(s)

        Share: <code>/verify {token}</code> with @{bot}",
        token = token,
        uses = uses,
        days = days,
        bot = bot_username,
    }
}

pub const BROADCAST_USAGE: &str = "Usage: <code>/broadcast your message</code>";

pub fn broadcast_confirm(text: &str, users: i64) -> String {
    format!(
        "📣 Send this message to {} user(s)?\n\n{}",
        users,
        html::escape(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_lists_options() {
        let summary = DraftSummary {
            course_name: "Rust <fast>".to_string(),
            file_count: 3,
            total_size: 2048,
            has_banner: false,
        };
        let text = confirmation(&summary, false);
        assert!(text.contains("Rust &lt;fast&gt;"));
        assert!(text.contains("3. Confirm and publish"));
        assert!(text.contains("2.00 KB"));
        assert!(confirmation(&summary, true).starts_with("Please choose"));
    }

    #[test]
    fn test_files_collected_mentions_failures() {
        assert!(!files_collected(3, 0).contains("skipped"));
        assert!(files_collected(2, 1).contains("1 link(s) could not be fetched"));
    }

    #[test]
    fn test_course_menu_card() {
        let text = course_menu("A & B", 2, 1024);
        assert!(text.starts_with("📚 <b>A &amp; B</b>"));
        assert!(text.contains("Total files: 2"));
        assert!(text.contains("Total size: 1.00 KB"));
    }

    #[test]
    fn test_delivery_done() {
        assert_eq!(delivery_done(3, 3), "✅ All 3 file(s) sent. Enjoy the course!");
        assert!(delivery_done(2, 3).contains("Sent 2 of 3"));
    }
}
