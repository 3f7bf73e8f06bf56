use lazy_regex::regex;
use std::time::Duration;

/// Formats a byte count the way Telegram clients display it.
///
/// # Example
///
/// ```
/// use coursebot::core::utils::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
/// ```
pub fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes <= 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Strips punctuation and surrounding whitespace.
///
/// Used to decide whether a course name carries any actual content.
///
/// # Example
///
/// ```
/// use coursebot::core::utils::clean_text;
///
/// assert_eq!(clean_text("  ...!!  "), "");
/// assert_eq!(clean_text(" Rust: 101! "), "Rust 101");
/// ```
pub fn clean_text(text: &str) -> String {
    regex!(r"[^\w\s]").replace_all(text, "").trim().to_string()
}

/// Renders a duration as `1h 2m 3s`, omitting leading zero units.
pub fn readable_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Substitutes `{file_name}` and `{course_name}` in a caption template.
pub fn render_caption(template: &str, file_name: &str, course_name: &str) -> String {
    template
        .replace("{file_name}", file_name)
        .replace("{course_name}", course_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(-5), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_clean_text_keeps_words() {
        assert_eq!(clean_text("Sicilian Defense"), "Sicilian Defense");
        assert_eq!(clean_text("?!"), "");
        assert_eq!(clean_text("\n\t"), "");
    }

    #[test]
    fn test_readable_duration() {
        assert_eq!(readable_duration(Duration::from_secs(7)), "7s");
        assert_eq!(readable_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(readable_duration(Duration::from_secs(3723)), "1h 2m 3s");
    }

    #[test]
    fn test_render_caption() {
        assert_eq!(
            render_caption("{file_name} | {course_name}", "01.mp4", "Rust"),
            "01.mp4 | Rust"
        );
    }
}
