//! Readable HTML table rendering.
//!
//! One page per conversation: a header block naming the conversation and its
//! message count, then a table with Timestamp, Sender, Message, and
//! Attachments columns. The attachments cell is derived by scanning the
//! record's rendered XML fragment for image and contact-card part markers,
//! so both output formats agree on what counts as an attachment.
//!
//! [`index_document`] renders the run-wide `index.html` with per-conversation
//! links and global totals.

use std::time::Duration;

use chrono::{TimeZone, Utc};

use super::{ConversionStats, IndexEntry};

/// Marker scanned for in rendered fragments to detect image parts.
const IMAGE_MARKER: &str = "ct=\"image/";
/// Marker scanned for in rendered fragments to detect contact cards.
const VCARD_MARKER: &str = "ct=\"text/x-vCard\"";

/// Escapes text for use inside HTML element content.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Formats a Unix-millisecond timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
#[must_use]
pub fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

/// Renders one table row.
///
/// The caller supplies the resolved sender label (`Me` for self-originated
/// records) and the pre-computed attachments cell.
#[must_use]
pub fn row(timestamp_ms: i64, sender: &str, message: &str, attachments: &str) -> String {
    format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        format_timestamp(timestamp_ms),
        escape_html(sender),
        escape_html(message),
        escape_html(attachments),
    )
}

/// Derives the attachments cell from a rendered XML fragment.
///
/// Counts image and contact-card part markers; returns an empty string when
/// the fragment carries neither.
#[must_use]
pub fn attachments_cell(fragment: &str) -> String {
    let images = fragment.matches(IMAGE_MARKER).count();
    let vcards = fragment.matches(VCARD_MARKER).count();

    let mut parts = Vec::new();
    if images == 1 {
        parts.push("1 image".to_string());
    } else if images > 1 {
        parts.push(format!("{images} images"));
    }
    if vcards == 1 {
        parts.push("1 contact card".to_string());
    } else if vcards > 1 {
        parts.push(format!("{vcards} contact cards"));
    }
    parts.join(", ")
}

/// Counts image and contact-card markers in a rendered fragment.
#[must_use]
pub fn count_attachment_markers(fragment: &str) -> (usize, usize) {
    (
        fragment.matches(IMAGE_MARKER).count(),
        fragment.matches(VCARD_MARKER).count(),
    )
}

/// Renders a full conversation page from pre-rendered rows.
#[must_use]
pub fn document(key: &str, rows: &[String]) -> String {
    let mut out = String::with_capacity(512 + rows.iter().map(String::len).sum::<usize>());
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape_html(key)));
    out.push_str(STYLE);
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!("<h1>{}</h1>\n", escape_html(key)));
    out.push_str(&format!("<p>{} messages</p>\n", rows.len()));
    out.push_str("<table>\n");
    out.push_str("<tr><th>Timestamp</th><th>Sender</th><th>Message</th><th>Attachments</th></tr>\n");
    for r in rows {
        out.push_str(r);
        out.push('\n');
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

/// Renders the run-wide index page.
///
/// Entries render in the given order; callers sort beforehand.
#[must_use]
pub fn index_document(entries: &[IndexEntry], stats: &ConversionStats, elapsed: Duration) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Conversation index</title>\n");
    out.push_str(STYLE);
    out.push_str("</head>\n<body>\n<h1>Conversation index</h1>\n");

    out.push_str(&format!(
        "<p>{} conversations, {} records ({} sms, {} mms, {} calls, {} voicemails), \
         {} images, {} contact cards. Converted in {:.1}s.</p>\n",
        entries.len(),
        stats.total_records(),
        stats.sms,
        stats.mms,
        stats.calls,
        stats.voicemails,
        stats.images,
        stats.vcards,
        elapsed.as_secs_f64(),
    ));

    out.push_str("<table>\n<tr><th>Conversation</th><th>Messages</th><th>Notes</th></tr>\n");
    for entry in entries {
        let notes = if entry.commercial { "commercial" } else { "" };
        out.push_str(&format!(
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&entry.file_name),
            escape_html(&entry.key),
            entry.message_count,
            notes,
        ));
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

const STYLE: &str = "<style>\n\
    body { font-family: sans-serif; margin: 2em; }\n\
    table { border-collapse: collapse; width: 100%; }\n\
    th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }\n\
    th { background: #f0f0f0; }\n\
    </style>\n";
