//! Message formatting for the channel.
//!
//! Template (MarkdownV2, web preview disabled by the sender):
//!
//! ```text
//! {summary}
//!
//! _{YYYY/MM/DD HH:MM local}_
//!
//! {url}
//! #{category}
//! ```
//!
//! A two-level category `parent/child` renders as `#parent #child`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Characters with special meaning in the platform's MarkdownV2 dialect.
const SPECIAL: &str = r"_*[]()~`>#+-=|{}.!";

pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn hashtags(category: &str) -> String {
    match category.split_once('/') {
        Some((parent, child)) => format!(
            "\\#{} \\#{}",
            escape_markdown_v2(parent),
            escape_markdown_v2(child)
        ),
        None => format!("\\#{}", escape_markdown_v2(category)),
    }
}

pub fn format_message(
    published_at: &DateTime<Utc>,
    tz: Tz,
    url: &str,
    category: &str,
    summary: &str,
) -> String {
    let local = published_at.with_timezone(&tz);
    let timestamp = escape_markdown_v2(&local.format("%Y/%m/%d %H:%M").to_string());
    format!(
        "{}\n\n_{}_\n\n{}\n{}",
        escape_markdown_v2(summary),
        timestamp,
        escape_markdown_v2(url),
        hashtags(category)
    )
}
