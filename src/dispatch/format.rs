//! Message rendering.

use crate::types::VersionEntry;
use std::borrow::Cow;

/// Longest message the Bot API accepts, in characters.
pub const TELEGRAM_MAX_LEN: usize = 4096;

/// Appended to truncated messages.
pub const ELLIPSIS: char = '\u{2026}';

/// Characters that Telegram's legacy Markdown treats as syntax.
const MARKDOWN_RESERVED: [char; 5] = ['_', '*', '`', '[', ']'];

/// Backslash-escape Markdown syntax characters.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Cut `text` to at most `max_len` characters.
///
/// A truncated message is exactly `max_len` characters long and ends with
/// [`ELLIPSIS`].
pub fn truncate_message(text: &str, max_len: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_len {
        return Cow::Borrowed(text);
    }
    if max_len == 0 {
        return Cow::Owned(String::new());
    }

    let mut out: String = text.chars().take(max_len - 1).collect();
    out.push(ELLIPSIS);
    Cow::Owned(out)
}

/// Renders version entries as chat messages.
#[derive(Clone, Debug)]
pub struct MessageFormatter {
    product_name: String,
}

impl MessageFormatter {
    pub fn new(product_name: impl Into<String>) -> Self {
        // '*' would close the bold title early.
        let product_name = product_name.into().replace('*', "");
        Self {
            product_name: product_name.trim().to_string(),
        }
    }

    /// Bold title line, a blank line, then the escaped release notes.
    pub fn format(&self, entry: &VersionEntry) -> String {
        let title = if self.product_name.is_empty() {
            format!("*v{}*", entry.version)
        } else {
            format!("*{} v{}*", self.product_name, entry.version)
        };

        let body = entry.body.trim();
        if body.is_empty() {
            return title;
        }
        format!("{}\n\n{}", title, escape_markdown(body))
    }
}
