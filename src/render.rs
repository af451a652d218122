//! Render — turns message text into display forms.

use crate::conversation::{Message, Sender};

const LOADING_BASE: &str = "Loading";
const LOADING_MAX_DOTS: usize = 3;

/// Escape `text` for HTML and turn line breaks into `<br>`.
///
/// `\r\n` and `\n` each become one `<br>`. A lone `\r` passes through.
#[must_use]
pub fn html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => out.push_str("<br>"),
            other => out.push(other),
        }
    }
    out
}

/// One message as terminal lines, each prefixed with the sender tag.
#[must_use]
pub fn terminal(message: &Message) -> String {
    let prefix = match message.sender {
        Sender::User => "you> ",
        Sender::Bot => "bot> ",
    };
    let pad = " ".repeat(prefix.len());
    let mut out = String::with_capacity(message.text.len() + prefix.len());
    for (i, line) in message.text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(&pad);
        } else {
            out.push_str(prefix);
        }
        out.push_str(line);
    }
    if out.is_empty() {
        out.push_str(prefix.trim_end());
    }
    out
}

/// Loading indicator frame: `Loading`, `Loading.`, `Loading..`, `Loading...`, repeat.
#[must_use]
pub fn loading_text(tick: usize) -> String {
    let dots = tick % (LOADING_MAX_DOTS + 1);
    format!("{LOADING_BASE}{}", ".".repeat(dots))
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
