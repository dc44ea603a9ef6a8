//! HTML rendering for transcript entries.

use std::fmt::Write;

use crate::widget::format::{self, Fragment};
use crate::widget::message::Message;

/// Escape HTML special characters.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a fragment list to markup.
pub fn render_fragments(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => out.push_str(&html_escape(text)),
            Fragment::Code(code) => {
                let _ = write!(out, "<pre><code>{}</code></pre>", html_escape(code));
            }
            Fragment::Link(url) => {
                let url = html_escape(url);
                let _ = write!(
                    out,
                    r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#
                );
            }
        }
    }
    out
}

/// Render one transcript entry.
pub fn render_message(message: &Message) -> String {
    let body = render_fragments(&format::parse(&message.content, message.origin));
    format!(
        r#"<div class="message {}">{body}</div>"#,
        message.origin.as_str()
    )
}

/// Render a run of transcript entries, in order.
pub fn render_messages(messages: &[Message]) -> String {
    messages.iter().map(render_message).collect()
}
