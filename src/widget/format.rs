//! Message formatting.
//!
//! Bot messages get two light formatting passes: triple-backtick fences become
//! code blocks, and bare `http`/`https` URLs become links. The result is a
//! fragment tree; nothing here produces markup; escaping happens in
//! [`crate::widget::html`].

use std::sync::OnceLock;

use regex::Regex;

use crate::widget::message::Origin;

/// Code fence delimiter.
pub const FENCE: &str = "```";

static URL_REGEX: OnceLock<Regex> = OnceLock::new();

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| {
        // Scheme followed by any run of non-whitespace.
        Regex::new(r"https?://\S+").expect("Failed to compile URL regex")
    })
}

/// A piece of a formatted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Literal text.
    Text(String),
    /// Contents of a fenced code block.
    Code(String),
    /// A URL; it is both the target and the visible text.
    Link(String),
}

/// Parse `content` into fragments according to its origin.
///
/// User messages are always a single literal text fragment. Bot messages
/// containing a fence are split into alternating text and code; otherwise bot
/// messages mentioning `http` have their URLs linked.
#[must_use]
pub fn parse(content: &str, origin: Origin) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    match origin {
        Origin::Bot if content.contains(FENCE) => split_fences(content, &mut fragments),
        Origin::Bot if content.contains("http") => linkify(content, &mut fragments),
        _ => push_text(&mut fragments, content),
    }
    fragments
}

fn split_fences(content: &str, out: &mut Vec<Fragment>) {
    let parts: Vec<&str> = content.split(FENCE).collect();
    // An even part count means the last fence was never closed.
    let unclosed = parts.len() % 2 == 0;

    for (i, part) in parts.iter().enumerate() {
        if unclosed && i == parts.len() - 1 {
            push_text(out, FENCE);
            push_text(out, part);
        } else if i % 2 == 0 {
            push_text(out, part);
        } else {
            out.push(Fragment::Code((*part).to_string()));
        }
    }
}

fn linkify(content: &str, out: &mut Vec<Fragment>) {
    let mut last = 0;
    for m in url_regex().find_iter(content) {
        push_text(out, &content[last..m.start()]);
        out.push(Fragment::Link(m.as_str().to_string()));
        last = m.end();
    }
    push_text(out, &content[last..]);
}

/// Append text, merging with a preceding text fragment.
fn push_text(out: &mut Vec<Fragment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Fragment::Text(prev)) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Fragment::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Fragment {
        Fragment::Text(s.to_string())
    }

    #[test]
    fn test_plain_text_is_literal() {
        assert_eq!(parse("<b>hi</b>", Origin::Bot), vec![text("<b>hi</b>")]);
        assert_eq!(parse("<b>hi</b>", Origin::User), vec![text("<b>hi</b>")]);
    }

    #[test]
    fn test_code_fence_alternates() {
        assert_eq!(
            parse("a```code```b", Origin::Bot),
            vec![text("a"), Fragment::Code("code".into()), text("b")]
        );
    }

    #[test]
    fn test_multiple_fences() {
        assert_eq!(
            parse("```x```mid```y```", Origin::Bot),
            vec![
                Fragment::Code("x".into()),
                text("mid"),
                Fragment::Code("y".into()),
            ]
        );
    }

    #[test]
    fn test_unclosed_fence_stays_literal() {
        assert_eq!(parse("a```b", Origin::Bot), vec![text("a```b")]);
        assert_eq!(
            parse("x```c```y```tail", Origin::Bot),
            vec![text("x"), Fragment::Code("c".into()), text("y```tail")]
        );
    }

    #[test]
    fn test_fenced_message_does_not_link() {
        assert_eq!(
            parse("see http://a.b ```x```", Origin::Bot),
            vec![text("see http://a.b "), Fragment::Code("x".into())]
        );
    }

    #[test]
    fn test_link_with_surrounding_text() {
        assert_eq!(
            parse("see http://example.com now", Origin::Bot),
            vec![
                text("see "),
                Fragment::Link("http://example.com".into()),
                text(" now"),
            ]
        );
    }

    #[test]
    fn test_multiple_links() {
        assert_eq!(
            parse("https://a.io/x and http://b.io", Origin::Bot),
            vec![
                Fragment::Link("https://a.io/x".into()),
                text(" and "),
                Fragment::Link("http://b.io".into()),
            ]
        );
    }

    #[test]
    fn test_http_without_url_is_text() {
        assert_eq!(parse("the http protocol", Origin::Bot), vec![text("the http protocol")]);
    }

    #[test]
    fn test_user_messages_never_formatted() {
        assert_eq!(
            parse("a```b``` http://x.y", Origin::User),
            vec![text("a```b``` http://x.y")]
        );
    }

    #[test]
    fn test_empty_content() {
        assert!(parse("", Origin::Bot).is_empty());
    }
}
