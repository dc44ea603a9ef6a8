//! Transcript messages.

use serde::{Deserialize, Serialize};

/// Who a transcript entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Bot,
}

impl Origin {
    /// CSS class used for the entry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

/// A single rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub origin: Origin,
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin: Origin::User,
        }
    }

    /// Create a bot message.
    #[must_use]
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin: Origin::Bot,
        }
    }
}

/// Ordered list of messages visible in the widget.
///
/// Insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Returns its index.
    pub fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// All entries in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_appends_in_order() {
        let mut transcript = Transcript::new();

        assert_eq!(transcript.push(Message::bot("welcome")), 0);
        assert_eq!(transcript.push(Message::user("hello")), 1);

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[1].origin, Origin::User);
    }

    #[test]
    fn test_clear() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("x"));
        transcript.clear();
        assert!(transcript.is_empty());
    }
}
