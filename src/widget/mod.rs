//! The chat widget.
//!
//! # Architecture
//!
//! - [`controller`]: widget state and the message exchange flow
//! - [`format`]: parsing of bot messages into code blocks and links
//! - [`html`]: escaped HTML rendering of transcript entries
//! - [`message`]: messages and the transcript
//! - [`store`]: registry of live widget instances
//!
//! # Example
//!
//! ```rust
//! use chat_widget::widget::{Origin, WidgetState, html};
//!
//! let mut state = WidgetState::new("analyst");
//! state.render_message("see http://example.com", Origin::Bot);
//!
//! let markup = html::render_messages(state.transcript().messages());
//! assert!(markup.contains(r#"<a href="http://example.com""#));
//! ```

pub mod controller;
pub mod format;
pub mod html;
pub mod message;
pub mod store;

pub use controller::{
    FALLBACK_MESSAGE, GREETING_MESSAGE, PendingExchange, QueuedMessage, WELCOME_MESSAGE, Widget,
    WidgetState,
};
pub use format::Fragment;
pub use message::{Message, Origin, Transcript};
pub use store::WidgetStore;
