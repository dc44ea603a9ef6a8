//! Chat widget controller.
//!
//! [`WidgetState`] is the synchronous state machine: transcript, input field,
//! selected user and the optional conversation id. [`Widget`] wraps it in a
//! shareable handle and drives exchanges with the chat service.
//!
//! Submitting is split in two steps. [`Widget::queue_message`] renders the
//! user message right away and hands back a ticket; [`Widget::reply`] runs the
//! queued exchanges up to that ticket. Exchanges on one widget are serialized:
//! each waits for the previous one, so it carries the latest conversation id
//! and replies appear in submission order. Each exchange remembers the
//! generation it was sent in; switching users bumps the generation, empties the
//! queue, and any exchange still in flight is dropped when it returns.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::client::{ChatApi, ChatRequest, ChatResponse};
use crate::error::RequestFailure;
use crate::widget::message::{Message, Origin, Transcript};

/// Shown once when the widget is first created.
pub const WELCOME_MESSAGE: &str = "Welcome to the Financial Batch & Results Chatbot! You can:\n\n\
1. Start batch runs (CCAR, RiskApetite, Stress)\n\
2. Check run status\n\
3. View run logs\n\
4. Get stress test results\n\
5. Get allowance results\n\n\
How can I help you today?";

/// Shown after every user switch.
pub const GREETING_MESSAGE: &str =
    "Hi, I'm your Financial Batch & Results Assistant. How can I help you today?";

/// Shown when an exchange fails for any reason.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// A user message rendered but not yet sent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Queued {
    ticket: u64,
    message: String,
}

/// Result of queueing a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Pass to [`Widget::reply`] to fetch the answer.
    pub ticket: u64,
    /// The user entry that was rendered.
    pub message: Message,
}

/// An exchange taken off the queue and not yet completed.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    /// Body to send to the chat service.
    pub request: ChatRequest,
    /// Ticket of the submission this exchange answers.
    pub ticket: u64,
    generation: u64,
}

/// State owned by one widget instance.
#[derive(Debug)]
pub struct WidgetState {
    selected_user: String,
    conversation_id: Option<String>,
    input: String,
    generation: u64,
    next_ticket: u64,
    queue: VecDeque<Queued>,
    transcript: Transcript,
}

impl WidgetState {
    /// Create the state for a fresh widget, showing the welcome message.
    pub fn new(selected_user: impl Into<String>) -> Self {
        let mut state = Self {
            selected_user: selected_user.into(),
            conversation_id: None,
            input: String::new(),
            generation: 0,
            next_ticket: 0,
            queue: VecDeque::new(),
            transcript: Transcript::new(),
        };
        state.render_message(WELCOME_MESSAGE, Origin::Bot);
        state
    }

    /// Append a message to the transcript. Returns its index.
    pub fn render_message(&mut self, content: impl Into<String>, origin: Origin) -> usize {
        self.transcript.push(Message {
            content: content.into(),
            origin,
        })
    }

    /// Replace the input field value.
    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    /// Start submitting the input field.
    ///
    /// Returns `None` without touching anything if the trimmed input is
    /// empty. Otherwise renders the user message, clears the input and queues
    /// the message for sending. Returns the ticket of the queued message.
    pub fn begin_submit(&mut self) -> Option<u64> {
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }

        self.render_message(message.clone(), Origin::User);
        self.input.clear();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.queue.push_back(Queued { ticket, message });
        Some(ticket)
    }

    /// Take the oldest queued message if its ticket is at most `through`.
    ///
    /// The request is built now, so it carries the conversation id left by
    /// the exchange before it.
    pub fn next_exchange(&mut self, through: u64) -> Option<PendingExchange> {
        if self.queue.front()?.ticket > through {
            return None;
        }
        let queued = self.queue.pop_front()?;
        Some(PendingExchange {
            request: ChatRequest {
                user_id: self.selected_user.clone(),
                message: queued.message,
                conversation_id: self.conversation_id.clone(),
            },
            ticket: queued.ticket,
            generation: self.generation,
        })
    }

    /// Number of messages waiting to be sent.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Apply the outcome of an exchange.
    ///
    /// Returns the bot message rendered, or `None` if the exchange belonged
    /// to an earlier generation and was discarded.
    pub fn complete(
        &mut self,
        pending: &PendingExchange,
        outcome: &Result<ChatResponse, RequestFailure>,
    ) -> Option<Message> {
        if pending.generation != self.generation {
            return None;
        }
        let reply = match outcome {
            Ok(reply) => {
                self.conversation_id = Some(reply.conversation_id.clone());
                Message::bot(reply.response.clone())
            }
            Err(_) => Message::bot(FALLBACK_MESSAGE),
        };
        self.transcript.push(reply.clone());
        Some(reply)
    }

    /// Switch identity: forget the conversation and start a new transcript.
    pub fn select_user(&mut self, user_id: impl Into<String>) {
        self.selected_user = user_id.into();
        self.conversation_id = None;
        self.generation += 1;
        self.queue.clear();
        self.transcript.clear();
        self.render_message(GREETING_MESSAGE, Origin::Bot);
    }

    #[must_use]
    pub fn selected_user(&self) -> &str {
        &self.selected_user
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

/// Shareable handle to one widget instance.
#[derive(Debug)]
pub struct Widget {
    inner: Arc<WidgetInner>,
}

#[derive(Debug)]
struct WidgetInner {
    id: String,
    state: Mutex<WidgetState>,
    /// Held for the whole of an exchange.
    turn: tokio::sync::Mutex<()>,
    last_activity: Mutex<DateTime<Utc>>,
}

impl Clone for Widget {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Widget {
    /// Create a widget showing the welcome message.
    pub fn new(id: impl Into<String>, selected_user: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(WidgetInner {
                id: id.into(),
                state: Mutex::new(WidgetState::new(selected_user)),
                turn: tokio::sync::Mutex::new(()),
                last_activity: Mutex::new(Utc::now()),
            }),
        }
    }

    /// Get the widget ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Copy of the current transcript.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.state().transcript().messages().to_vec()
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<String> {
        self.state().conversation_id().map(str::to_string)
    }

    #[must_use]
    pub fn selected_user(&self) -> String {
        self.state().selected_user().to_string()
    }

    /// Type `input` into the field and submit it, without waiting for the
    /// reply. `None` if the input was blank.
    pub fn queue_message(&self, input: &str) -> Option<QueuedMessage> {
        self.touch();
        let mut state = self.state();
        state.set_input(input);
        let Some(ticket) = state.begin_submit() else {
            debug!(widget_id = %self.id(), "Ignoring blank submission");
            return None;
        };
        let message = state.transcript().messages().last().cloned()?;
        Some(QueuedMessage { ticket, message })
    }

    /// Run every queued exchange up to and including `ticket`.
    ///
    /// Returns the bot messages rendered by this call, in order. Empty if the
    /// exchanges already ran or were dropped by a user switch.
    pub async fn reply(&self, api: &dyn ChatApi, ticket: u64) -> Vec<Message> {
        let _turn = self.inner.turn.lock().await;
        let mut rendered = Vec::new();

        loop {
            self.touch();
            let Some(pending) = self.state().next_exchange(ticket) else {
                break;
            };

            debug!(
                widget_id = %self.id(),
                ticket = pending.ticket,
                user_id = %pending.request.user_id,
                conversation_id = ?pending.request.conversation_id,
                "Sending chat request"
            );

            let outcome = api.send_message(&pending.request).await;
            match &outcome {
                Ok(reply) => info!(
                    name: "widget.exchange.completed",
                    widget_id = %self.id(),
                    conversation_id = %reply.conversation_id,
                    "Chat exchange completed"
                ),
                Err(e) => error!(
                    name: "widget.exchange.failed",
                    widget_id = %self.id(),
                    status = ?e.status(),
                    error = %e,
                    "Chat exchange failed"
                ),
            }

            let mut state = self.state();
            match state.complete(&pending, &outcome) {
                Some(message) => rendered.push(message),
                None => debug!(
                    widget_id = %self.id(),
                    sent_generation = pending.generation,
                    current_generation = state.generation(),
                    "Discarding exchange from before user switch"
                ),
            }
        }

        rendered
    }

    /// Type `input` into the field, submit it and wait for the reply.
    ///
    /// Returns the user message followed by the reply (or fallback). Empty if
    /// the input was blank; just the user message if a user switch overtook
    /// the exchange.
    pub async fn submit(&self, api: &dyn ChatApi, input: &str) -> Vec<Message> {
        let Some(queued) = self.queue_message(input) else {
            return Vec::new();
        };
        let mut appended = vec![queued.message];
        appended.extend(self.reply(api, queued.ticket).await);
        appended
    }

    /// Submit a canned suggestion as if it had been typed.
    pub async fn use_suggestion(&self, api: &dyn ChatApi, text: &str) -> Vec<Message> {
        self.submit(api, text).await
    }

    /// Switch the selected user. Returns the new transcript.
    pub fn select_user(&self, user_id: &str) -> Vec<Message> {
        self.touch();
        let mut state = self.state();
        state.select_user(user_id);
        info!(
            name: "widget.user.selected",
            widget_id = %self.id(),
            user_id = %user_id,
            "User selection changed; conversation reset"
        );
        state.transcript().messages().to_vec()
    }

    /// Last time the widget was used.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }

    fn state(&self) -> MutexGuard<'_, WidgetState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(id: &str, text: &str) -> Result<ChatResponse, RequestFailure> {
        Ok(ChatResponse {
            conversation_id: id.to_string(),
            response: text.to_string(),
        })
    }

    fn failure(status: u16) -> Result<ChatResponse, RequestFailure> {
        Err(RequestFailure::Api {
            status,
            message: "boom".into(),
        })
    }

    /// Type, submit and take the exchange off the queue.
    fn send(state: &mut WidgetState, input: &str) -> PendingExchange {
        state.set_input(input);
        let ticket = state.begin_submit().unwrap();
        state.next_exchange(ticket).unwrap()
    }

    #[test]
    fn test_new_widget_shows_welcome() {
        let state = WidgetState::new("analyst");
        let messages = state.transcript().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, WELCOME_MESSAGE);
        assert_eq!(messages[0].origin, Origin::Bot);
        assert!(state.conversation_id().is_none());
    }

    #[test]
    fn test_blank_input_is_noop() {
        let mut state = WidgetState::new("analyst");
        for input in ["", "   ", "\t\n"] {
            state.set_input(input);
            assert!(state.begin_submit().is_none());
        }
        assert_eq!(state.transcript().len(), 1);
        assert_eq!(state.queued(), 0);
    }

    #[test]
    fn test_begin_submit_trims_renders_and_clears() {
        let mut state = WidgetState::new("analyst");
        state.set_input("  check status  ");

        let ticket = state.begin_submit().unwrap();
        assert_eq!(state.input(), "");
        assert_eq!(state.queued(), 1);

        let last = state.transcript().messages().last().unwrap();
        assert_eq!(last, &Message::user("check status"));

        let pending = state.next_exchange(ticket).unwrap();
        assert_eq!(pending.request.message, "check status");
        assert_eq!(pending.request.user_id, "analyst");
        assert_eq!(pending.request.conversation_id, None);
        assert_eq!(state.queued(), 0);
    }

    #[test]
    fn test_user_messages_render_before_replies() {
        let mut state = WidgetState::new("analyst");
        state.set_input("first");
        let first = state.begin_submit().unwrap();
        state.set_input("second");
        let second = state.begin_submit().unwrap();
        assert!(first < second);

        // Only tickets up to the one asked for are taken.
        let pending = state.next_exchange(first).unwrap();
        assert!(state.next_exchange(first).is_none());
        state.complete(&pending, &reply("conv-1", "one"));

        let pending = state.next_exchange(second).unwrap();
        assert_eq!(pending.request.conversation_id.as_deref(), Some("conv-1"));
        state.complete(&pending, &reply("conv-1", "two"));

        let contents: Vec<&str> = state
            .transcript()
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(&contents[1..], &["first", "second", "one", "two"]);
    }

    #[test]
    fn test_success_stores_conversation_id() {
        let mut state = WidgetState::new("analyst");
        let pending = send(&mut state, "first");
        assert_eq!(
            state.complete(&pending, &reply("conv-1", "hello")),
            Some(Message::bot("hello"))
        );
        assert_eq!(state.conversation_id(), Some("conv-1"));

        let pending = send(&mut state, "second");
        assert_eq!(pending.request.conversation_id.as_deref(), Some("conv-1"));
        state.complete(&pending, &reply("conv-2", "again"));

        let pending = send(&mut state, "third");
        assert_eq!(pending.request.conversation_id.as_deref(), Some("conv-2"));
    }

    #[test]
    fn test_failure_renders_one_fallback() {
        let mut state = WidgetState::new("analyst");
        let pending = send(&mut state, "hello");
        let before = state.transcript().len();

        state.complete(&pending, &failure(500));

        assert_eq!(state.transcript().len(), before + 1);
        assert_eq!(
            state.transcript().messages().last().unwrap(),
            &Message::bot(FALLBACK_MESSAGE)
        );
        assert!(state.conversation_id().is_none());
    }

    #[test]
    fn test_select_user_resets() {
        let mut state = WidgetState::new("analyst");
        let pending = send(&mut state, "hello");
        state.complete(&pending, &reply("conv-1", "hi"));

        state.select_user("risk-manager");

        assert!(state.conversation_id().is_none());
        assert_eq!(state.selected_user(), "risk-manager");
        assert_eq!(
            state.transcript().messages(),
            &[Message::bot(GREETING_MESSAGE)]
        );
    }

    #[test]
    fn test_select_user_drops_queued_messages() {
        let mut state = WidgetState::new("analyst");
        state.set_input("never sent");
        let ticket = state.begin_submit().unwrap();

        state.select_user("other");

        assert_eq!(state.queued(), 0);
        assert!(state.next_exchange(ticket).is_none());
    }

    #[test]
    fn test_exchange_after_user_switch_is_discarded() {
        let mut state = WidgetState::new("analyst");
        let pending = send(&mut state, "hello");

        state.select_user("other");
        assert!(state.complete(&pending, &reply("conv-old", "late")).is_none());

        assert!(state.conversation_id().is_none());
        assert_eq!(state.transcript().len(), 1);

        let pending = send(&mut state, "fresh");
        assert_eq!(pending.request.user_id, "other");
        assert_eq!(pending.request.conversation_id, None);
    }
}
