//! Client for the remote chat service.
//!
//! The widget talks to the service through the [`ChatApi`] trait so the
//! controller can be driven by [`HttpChatClient`] in production and by an
//! in-memory double in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RequestFailure, Result};

/// Path of the chat exchange endpoint.
pub const CHAT_PATH: &str = "/api/chat/chat";

/// Collection of stored conversations; keys are appended as one segment.
pub const CONVERSATIONS_PATH: &str = "/api/chat/conversations";

/// Body of a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Identity selected in the widget.
    pub user_id: String,
    /// Trimmed message text.
    pub message: String,
    /// Conversation to continue; `null` starts a new one.
    pub conversation_id: Option<String>,
}

/// Successful answer from the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Conversation the exchange was recorded in.
    pub conversation_id: String,
    /// Reply text shown as a bot message.
    pub response: String,
}

/// A stored conversation as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub user_id: String,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub last_updated: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ConversationList {
    conversations: Vec<ConversationSummary>,
}

/// The single operation the widget needs from the chat service.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send one message and wait for the reply.
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

/// `reqwest`-backed chat service client.
///
/// # Example
///
/// ```rust,no_run
/// use chat_widget::client::{ChatApi, ChatRequest, HttpChatClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpChatClient::new("http://localhost:9000")?;
/// let reply = client
///     .send_message(&ChatRequest {
///         user_id: "analyst".into(),
///         message: "Check run status".into(),
///         conversation_id: None,
///     })
///     .await?;
/// println!("{}", reply.response);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpChatClient {
    /// Create a client with transport defaults (no explicit timeout).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, http)
    }

    /// Create a client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self { base_url, http })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the stored conversations of `user_id`, most recent first.
    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>> {
        let response = self
            .http
            .get(self.conversation_url(user_id)?)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let list: ConversationList = Self::handle_response(response).await?;
        Ok(list.conversations)
    }

    /// Delete a stored conversation.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.conversation_url(conversation_id)?)
            .send()
            .await?;
        let _: serde_json::Value = Self::handle_response(response).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// `{base}/api/chat/conversations/{key}` with `key` percent-encoded.
    fn conversation_url(&self, key: &str) -> Result<Url> {
        let mut url = self.url(CONVERSATIONS_PATH)?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(key);
        Ok(url)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(RequestFailure::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatClient {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .http
            .post(self.url(CHAT_PATH)?)
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }
}
