//! Shared test doubles for the chat service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chat_widget::AppState;
use chat_widget::client::{ChatApi, ChatRequest, ChatResponse};
use chat_widget::config::{AppConfig, LogConfig, ServerConfig, UpstreamConfig, WidgetConfig};
use chat_widget::error::RequestFailure;
use chat_widget::widget::WidgetStore;
use tokio::sync::Notify;

/// Replies from a fixed script; `Err(status)` entries fail with that status.
#[derive(Debug, Default)]
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<ChatResponse, u16>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<Result<ChatResponse, u16>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for ScriptedChat {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, RequestFailure> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(status)) => Err(RequestFailure::Api {
                status,
                message: "scripted failure".into(),
            }),
            None => Err(RequestFailure::Api {
                status: 503,
                message: "script exhausted".into(),
            }),
        }
    }
}

/// Holds every request until the test releases it.
#[derive(Debug)]
pub struct GatedChat {
    started: Notify,
    gate: Notify,
    conversation_id: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl GatedChat {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            started: Notify::new(),
            gate: Notify::new(),
            conversation_id: conversation_id.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Wait until a request has reached the service.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let one held request return.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for GatedChat {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, RequestFailure> {
        self.requests.lock().unwrap().push(request.clone());
        self.started.notify_one();
        self.gate.notified().await;
        Ok(reply(&self.conversation_id, &format!("re: {}", request.message)))
    }
}

pub fn reply(conversation_id: &str, response: &str) -> ChatResponse {
    ChatResponse {
        conversation_id: conversation_id.to_string(),
        response: response.to_string(),
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".into(),
            static_dir: "static".into(),
        },
        upstream: UpstreamConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: None,
        },
        widget: WidgetConfig {
            users: vec!["analyst".into(), "risk-manager".into()],
            suggestions: vec!["Check run status".into()],
            idle_timeout_secs: 60,
        },
        log: LogConfig { json: false },
    }
}

pub fn test_state(chat: Arc<dyn ChatApi>) -> AppState {
    AppState {
        widgets: WidgetStore::new(),
        chat,
        config: Arc::new(test_config()),
    }
}

/// Serve `router` on an ephemeral local port; returns its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
