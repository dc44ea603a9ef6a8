use std::fmt::Write;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::client::{ChatApi, HttpChatClient};
use crate::config::{AppConfig, WidgetConfig};
use crate::widget::html::{html_escape, render_message, render_messages};
use crate::widget::{FALLBACK_MESSAGE, Message, Widget, WidgetStore};

/// Page title.
const TITLE: &str = "Financial Batch &amp; Results Assistant";

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let client = match config.upstream.timeout() {
        Some(timeout) => HttpChatClient::with_timeout(&config.upstream.base_url, timeout)?,
        None => HttpChatClient::new(&config.upstream.base_url)?,
    };

    info!(
        name: "upstream.config.loaded",
        base_url = %client.base_url(),
        timeout_secs = ?config.upstream.timeout_secs,
        "Chat service configured"
    );

    let chat: Arc<dyn ChatApi> = Arc::new(client);
    let state = AppState {
        widgets: WidgetStore::new(),
        chat,
        config: Arc::clone(&config),
    };

    spawn_idle_pruner(state.widgets.clone(), config.widget.idle_timeout());

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/widget/{id}", get(widget_page))
        .route("/widget/{id}/messages", post(submit_message))
        .route("/widget/{id}/reply/{ticket}", get(get_reply))
        .route("/widget/{id}/user", post(select_user))
        .route("/widget/{id}/transcript", get(get_transcript))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn spawn_idle_pruner(widgets: WidgetStore, timeout: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(timeout.max(std::time::Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let removed = widgets.prune_idle(timeout);
            if removed > 0 {
                info!(
                    name: "widget.pruned",
                    removed = removed,
                    remaining = widgets.len(),
                    "Dropped idle widgets"
                );
            }
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Generate the HTML shell for the application.
fn html_shell(title: &str, content: &str) -> String {
    let fallback = render_message(&Message::bot(FALLBACK_MESSAGE));
    // JSON string literals are valid JavaScript.
    let fallback = serde_json::Value::from(fallback).to_string();
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <script src="/static/vendor/htmx.min.js"></script>
    <link rel="stylesheet" href="/static/app.css">
</head>
<body>
    {content}
    <script>
        const FALLBACK = {fallback};
        function scrollChat() {{
            const chat = document.getElementById('chat-container');
            if (chat) {{ chat.scrollTop = chat.scrollHeight; }}
        }}
        function failChat(evt) {{
            const chat = document.getElementById('chat-container');
            if (evt.detail.elt.classList.contains('pending')) {{ evt.detail.elt.remove(); }}
            if (chat) {{ chat.insertAdjacentHTML('beforeend', FALLBACK); scrollChat(); }}
        }}
        document.body.addEventListener('htmx:afterSwap', scrollChat);
        document.body.addEventListener('htmx:responseError', failChat);
        document.body.addEventListener('htmx:sendError', failChat);
    </script>
</body>
</html>"#)
}

/// Chat page content for one widget.
fn chat_content(widget: &Widget, widget_config: &WidgetConfig) -> String {
    let id = html_escape(widget.id());
    let selected = html_escape(&widget.selected_user());

    let mut options = String::new();
    for user in &widget_config.users {
        let user = html_escape(user);
        let marker = if selected == user { " selected" } else { "" };
        let _ = write!(options, r#"<option value="{user}"{marker}>{user}</option>"#);
    }

    let mut suggestions = String::new();
    for text in &widget_config.suggestions {
        let vals = html_escape(&serde_json::json!({ "message": text }).to_string());
        let _ = write!(
            suggestions,
            r##"<button type="button" class="suggestion" hx-post="/widget/{id}/messages" hx-vals="{vals}" hx-include="#user-select" hx-target="#chat-container" hx-swap="beforeend">{}</button>"##,
            html_escape(text)
        );
    }

    let transcript = render_messages(&widget.messages());

    format!(
        r##"
    <div class="chat-shell" data-widget-id="{id}">
        <form class="chat-header" method="post" action="/widget/{id}/user">
            <label for="user-select">User</label>
            <select id="user-select" name="user_id"
                hx-post="/widget/{id}/user"
                hx-trigger="change"
                hx-target="#chat-container"
                hx-swap="innerHTML">{options}</select>
            <noscript><button type="submit">Switch</button></noscript>
        </form>

        <div id="chat-container" class="chat-container" aria-live="polite">{transcript}</div>

        <div class="suggestions">{suggestions}</div>

        <form id="chat-form" class="chat-input" method="post" action="/widget/{id}/messages"
            hx-post="/widget/{id}/messages"
            hx-include="#user-select"
            hx-target="#chat-container"
            hx-swap="beforeend"
            hx-on::before-request="this.reset(); document.getElementById('message-input').focus()">
            <input id="message-input" name="message" type="text" autocomplete="off" placeholder="Type your message..." autofocus>
            <button id="send-button" type="submit">Send</button>
        </form>
    </div>
    "##
    )
}

/// Placeholder that fetches the reply to `ticket` as soon as it is swapped in.
fn reply_placeholder(widget_id: &str, ticket: u64) -> String {
    let id = html_escape(widget_id);
    format!(
        r##"<div class="message bot pending" hx-get="/widget/{id}/reply/{ticket}" hx-trigger="load" hx-target="#chat-container" hx-swap="beforeend" hx-on::after-request="this.remove()">&hellip;</div>"##
    )
}

/// Index page handler. Every load starts a fresh widget.
async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let widget = state.widgets.create(state.config.widget.default_user());
    info!(
        name: "widget.created",
        widget_id = %widget.id(),
        user_id = %widget.selected_user(),
        "Widget created"
    );
    Html(html_shell(TITLE, &chat_content(&widget, &state.config.widget)))
}

/// GET /widget/:id - Page for an existing widget; unknown ids start over.
async fn widget_page(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.widgets.get(&id) {
        Some(widget) => {
            Html(html_shell(TITLE, &chat_content(&widget, &state.config.widget))).into_response()
        }
        None => Redirect::to("/").into_response(),
    }
}

/// GET /health - Liveness probe.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Widget Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Form body for message submission.
#[derive(Debug, Deserialize)]
struct MessageForm {
    /// Raw input field value.
    #[serde(default)]
    message: String,
    /// Selector value, sent along so a restored widget keeps the identity.
    #[serde(default)]
    user_id: Option<String>,
}

/// Form body for the user selector.
#[derive(Debug, Deserialize)]
struct UserForm {
    user_id: String,
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

fn find_widget(state: &AppState, id: &str) -> Result<Widget, StatusCode> {
    state.widgets.get(id).ok_or_else(|| {
        tracing::debug!(widget_id = %id, "Widget not found");
        StatusCode::NOT_FOUND
    })
}

/// Find the widget, or register a fresh one under the same id when the page
/// outlived it. Only ids this server could have issued are restored.
fn find_or_restore(
    state: &AppState,
    id: &str,
    user_id: Option<&str>,
) -> Result<Widget, StatusCode> {
    if let Some(widget) = state.widgets.get(id) {
        return Ok(widget);
    }
    if Uuid::parse_str(id).is_err() {
        return find_widget(state, id);
    }

    let widget_config = &state.config.widget;
    let user = user_id
        .filter(|user| widget_config.users.iter().any(|known| known == user))
        .unwrap_or_else(|| widget_config.default_user());
    let widget = state.widgets.restore(id, user);
    warn!(
        name: "widget.restored",
        widget_id = %id,
        user_id = %user,
        "Widget expired; started a new conversation"
    );
    Ok(widget)
}

/// POST /widget/:id/messages - Submit the input field.
///
/// htmx requests get the user entry at once plus a placeholder that fetches
/// the reply. Plain form posts wait for the reply and redirect to the page.
async fn submit_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<MessageForm>,
) -> Result<Response, StatusCode> {
    let widget = find_or_restore(&state, &id, form.user_id.as_deref())?;

    if !is_htmx(&headers) {
        widget.submit(state.chat.as_ref(), &form.message).await;
        return Ok(Redirect::to(&format!("/widget/{}", widget.id())).into_response());
    }

    let Some(queued) = widget.queue_message(&form.message) else {
        return Ok(Html(String::new()).into_response());
    };
    let mut html = render_message(&queued.message);
    html.push_str(&reply_placeholder(widget.id(), queued.ticket));
    Ok(Html(html).into_response())
}

/// GET /widget/:id/reply/:ticket - Bot entries answering up to `ticket`.
async fn get_reply(
    State(state): State<AppState>,
    Path((id, ticket)): Path<(String, u64)>,
) -> Html<String> {
    let Ok(widget) = find_widget(&state, &id) else {
        return Html(render_message(&Message::bot(FALLBACK_MESSAGE)));
    };
    let replies = widget.reply(state.chat.as_ref(), ticket).await;
    Html(render_messages(&replies))
}

/// POST /widget/:id/user - Switch user; returns the whole transcript.
async fn select_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<UserForm>,
) -> Result<Response, StatusCode> {
    let widget = find_or_restore(&state, &id, None)?;
    let transcript = widget.select_user(&form.user_id);
    if is_htmx(&headers) {
        Ok(Html(render_messages(&transcript)).into_response())
    } else {
        Ok(Redirect::to(&format!("/widget/{}", widget.id())).into_response())
    }
}

/// GET /widget/:id/transcript - Full transcript fragment.
async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, StatusCode> {
    let widget = find_widget(&state, &id)?;
    Ok(Html(render_messages(&widget.messages())))
}
