//! Chat Widget
//!
//! A server-rendered chat widget for the Financial Batch & Results assistant.
//! The browser posts messages and user-selector changes; the server owns the
//! widget state, exchanges messages with the remote chat service and answers
//! with HTML fragments.
//!
//! # Architecture
//!
//! - **Server**: Axum router serving the page and fragment endpoints
//! - **Widget**: per-page controller, transcript and message formatting
//! - **Client**: `reqwest` client for the remote chat service
//!
//! # Modules
//!
//! - [`client`]: chat service client and wire types
//! - [`config`]: layered configuration
//! - [`error`]: request failure type
//! - [`server`]: HTTP surface
//! - [`widget`]: controller, formatter, renderer and store

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod widget;

use std::sync::Arc;

use crate::client::ChatApi;
use crate::config::AppConfig;
use crate::widget::WidgetStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live widgets, one per page load.
    pub widgets: WidgetStore,
    /// Remote chat service.
    pub chat: Arc<dyn ChatApi>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("widgets", &self.widgets.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
