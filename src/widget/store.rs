//! In-memory registry of live widgets.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::widget::controller::Widget;

/// Default idle timeout (30 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Thread-safe store of widget instances, one per page load.
#[derive(Debug, Clone, Default)]
pub struct WidgetStore {
    inner: Arc<RwLock<HashMap<String, Widget>>>,
}

impl WidgetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a widget for `selected_user` and register it.
    pub fn create(&self, selected_user: &str) -> Widget {
        let widget = Widget::new(Uuid::new_v4().to_string(), selected_user);
        self.write().insert(widget.id().to_string(), widget.clone());
        widget
    }

    /// Get the widget registered under `id`, registering a fresh one for
    /// `selected_user` if there is none.
    ///
    /// Used when a page outlives its widget. The fresh widget starts a new
    /// conversation.
    pub fn restore(&self, id: &str, selected_user: &str) -> Widget {
        self.write()
            .entry(id.to_string())
            .or_insert_with(|| Widget::new(id, selected_user))
            .clone()
    }

    /// Get a widget by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Widget> {
        self.read().get(id).cloned()
    }

    /// Remove a widget by ID.
    pub fn remove(&self, id: &str) -> Option<Widget> {
        self.write().remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop widgets idle for longer than `timeout`.
    ///
    /// Returns the number of widgets removed.
    pub fn prune_idle(&self, timeout: Duration) -> usize {
        let now = Utc::now();
        let mut guard = self.write();
        let before = guard.len();
        guard.retain(|_, widget| {
            // Negative idle time (clock skew) keeps the widget.
            !(now - widget.last_activity())
                .to_std()
                .is_ok_and(|idle| idle > timeout)
        });
        before - guard.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Widget>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Widget>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
