use std::time::Duration;

use serde_json::Value;

use super::Cache;

/// Default lifetime for cached UI state.
const DEFAULT_UI_TTL: Duration = Duration::from_secs(3600);

/// Cache for rendered UI state (widgets and forms), keyed by identifier.
pub struct UiCache {
    inner: Cache<Value>,
    ttl: Duration,
}

impl UiCache {
    pub fn new(inner: Cache<Value>) -> Self {
        Self {
            inner,
            ttl: DEFAULT_UI_TTL,
        }
    }

    pub fn widget_data(&self, widget_id: &str) -> Option<Value> {
        self.inner.get(&format!("ui_widget_{widget_id}"))
    }

    pub fn set_widget_data(&self, widget_id: &str, data: Value) {
        self.inner
            .set_with_ttl(&format!("ui_widget_{widget_id}"), data, self.ttl);
    }

    pub fn form_data(&self, form_name: &str) -> Option<Value> {
        self.inner.get(&format!("ui_form_{form_name}"))
    }

    pub fn set_form_data(&self, form_name: &str, data: Value) {
        self.inner
            .set_with_ttl(&format!("ui_form_{form_name}"), data, self.ttl);
    }

    pub fn invalidate_form(&self, form_name: &str) -> bool {
        self.inner.delete(&format!("ui_form_{form_name}"))
    }

    /// Drop all cached UI state. Returns the number of entries removed.
    pub fn invalidate_all(&self) -> usize {
        self.inner.invalidate_matching("ui_")
    }
}
