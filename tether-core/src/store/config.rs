//! Store configuration.

use serde::{Deserialize, Serialize};

/// Settings for a root store and every scope derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name attached to the store's log events.
    pub label: String,

    /// Emit a `trace` event for every processed action.
    pub trace_actions: bool,
}

impl StoreConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_trace_actions(mut self, enabled: bool) -> Self {
        self.trace_actions = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: "store".to_string(),
            trace_actions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = StoreConfig::default()
            .with_label("settings")
            .with_trace_actions(false);
        assert_eq!(config.label, "settings");
        assert!(!config.trace_actions);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{ "label": "root" }"#).unwrap();
        assert_eq!(config.label, "root");
        assert!(config.trace_actions);
    }
}
