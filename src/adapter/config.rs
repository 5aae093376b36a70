use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::Record;

/// Backend configuration handed to [`Adapter::connect`](super::Adapter::connect).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Separator between model name and id in record keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_separator: Option<String>,
    /// Backend-specific settings.
    #[serde(flatten)]
    pub settings: Record,
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.key_separator = Some(separator.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_separator_and_settings() {
        let config = AdapterConfig::from_json(r#"{"key_separator": "::", "pool": 4}"#).unwrap();
        assert_eq!(config.key_separator.as_deref(), Some("::"));
        assert_eq!(config.setting("pool"), Some(&serde_json::json!(4)));
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(AdapterConfig::from_json("{}").unwrap(), AdapterConfig::default());
    }

    #[test]
    fn invalid_json_is_config_error() {
        assert!(matches!(AdapterConfig::from_json("{"), Err(Error::Config(_))));
    }
}
