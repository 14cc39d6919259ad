//! User Settings
//!
//! The persisted settings blob the front-end edits. Only the backup API keys
//! matter here; every other field is carried through untouched.

use crate::store::storage::{load_json, save_json, KeyValueStore};
use serde::{Deserialize, Serialize};

/// Storage key for the settings blob
pub const SETTINGS_KEY: &str = "vivica-settings";

/// Storage key for a directly-entered primary key
pub const PRIMARY_KEY_KEY: &str = "openrouter-api-key";

/// User-editable settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(rename = "apiKey1", default, skip_serializing_if = "Option::is_none")]
    pub api_key1: Option<String>,

    #[serde(rename = "apiKey2", default, skip_serializing_if = "Option::is_none")]
    pub api_key2: Option<String>,

    #[serde(rename = "apiKey3", default, skip_serializing_if = "Option::is_none")]
    pub api_key3: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserSettings {
    /// Read settings; missing or unreadable settings are empty
    pub fn load(store: &dyn KeyValueStore) -> Self {
        load_json(store, SETTINGS_KEY).unwrap_or_default()
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        save_json(store, SETTINGS_KEY, self);
    }

    /// The three key slots in order, trimmed, blanks dropped
    pub fn api_keys(&self) -> Vec<String> {
        [&self.api_key1, &self.api_key2, &self.api_key3]
            .into_iter()
            .flatten()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// The key a new client should treat as primary: a directly stored key, then
/// the settings slots in order, then `configured`.
pub fn primary_api_key(store: &dyn KeyValueStore, configured: &str) -> String {
    if let Ok(Some(direct)) = store.get(PRIMARY_KEY_KEY) {
        let direct = direct.trim();
        if !direct.is_empty() {
            return direct.to_string();
        }
    }

    UserSettings::load(store)
        .api_keys()
        .into_iter()
        .next()
        .unwrap_or_else(|| configured.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::storage::MemoryStore;

    #[test]
    fn test_settings_keep_unknown_fields() {
        let store = MemoryStore::new();
        store
            .set(
                SETTINGS_KEY,
                r#"{"apiKey1":" sk-one ","apiKey2":"","theme":"dark","apiKey3":null}"#,
            )
            .unwrap();

        let settings = UserSettings::load(&store);
        assert_eq!(settings.api_keys(), vec!["sk-one".to_string()]);
        assert_eq!(settings.extra["theme"], "dark");

        settings.save(&store);
        let raw = store.get(SETTINGS_KEY).unwrap().unwrap();
        assert!(raw.contains("\"theme\":\"dark\""));
    }

    #[test]
    fn test_primary_key_prefers_direct_entry() {
        let store = MemoryStore::new();
        store.set(PRIMARY_KEY_KEY, "sk-direct").unwrap();
        store
            .set(SETTINGS_KEY, r#"{"apiKey1":"sk-one"}"#)
            .unwrap();

        assert_eq!(primary_api_key(&store, "sk-env"), "sk-direct");
    }

    #[test]
    fn test_primary_key_falls_back_through_settings() {
        let store = MemoryStore::new();
        store
            .set(SETTINGS_KEY, r#"{"apiKey2":"sk-two","apiKey3":"sk-three"}"#)
            .unwrap();

        assert_eq!(primary_api_key(&store, "sk-env"), "sk-two");
    }

    #[test]
    fn test_primary_key_uses_configured_last() {
        let store = MemoryStore::new();
        store.set(SETTINGS_KEY, "garbage").unwrap();

        assert_eq!(primary_api_key(&store, "sk-env"), "sk-env");
        assert_eq!(primary_api_key(&MemoryStore::new(), ""), "");
    }
}
