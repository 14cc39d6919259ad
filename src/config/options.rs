//! Client Configuration
//!
//! Defines the configuration schema for the chat client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_TITLE: &str = "Vivica Chat Companion";
pub const DEFAULT_REFERER: &str = "http://localhost";
pub const DEFAULT_RETRY_DELAY_MS: u64 = 300;

/// Configuration for the chat client
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the completions API (without `/chat/completions`)
    pub base_url: String,

    /// Primary API key; additional keys come from user settings
    pub api_key: String,

    /// Sent as `HTTP-Referer`
    pub referer: String,

    /// Sent as `X-Title`
    pub title: String,

    /// Pause before each backup-key attempt
    pub retry_delay_ms: u64,

    /// Where persistent state lives; defaults to the platform data dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            storage_dir: None,
        }
    }
}

impl ClientConfig {
    /// `POST` target for chat completions
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &format_args!("***{}", crate::store::key_suffix(&self.api_key)),
            )
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("storage_dir", &self.storage_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_config() {
        let json = r#"{
            "base_url": "https://proxy.example.com/v1/",
            "retry_delay_ms": 50
        }"#;

        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.completions_url(),
            "https://proxy.example.com/v1/chat/completions"
        );
        assert_eq!(config.retry_delay(), Duration::from_millis(50));
        assert_eq!(config.title, DEFAULT_TITLE);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ClientConfig {
            api_key: "sk-or-v1-secretsecret9876".to_string(),
            ..Default::default()
        };

        let rendered = format!("{:?}", config);
        assert!(rendered.contains("***9876"));
        assert!(!rendered.contains("secretsecret"));
    }
}
