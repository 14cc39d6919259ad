//! Configuration Loader
//!
//! Merges the client configuration from defaults, JSON files and environment.

use crate::config::options::ClientConfig;
use crate::error::{Result, VivicaError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    config: serde_json::Value,
}

impl ConfigLoader {
    /// Load defaults, then config files from the default paths, then env vars
    pub fn new() -> Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut loader = Self::with_defaults()?;
        loader.load_from_default_paths()?;
        loader.apply_env_overrides();

        Ok(loader)
    }

    /// Create a loader with a specific config file (no env overrides)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::with_defaults()?;
        loader.load_from_file(path)?;
        Ok(loader)
    }

    fn with_defaults() -> Result<Self> {
        let config = serde_json::to_value(ClientConfig::default())
            .map_err(|e| VivicaError::Config(format!("Failed to encode defaults: {}", e)))?;
        Ok(Self { config })
    }

    /// Merge every config file that exists, in path order
    fn load_from_default_paths(&mut self) -> Result<()> {
        for path in Self::get_config_paths() {
            if path.exists() {
                self.load_from_file(&path)?;
            }
        }

        Ok(())
    }

    /// Config paths in merge order; later files override earlier ones
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".vivica").join("config.json"));
        }

        // 2. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("vivica").join("config.json"));
        }

        // 3. Current directory
        paths.push(PathBuf::from("vivica.json"));

        // 4. Environment variable
        if let Ok(custom_path) = std::env::var("VIVICA_CONFIG_PATH") {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VivicaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            VivicaError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "Loaded config file");
        self.merge_config(value)
    }

    /// Merge another config into this one (later configs override earlier)
    fn merge_config(&mut self, other: serde_json::Value) -> Result<()> {
        let serde_json::Value::Object(other) = other else {
            return Err(VivicaError::Config(
                "Config file must contain a JSON object".to_string(),
            ));
        };

        if let Some(config) = self.config.as_object_mut() {
            for (key, value) in other {
                config.insert(key, value);
            }
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("VIVICA_API_KEY").ok(),
            std::env::var("VIVICA_API_URL").ok(),
        );
    }

    /// Override the key and base URL when set and non-empty
    fn apply_overrides(&mut self, api_key: Option<String>, base_url: Option<String>) {
        if let Some(config) = self.config.as_object_mut() {
            if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
                config.insert("api_key".to_string(), key.trim().into());
            }
            if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
                config.insert("base_url".to_string(), url.trim().into());
            }
        }
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> Result<ClientConfig> {
        serde_json::from_value(self.config)
            .map_err(|e| VivicaError::Config(format!("Invalid configuration: {}", e)))
    }
}
