//! Configuration Module
//!
//! Client configuration loading and the persisted user settings.

pub mod loader;
pub mod options;
pub mod settings;

pub use loader::ConfigLoader;
pub use options::ClientConfig;
pub use settings::{primary_api_key, UserSettings};
