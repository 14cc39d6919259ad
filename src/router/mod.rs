//! Router Module
//!
//! Handles model routing and API key selection.

pub mod key_selector;
pub mod model;

pub use key_selector::{dedupe_keys, KeySelector};
pub use model::{looks_like_code, ModelRoute};
