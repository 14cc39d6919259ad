//! Client Module
//!
//! HTTP client and the user-notification collaborator.

pub mod http;
pub mod notifier;

pub use http::HttpClient;
pub use notifier::{LogNotifier, MemoryNotifier, Notice, NoticeKind, Notifier};
