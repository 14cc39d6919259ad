//! Vivica Error Types
//!
//! Error handling for the chat request layer. Per-attempt errors (`Http`,
//! `Request`) are classified inside the dispatch loop; the user-facing kinds
//! are what callers see once every key has been tried.

use thiserror::Error;

/// How a single failed attempt affects the key that was used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 401 or an "unauthorized" message
    Authentication,

    /// HTTP 429 or a "rate limit" message
    RateLimit,

    /// Anything else; the key is not penalized
    Transient,
}

impl FailureKind {
    /// Whether this failure should put the key into cooldown
    pub fn penalizes_key(self) -> bool {
        matches!(self, FailureKind::Authentication | FailureKind::RateLimit)
    }

    /// Classify a failure from its rendered message
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("401") || msg.contains("unauthorized") {
            FailureKind::Authentication
        } else if msg.contains("rate limit") || msg.contains("429") {
            FailureKind::RateLimit
        } else {
            FailureKind::Transient
        }
    }
}

/// Main error type for Vivica operations
#[derive(Debug, Error)]
pub enum VivicaError {
    /// Configuration errors (invalid JSON, unreadable file, bad header value)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No API key is configured at all
    #[error("No valid API keys available. Please check your settings.")]
    NoKeysConfigured,

    /// Keys exist but every one of them is cooling down
    #[error("All API keys are temporarily disabled after recent failures.")]
    AllKeysCoolingDown,

    /// Every key was tried and the last failure was an authentication error
    #[error("Invalid API key(s). Please check your settings.")]
    AuthenticationFailed,

    /// Every key was tried and the last failure was a rate limit
    #[error("Rate limits exceeded on all keys. Please upgrade your plan or try again later.")]
    RateLimited,

    /// Every key was tried and the last failure was something else
    #[error("All API key attempts failed. Please check your connection and keys.")]
    TransientNetworkError,

    /// Non-2xx response from the completions endpoint
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport-level failure (connect, timeout, body read)
    #[error("Request failed: {0}")]
    Request(String),

    /// A completion body could not be decoded
    #[error("Response error: {0}")]
    Response(String),

    /// The response has no readable body to stream from
    #[error("No response body")]
    NoResponseBody,

    /// A single stream line could not be parsed; recovered by the decoder
    #[error("Malformed stream chunk: {0}")]
    MalformedStreamChunk(String),

    /// Persistent state could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),
}

impl VivicaError {
    /// Classify a per-attempt failure
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            VivicaError::Http { status: 401, .. } => FailureKind::Authentication,
            VivicaError::Http { status: 429, .. } => FailureKind::RateLimit,
            other => FailureKind::classify(&other.to_string()),
        }
    }

    /// Whether a fallback model could succeed where this failed. Missing or
    /// benched keys fail the same way for every model.
    pub fn allows_fallback(&self) -> bool {
        !matches!(
            self,
            VivicaError::NoKeysConfigured | VivicaError::AllKeysCoolingDown
        )
    }

    /// The synthesized error reported once all keys are exhausted
    pub fn exhausted(last_failure: Option<FailureKind>) -> Self {
        match last_failure {
            Some(FailureKind::Authentication) => VivicaError::AuthenticationFailed,
            Some(FailureKind::RateLimit) => VivicaError::RateLimited,
            _ => VivicaError::TransientNetworkError,
        }
    }
}

impl From<reqwest::Error> for VivicaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VivicaError::Request(format!("Request timeout: {}", err))
        } else if err.is_connect() {
            VivicaError::Request(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            VivicaError::Response(format!("Failed to decode response: {}", err))
        } else {
            VivicaError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VivicaError {
    fn from(err: serde_json::Error) -> Self {
        VivicaError::Response(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for VivicaError {
    fn from(err: std::io::Error) -> Self {
        VivicaError::Storage(format!("IO error: {}", err))
    }
}

impl From<sled::Error> for VivicaError {
    fn from(err: sled::Error) -> Self {
        VivicaError::Storage(format!("Database error: {}", err))
    }
}

/// Result type alias for Vivica operations
pub type Result<T> = std::result::Result<T, VivicaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_status() {
        let unauthorized = VivicaError::Http {
            status: 401,
            body: "{}".to_string(),
        };
        assert_eq!(unauthorized.failure_kind(), FailureKind::Authentication);

        let limited = VivicaError::Http {
            status: 429,
            body: String::new(),
        };
        assert_eq!(limited.failure_kind(), FailureKind::RateLimit);

        let server = VivicaError::Http {
            status: 500,
            body: "internal error".to_string(),
        };
        assert_eq!(server.failure_kind(), FailureKind::Transient);
    }

    #[test]
    fn test_classify_by_message() {
        let err = VivicaError::Http {
            status: 400,
            body: "Rate limit exceeded for this key".to_string(),
        };
        assert_eq!(err.failure_kind(), FailureKind::RateLimit);

        let err = VivicaError::Http {
            status: 403,
            body: "Unauthorized".to_string(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Authentication);

        let err = VivicaError::Request("Connection failed: refused".to_string());
        assert_eq!(err.failure_kind(), FailureKind::Transient);
        assert!(!err.failure_kind().penalizes_key());
    }

    #[test]
    fn test_exhausted_message_follows_last_failure() {
        assert!(matches!(
            VivicaError::exhausted(Some(FailureKind::Authentication)),
            VivicaError::AuthenticationFailed
        ));
        assert!(matches!(
            VivicaError::exhausted(Some(FailureKind::RateLimit)),
            VivicaError::RateLimited
        ));
        assert!(matches!(
            VivicaError::exhausted(None),
            VivicaError::TransientNetworkError
        ));
    }

    #[test]
    fn test_http_display() {
        let err = VivicaError::Http {
            status: 401,
            body: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 401: bad key");
    }
}
