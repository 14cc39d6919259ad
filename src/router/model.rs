//! Model Routing
//!
//! Picks the primary model for a request (code-specialized when the request
//! looks like code) and the single fallback tried after the primary exhausts
//! every key.

use crate::api::{ChatMessage, ChatRequest};

/// Substrings that mark the last message as a code request
pub const CODE_KEYWORDS: [&str; 4] = ["code", "function", "```", "programming"];

/// Keyword heuristic over the last message
pub fn looks_like_code(messages: &[ChatMessage]) -> bool {
    messages
        .last()
        .map(|m| m.content.to_lowercase())
        .is_some_and(|content| CODE_KEYWORDS.iter().any(|kw| content.contains(kw)))
}

/// Resolved models for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoute {
    /// Model tried first
    pub primary: String,

    /// Model tried once if the primary fails on every key
    pub fallback: Option<String>,

    /// Whether the request was routed as code
    pub is_code: bool,
}

impl ModelRoute {
    /// Resolve the models for `request`
    pub fn resolve(request: &ChatRequest) -> Self {
        let is_code = request
            .is_code_request
            .unwrap_or_else(|| looks_like_code(&request.messages));

        let primary = match &request.profile {
            Some(profile) if is_code && !profile.code_model.is_empty() => {
                profile.code_model.clone()
            }
            _ => request.model.clone(),
        };

        let fallback = request
            .profile
            .as_ref()
            .and_then(|p| p.fallback_model.clone())
            .filter(|f| !f.is_empty() && *f != primary);

        Self {
            primary,
            fallback,
            is_code,
        }
    }
}

impl std::fmt::Display for ModelRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fallback {
            Some(fallback) => write!(f, "{} (fallback {})", self.primary, fallback),
            None => write!(f, "{}", self.primary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RoutingProfile;

    fn profile(code_model: &str, fallback: Option<&str>) -> RoutingProfile {
        RoutingProfile {
            model: "persona/chat".to_string(),
            code_model: code_model.to_string(),
            fallback_model: fallback.map(str::to_string),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    fn request(text: &str) -> ChatRequest {
        ChatRequest::new(
            "persona/chat",
            vec![ChatMessage::system("be nice"), ChatMessage::user(text)],
        )
    }

    #[test]
    fn test_code_fence_routes_to_code_model() {
        let req = ChatRequest::new(
            "something/else",
            vec![ChatMessage::user("fix this:\n```rust\nfn main() {}\n```")],
        )
        .with_profile(profile("X", None));

        let route = ModelRoute::resolve(&req);
        assert_eq!(route.primary, "X");
        assert!(route.is_code);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        for text in ["Write a FUNCTION", "I love Programming", "CODE review"] {
            assert!(looks_like_code(&[ChatMessage::user(text)]), "{}", text);
        }
        assert!(!looks_like_code(&[ChatMessage::user("hello there")]));
        assert!(!looks_like_code(&[]));
    }

    #[test]
    fn test_only_last_message_counts() {
        let messages = vec![
            ChatMessage::user("write some code"),
            ChatMessage::assistant("sure"),
            ChatMessage::user("thanks!"),
        ];
        assert!(!looks_like_code(&messages));
    }

    #[test]
    fn test_explicit_hint_overrides_heuristic() {
        let req = request("show me the code")
            .with_code_hint(false)
            .with_profile(profile("coder", None));
        assert_eq!(ModelRoute::resolve(&req).primary, "persona/chat");

        let req = request("hello")
            .with_code_hint(true)
            .with_profile(profile("coder", None));
        assert_eq!(ModelRoute::resolve(&req).primary, "coder");
    }

    #[test]
    fn test_empty_code_model_keeps_request_model() {
        let req = request("code please").with_profile(profile("", None));
        let route = ModelRoute::resolve(&req);
        assert!(route.is_code);
        assert_eq!(route.primary, "persona/chat");
    }

    #[test]
    fn test_fallback_must_differ_from_primary() {
        let req = request("hi").with_profile(profile("coder", Some("persona/chat")));
        assert_eq!(ModelRoute::resolve(&req).fallback, None);

        let req = request("code").with_profile(profile("coder", Some("persona/chat")));
        let route = ModelRoute::resolve(&req);
        assert_eq!(route.fallback.as_deref(), Some("persona/chat"));
        assert_eq!(format!("{}", route), "coder (fallback persona/chat)");

        let req = request("hi").with_profile(profile("coder", Some("")));
        assert_eq!(ModelRoute::resolve(&req).fallback, None);
    }

    #[test]
    fn test_no_profile() {
        let route = ModelRoute::resolve(&request("```"));
        assert_eq!(route.primary, "persona/chat");
        assert_eq!(route.fallback, None);
        assert!(route.is_code);
        assert_eq!(format!("{}", route), "persona/chat");
    }
}
