//! Vivica - Chat Client Core
//!
//! Sends chat requests to an OpenRouter-compatible completions API with
//! key rotation, per-key cooldowns, a single model fallback and incremental
//! decoding of streamed responses.

use futures::Stream;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub mod api;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod router;
pub mod store;

pub use api::{ChatMessage, ChatRequest, CompletionResponse, Role, RoutingProfile, StreamEvent};
pub use error::{Result, VivicaError};

use client::{HttpClient, LogNotifier, Notifier};
use config::{primary_api_key, ClientConfig, ConfigLoader};
use dispatch::Dispatcher;
use router::{KeySelector, ModelRoute};
use store::{Clock, CredentialStore, KeyState, KeyTelemetry, KeyValueStore, SledStore, SystemClock};

/// Install a `tracing` subscriber on stderr.
///
/// The filter comes from `VIVICA_LOG`, then `RUST_LOG`, then `info`. Calling
/// this more than once is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("VIVICA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// The main chat client
pub struct ChatService {
    config: ClientConfig,
    dispatcher: Dispatcher,
    notifier: Arc<dyn Notifier>,
}

impl ChatService {
    /// Create a service from the discovered configuration and the default
    /// on-disk store
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ChatServiceBuilder {
        ChatServiceBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a chat request and return the raw successful response.
    ///
    /// The routed primary model is tried on every usable key. If that fails
    /// and the request's profile names a fallback model, the fallback is tried
    /// once the same way and its outcome is final.
    pub async fn send_message(&self, request: &ChatRequest) -> Result<Response> {
        let route = ModelRoute::resolve(request);
        debug!(route = %route, is_code = route.is_code, "Resolved models");

        let err = match self.dispatcher.dispatch(request, &route.primary).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        match route.fallback.as_deref() {
            Some(fallback) if err.allows_fallback() => {
                self.notifier.message(
                    &format!("Primary model unavailable. Falling back to {}", fallback),
                    None,
                );
                info!(
                    primary = %route.primary,
                    fallback = fallback,
                    error = %err,
                    "Falling back to secondary model"
                );
                self.dispatcher.dispatch(request, fallback).await
            }
            _ => Err(err),
        }
    }

    /// Send a non-streaming request and decode the completion body
    pub async fn send_message_json<T: DeserializeOwned>(&self, request: &ChatRequest) -> Result<T> {
        let request = ChatRequest {
            stream: Some(false),
            ..request.clone()
        };

        let response = self.send_message(&request).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Decode a streamed response into [`StreamEvent`]s.
    ///
    /// Events carry the request's explicit code hint. A response that
    /// declares an empty body yields `NoResponseBody` after the start event.
    pub fn stream_response(
        response: Response,
        request: Option<&ChatRequest>,
    ) -> impl Stream<Item = Result<StreamEvent>> {
        let is_code_request = request.and_then(|r| r.is_code_request);
        let body = (response.content_length() != Some(0)).then(|| response.bytes_stream());
        api::decode_stream(body, is_code_request)
    }

    /// Snapshot of per-key telemetry
    pub fn key_stats(&self) -> KeyTelemetry {
        self.dispatcher.credentials().stats()
    }

    /// Cooldowns and active key, shared with any service built on the same state
    pub fn key_state(&self) -> &Arc<KeyState> {
        self.dispatcher.selector().state()
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Builder for [`ChatService`]
#[derive(Default)]
pub struct ChatServiceBuilder {
    config: Option<ClientConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    retry_delay: Option<Duration>,
    storage: Option<Arc<dyn KeyValueStore>>,
    key_state: Option<Arc<KeyState>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ChatServiceBuilder {
    /// Use `config` instead of running the config loader. Its `api_key`
    /// ranks after keys saved in storage.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Primary key used as given, ahead of any stored key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Share cooldowns and the active key with other services
    pub fn key_state(mut self, key_state: Arc<KeyState>) -> Self {
        self.key_state = Some(key_state);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<ChatService> {
        let mut config = match self.config {
            Some(config) => config,
            None => ConfigLoader::new()?.into_config()?,
        };
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        }

        let storage = match self.storage {
            Some(storage) => storage,
            None => {
                let dir = config
                    .storage_dir
                    .clone()
                    .unwrap_or_else(SledStore::default_dir);
                Arc::new(SledStore::open(dir)?) as Arc<dyn KeyValueStore>
            }
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        // An explicit key is used as given; a loaded one ranks after stored keys.
        config.api_key = match self.api_key.filter(|k| !k.trim().is_empty()) {
            Some(api_key) => api_key,
            None => primary_api_key(storage.as_ref(), &config.api_key),
        };

        let key_state = self
            .key_state
            .unwrap_or_else(|| Arc::new(KeyState::new(storage.clone(), clock.clone())));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotifier) as Arc<dyn Notifier>);
        let credentials = Arc::new(CredentialStore::load(storage.clone(), clock));

        let dispatcher = Dispatcher::new(
            HttpClient::new(&config)?,
            &config,
            storage,
            KeySelector::new(key_state),
            credentials,
            notifier.clone(),
        );

        info!(base_url = %config.base_url, "Chat service ready");

        Ok(ChatService {
            config,
            dispatcher,
            notifier,
        })
    }
}
