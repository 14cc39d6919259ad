//! Request Dispatcher
//!
//! Sends one chat request for one model, rotating through the configured keys
//! until one succeeds. Attempts are strictly sequential: each key is tried at
//! most once per call.

use crate::api::ChatRequest;
use crate::client::notifier::{RECOVERY_NOTICE, RETRY_NOTICE};
use crate::client::{HttpClient, Notifier};
use crate::config::{ClientConfig, UserSettings};
use crate::dispatch::attempt::{AttemptPlan, FatalReason};
use crate::error::Result;
use crate::router::{dedupe_keys, KeySelector};
use crate::store::{key_suffix, CredentialStore, KeyValueStore, COOLDOWN};
use reqwest::Response;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound for the advisory backoff reported after a recovered request
const MAX_BACKOFF_MS: u64 = 8000;

/// Key-rotating request dispatcher
pub struct Dispatcher {
    http: HttpClient,
    url: String,
    primary_key: String,
    retry_delay: Duration,
    storage: Arc<dyn KeyValueStore>,
    selector: KeySelector,
    credentials: Arc<CredentialStore>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(
        http: HttpClient,
        config: &ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        selector: KeySelector,
        credentials: Arc<CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            http,
            url: config.completions_url(),
            primary_key: config.api_key.trim().to_string(),
            retry_delay: config.retry_delay(),
            storage,
            selector,
            credentials,
            notifier,
        }
    }

    pub fn selector(&self) -> &KeySelector {
        &self.selector
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Constructor key followed by the settings keys, trimmed and deduplicated
    pub fn configured_keys(&self) -> Vec<String> {
        let settings = UserSettings::load(self.storage.as_ref());
        dedupe_keys(std::iter::once(self.primary_key.clone()).chain(settings.api_keys()))
    }

    /// Usable keys in the order this call will try them
    pub fn plan(&self) -> AttemptPlan {
        let configured = self.configured_keys();
        if configured.is_empty() {
            return AttemptPlan::fatal(FatalReason::NoKeysConfigured);
        }

        let usable: Vec<String> = self
            .selector
            .available(&configured)
            .into_iter()
            .filter(|k| !self.credentials.is_in_cooldown(k))
            .collect();

        match self.selector.rotation(&usable, &self.primary_key) {
            Ok(order) => AttemptPlan::new(order),
            Err(_) => AttemptPlan::fatal(FatalReason::AllKeysCoolingDown),
        }
    }

    /// Send `request` with `model_id`, trying each usable key once
    pub async fn dispatch(&self, request: &ChatRequest, model_id: &str) -> Result<Response> {
        let body = request.wire_body(model_id)?;
        let mut plan = self.plan();

        info!(
            url = %self.url,
            model = model_id,
            candidates = plan.len(),
            "Sending chat request"
        );

        while let Some((attempt, key)) = plan.next_attempt() {
            if attempt > 0 {
                self.notifier.message(
                    &format!("Connecting with backup key {}...", attempt + 1),
                    Some(RETRY_NOTICE),
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.http.post_chat(&self.url, &body, &key).await {
                Ok(response) => {
                    self.credentials.record_outcome(&key, true);
                    self.selector.promote(&key);
                    plan.succeed();

                    if attempt > 0 {
                        self.notifier
                            .success("Connected with backup key", Some(RECOVERY_NOTICE));
                        let backoff = 1000u64
                            .saturating_mul(1 << attempt.min(16))
                            .min(MAX_BACKOFF_MS);
                        debug!(
                            key = %key_suffix(&key),
                            retries = attempt,
                            next_backoff_ms = backoff,
                            "API request succeeded after retries"
                        );
                    }

                    return Ok(response);
                }
                Err(e) => {
                    let kind = e.failure_kind();
                    if kind.penalizes_key() {
                        warn!(key = %key_suffix(&key), error = %e, ?kind, "Key rejected, cooling down");
                        self.credentials.record_outcome(&key, false);
                        self.selector.set_cooldown(&key, COOLDOWN);
                    } else {
                        warn!(key = %key_suffix(&key), error = %e, "Transient error with key");
                    }
                    plan.fail(kind);
                }
            }
        }

        let err = plan.exhaustion_error();
        error!(model = model_id, error = %err, "Chat API failed after all attempts");
        Err(err)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("url", &self.url)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}
