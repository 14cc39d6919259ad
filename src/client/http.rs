//! HTTP Client
//!
//! Issues one completions request with one key. Retrying across keys is the
//! dispatcher's job, so this client never retries on its own.

use crate::config::ClientConfig;
use crate::error::{Result, VivicaError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;

const REFERER_HEADER: HeaderName = HeaderName::from_static("http-referer");
const TITLE_HEADER: HeaderName = HeaderName::from_static("x-title");

/// HTTP client for the completions endpoint
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,

    /// Client-identifying headers sent with every request
    headers: HeaderMap,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // No overall timeout: streamed completions can run for minutes.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| VivicaError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(REFERER_HEADER, header_value("referer", &config.referer)?);
        headers.insert(TITLE_HEADER, header_value("title", &config.title)?);

        Ok(Self { client, headers })
    }

    /// POST `body` to `url` with `api_key`. Non-2xx responses become
    /// [`VivicaError::Http`] carrying the status and body text.
    pub async fn post_chat(
        &self,
        url: &str,
        body: &serde_json::Value,
        api_key: &str,
    ) -> Result<Response> {
        let mut headers = self.headers.clone();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| VivicaError::Config(format!("Invalid API key format: {}", e)))?,
        );

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(VivicaError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| VivicaError::Config(format!("Invalid {} header value: {}", name, e)))
}
