// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible endpoints.
//!
//! Provides [`OpenAiClient`] which handles authentication, JSON and SSE
//! responses, and a single retry of transient errors.

use std::time::Duration;

use mnemo_core::{MnemoError, TokenStream};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::sse;
use crate::types::{
    ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
    EmbeddingResponse, RerankRequest, RerankResponse, StreamOptions,
};

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// HTTP client for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl OpenAiClient {
    /// Creates a client for `endpoint` (e.g. `https://api.openai.com/v1`).
    ///
    /// Without an API key no `Authorization` header is sent, which suits
    /// local servers.
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, MnemoError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                MnemoError::Config(format!("invalid API key header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MnemoError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            max_retries: 1,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, MnemoError> {
        let mut req = request.clone();
        req.stream = false;
        req.stream_options = None;
        self.post_json("/chat/completions", &req).await
    }

    /// Opens a streaming completion. Usage is requested as a trailing chunk.
    pub async fn stream_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<TokenStream, MnemoError> {
        let mut req = request.clone();
        req.stream = true;
        req.stream_options = Some(StreamOptions {
            include_usage: true,
        });
        let response = self.post("/chat/completions", &req).await?;
        Ok(sse::parse_sse_stream(response))
    }

    pub async fn embeddings(
        &self,
        request: &EmbeddingRequest<'_>,
    ) -> Result<EmbeddingResponse, MnemoError> {
        self.post_json("/embeddings", request).await
    }

    pub async fn rerank(&self, request: &RerankRequest<'_>) -> Result<RerankResponse, MnemoError> {
        self.post_json("/rerank", request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, MnemoError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        let text = response.text().await.map_err(|e| MnemoError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&text).map_err(|e| MnemoError::Provider {
            message: format!("failed to parse API response from {path}: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Sends a POST and returns the successful response.
    ///
    /// On transient errors (429, 500, 502, 503), retries once after a 1-second delay.
    async fn post<B>(&self, path: &str, body: &B) -> Result<reqwest::Response, MnemoError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying request after transient error");
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| MnemoError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, path, "response received");

            if status.is_success() {
                return Ok(response);
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(MnemoError::provider(format!(
                    "API returned {status}: {body}"
                )));
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("API error ({status}) {}", api_err.error),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(MnemoError::provider(message));
        }

        Err(last_error
            .unwrap_or_else(|| MnemoError::provider("request failed after retries")))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
