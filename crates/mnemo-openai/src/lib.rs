// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible driver for mnemo.
//!
//! [`OpenAiDriver`] speaks the `/chat/completions`, `/embeddings`, and
//! `/rerank` endpoints that OpenAI and most self-hosted servers expose. A
//! capability is advertised only when its model is configured; reader is
//! never advertised.

pub mod client;
pub mod sse;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mnemo_config::model::DriverConfig;
use mnemo_core::types::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingOutput, RerankDoc, RerankOutput, RerankedDoc,
};
use mnemo_core::{
    ChatCapable, Driver, EmbeddingCapable, MnemoError, RerankCapable, TokenStream, VisionCapable,
};
use tracing::{debug, info, warn};

use crate::client::OpenAiClient;
use crate::types::{
    ApiContent, ApiMessage, ChatCompletionRequest, ChatCompletionResponse, ContentPart,
    EmbeddingRequest, ImageUrl, RerankRequest,
};

/// A driver backed by one OpenAI-compatible endpoint.
///
/// API key resolution order: `api_key` in config, then the
/// `<NAME>_API_KEY` environment variable, then no authentication.
#[derive(Debug)]
pub struct OpenAiDriver {
    name: String,
    lang: String,
    client: OpenAiClient,
    chat_model: Option<String>,
    embedding_model: Option<String>,
    rerank_model: Option<String>,
    vision_model: Option<String>,
}

impl OpenAiDriver {
    pub fn from_config(config: &DriverConfig) -> Result<Self, MnemoError> {
        let api_key = resolve_api_key(&config.name, config.api_key.as_deref());
        if api_key.is_none() {
            warn!(driver = config.name, "no API key configured, sending unauthenticated requests");
        }
        let client = OpenAiClient::new(
            &config.endpoint,
            api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;

        info!(
            driver = config.name,
            endpoint = client.base_url(),
            chat = config.chat_model.as_deref().unwrap_or("-"),
            embedding = config.embedding_model.as_deref().unwrap_or("-"),
            "OpenAI-compatible driver initialized"
        );

        Ok(Self {
            name: config.name.clone(),
            lang: config.lang.clone(),
            client,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            rerank_model: config.rerank_model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    fn to_completion_request(&self, request: ChatRequest, default_model: &str) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system.filter(|s| !s.is_empty()) {
            messages.push(ApiMessage {
                role: "system".into(),
                content: ApiContent::Text(system),
            });
        }
        messages.extend(request.messages.into_iter().map(convert_message));

        ChatCompletionRequest {
            model: request.model.unwrap_or_else(|| default_model.to_string()),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
            stream_options: None,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or_else(|| unsupported("embedding"))?;
        if texts.is_empty() {
            return Ok(EmbeddingOutput {
                model: model.to_string(),
                ..Default::default()
            });
        }

        let response = self
            .client
            .embeddings(&EmbeddingRequest {
                model,
                input: texts,
            })
            .await?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        debug!(driver = self.name, count = data.len(), "embeddings received");

        Ok(EmbeddingOutput {
            vectors: data.into_iter().map(|d| d.embedding).collect(),
            model: non_empty_or(response.model, model),
            usage: response.usage.map(Into::into).unwrap_or_default(),
        })
    }
}

impl Driver for OpenAiDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn lang(&self) -> &str {
        &self.lang
    }

    fn as_chat(self: Arc<Self>) -> Option<Arc<dyn ChatCapable>> {
        self.chat_model.is_some().then_some(self as Arc<dyn ChatCapable>)
    }

    fn as_embedding(self: Arc<Self>) -> Option<Arc<dyn EmbeddingCapable>> {
        self.embedding_model
            .is_some()
            .then_some(self as Arc<dyn EmbeddingCapable>)
    }

    fn as_rerank(self: Arc<Self>) -> Option<Arc<dyn RerankCapable>> {
        self.rerank_model
            .is_some()
            .then_some(self as Arc<dyn RerankCapable>)
    }

    fn as_vision(self: Arc<Self>) -> Option<Arc<dyn VisionCapable>> {
        self.vision_model
            .is_some()
            .then_some(self as Arc<dyn VisionCapable>)
    }
}

#[async_trait]
impl ChatCapable for OpenAiDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, MnemoError> {
        let model = self.chat_model.as_deref().ok_or_else(|| unsupported("chat"))?;
        let req = self.to_completion_request(request, model);
        let response = self.client.chat_completion(&req).await?;
        Ok(convert_response(response, &req.model))
    }

    async fn stream(&self, request: ChatRequest) -> Result<TokenStream, MnemoError> {
        let model = self.chat_model.as_deref().ok_or_else(|| unsupported("chat"))?;
        let req = self.to_completion_request(request, model);
        debug!(driver = self.name, model = req.model, "opening completion stream");
        self.client.stream_chat(&req).await
    }
}

#[async_trait]
impl VisionCapable for OpenAiDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn complete_vision(&self, request: ChatRequest) -> Result<ChatResponse, MnemoError> {
        let model = self
            .vision_model
            .as_deref()
            .ok_or_else(|| unsupported("vision"))?;
        let req = self.to_completion_request(request, model);
        let response = self.client.chat_completion(&req).await?;
        Ok(convert_response(response, &req.model))
    }
}

#[async_trait]
impl EmbeddingCapable for OpenAiDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn embed_query(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError> {
        self.embed(texts).await
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError> {
        self.embed(texts).await
    }
}

#[async_trait]
impl RerankCapable for OpenAiDriver {
    fn driver_name(&self) -> &str {
        &self.name
    }

    async fn rerank(&self, query: &str, docs: &[RerankDoc]) -> Result<RerankOutput, MnemoError> {
        let model = self
            .rerank_model
            .as_deref()
            .ok_or_else(|| unsupported("rerank"))?;

        let response = self
            .client
            .rerank(&RerankRequest {
                model,
                query,
                documents: docs.iter().map(|d| d.content.as_str()).collect(),
                top_n: docs.len(),
            })
            .await
            .map_err(|e| MnemoError::Rerank {
                message: e.to_string(),
            })?;

        let mut results = Vec::with_capacity(response.results.len());
        for result in response.results {
            match docs.get(result.index) {
                Some(doc) => results.push(RerankedDoc {
                    id: doc.id.clone(),
                    score: result.relevance_score,
                }),
                None => warn!(
                    driver = self.name,
                    index = result.index,
                    "rerank result references an unknown document"
                ),
            }
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(RerankOutput {
            results,
            model: response
                .model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| model.to_string()),
            usage: response.usage.map(Into::into).unwrap_or_default(),
        })
    }
}

fn convert_message(message: ChatMessage) -> ApiMessage {
    let content = if message.images.is_empty() {
        ApiContent::Text(message.content)
    } else {
        let mut parts = vec![ContentPart::Text {
            text: message.content,
        }];
        parts.extend(message.images.into_iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url },
        }));
        ApiContent::Parts(parts)
    };
    ApiMessage {
        role: message.role.to_string(),
        content,
    }
}

fn convert_response(response: ChatCompletionResponse, requested_model: &str) -> ChatResponse {
    let (content, reasoning, finish_reason) = match response.choices.into_iter().next() {
        Some(choice) => (
            choice.message.content.unwrap_or_default(),
            choice.message.reasoning_content.filter(|r| !r.is_empty()),
            choice.finish_reason,
        ),
        None => (String::new(), None, None),
    };
    ChatResponse {
        id: response.id,
        content,
        reasoning,
        model: non_empty_or(response.model, requested_model),
        finish_reason,
        usage: response.usage.map(Into::into).unwrap_or_default(),
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn unsupported(capability: &str) -> MnemoError {
    MnemoError::Unsupported {
        capability: capability.to_string(),
    }
}

/// Name of the environment variable holding a driver's API key.
pub fn api_key_env_var(driver_name: &str) -> String {
    let name: String = driver_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{name}_API_KEY")
}

fn resolve_api_key(driver_name: &str, config_key: Option<&str>) -> Option<String> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Some(key.to_string());
    }
    std::env::var(api_key_env_var(driver_name))
        .ok()
        .filter(|k| !k.is_empty())
}
