// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request builders bound to a resolved driver, and model-output parsing helpers.

use std::sync::Arc;

use mnemo_core::types::{ChatMessage, ChatRequest, ChatResponse};
use mnemo_core::{ChatCapable, MnemoError, TokenStream, VisionCapable};

/// A chat request bound to the driver that will serve it.
pub struct QueryBuilder {
    chat: Arc<dyn ChatCapable>,
    request: ChatRequest,
}

impl QueryBuilder {
    pub fn new(chat: Arc<dyn ChatCapable>) -> Self {
        Self {
            chat,
            request: ChatRequest::default(),
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.request.system = Some(system.into());
        self
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.request.messages.extend(messages);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.request.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.request.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    /// Name of the driver this query is bound to.
    pub fn driver_name(&self) -> &str {
        self.chat.driver_name()
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    pub async fn complete(self) -> Result<ChatResponse, MnemoError> {
        self.chat.complete(self.request).await
    }

    pub async fn stream(self) -> Result<TokenStream, MnemoError> {
        self.chat.stream(self.request).await
    }
}

/// A vision request bound to the driver that will serve it.
pub struct VisionQuery {
    vision: Arc<dyn VisionCapable>,
    request: ChatRequest,
}

impl VisionQuery {
    pub fn new(vision: Arc<dyn VisionCapable>, prompt: &str, image_urls: &[String]) -> Self {
        let mut message = ChatMessage::user(prompt);
        message.images = image_urls.to_vec();
        Self {
            vision,
            request: ChatRequest {
                messages: vec![message],
                ..Default::default()
            },
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.request.system = Some(system.into());
        self
    }

    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    pub async fn complete(self) -> Result<ChatResponse, MnemoError> {
        self.vision.complete_vision(self.request).await
    }
}

/// Strip a surrounding Markdown code fence (```` ```json ... ``` ````) from model output.
///
/// Models often wrap JSON in a fence even when told not to.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
