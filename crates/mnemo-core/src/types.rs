// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across capability traits and the mnemo pipeline.

use std::collections::HashMap;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Usage-map keys recognised by the provider router.
pub mod usage_keys {
    pub const QUERY: &str = "query";
    pub const SUMMARY: &str = "summary";
    pub const CHUNK: &str = "chunk";
    pub const ENHANCE_QUERY: &str = "enhance_query";
    pub const EMBEDDING_QUERY: &str = "embedding.query";
    pub const EMBEDDING_DOCUMENT: &str = "embedding.document";
    pub const RERANK: &str = "rerank";
    pub const VISION: &str = "vision";
    pub const READER: &str = "reader";

    /// Every key, in report order.
    pub const ALL: [&str; 9] = [
        QUERY,
        SUMMARY,
        CHUNK,
        ENHANCE_QUERY,
        EMBEDDING_QUERY,
        EMBEDDING_DOCUMENT,
        RERANK,
        VISION,
        READER,
    ];
}

/// A named function a driver may support.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Embedding,
    Rerank,
    Vision,
    Reader,
    Enhance,
}

impl Capability {
    /// All capabilities in registration-table order.
    pub const ALL: [Capability; 6] = [
        Capability::Chat,
        Capability::Embedding,
        Capability::Rerank,
        Capability::Vision,
        Capability::Reader,
        Capability::Enhance,
    ];

    /// Maps a usage-map key to the capability it selects a driver for.
    ///
    /// `embedding.*` keys select embedding drivers; unknown keys are chat keys.
    pub fn for_usage_key(key: &str) -> Capability {
        let key = key.trim().to_ascii_lowercase();
        if key == "embedding" || key.starts_with("embedding.") {
            return Capability::Embedding;
        }
        match key.as_str() {
            usage_keys::RERANK => Capability::Rerank,
            usage_keys::VISION => Capability::Vision,
            usage_keys::READER => Capability::Reader,
            usage_keys::ENHANCE_QUERY | "enhance" => Capability::Enhance,
            _ => Capability::Chat,
        }
    }
}

/// Speaker of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message handed to a chat driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Image URLs attached to this message (vision queries only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }
}

/// A chat request. `model: None` lets the driver use its configured model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Token counters reported by a driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

/// A non-streaming chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub content: String,
    pub reasoning: Option<String>,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
}

/// One increment from a streaming chat completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamToken {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
    /// In-band error reported by the provider (distinct from a transport error).
    pub error: Option<String>,
}

impl StreamToken {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn finish(reason: impl Into<String>) -> Self {
        Self {
            finish_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn usage(model: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            usage: Some(usage),
            model: Some(model.into()),
            ..Default::default()
        }
    }
}

/// Vectors returned by an embedding driver, one per input text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingOutput {
    pub vectors: Vec<Vec<f32>>,
    pub model: String,
    pub usage: TokenUsage,
}

/// A document handed to the reranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankDoc {
    pub id: String,
    pub content: String,
}

/// A reranker verdict for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedDoc {
    pub id: String,
    pub score: f32,
}

/// Ordered reranker output (most relevant first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RerankOutput {
    pub results: Vec<RerankedDoc>,
    pub model: String,
    pub usage: TokenUsage,
}

/// A web page converted to markdown by a reader driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderOutput {
    pub title: String,
    pub markdown: String,
    pub usage: TokenUsage,
}

/// Token consumption attributed to one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Step name, e.g. `enhance_query`, `embedding`, `rerank`, `chat`.
    pub subject: String,
    pub model: String,
    pub usage: TokenUsage,
}

impl UsageRecord {
    pub fn new(subject: impl Into<String>, model: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            subject: subject.into(),
            model: model.into(),
            usage,
        }
    }
}

/// One nearest-neighbour hit from the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub knowledge_id: String,
    /// Cosine similarity in 0..1.
    pub score: f32,
    pub space_id: String,
    pub user_id: String,
    /// Character length of the source content the vector was built from.
    pub original_length: usize,
}

/// Scope of a similarity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorFilter {
    pub space_id: String,
    pub user_id: Option<String>,
    /// Restrict to these resource kinds; empty means all.
    pub resources: Vec<String>,
}

/// Caller-supplied resource restriction for a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceFilter {
    pub resources: Vec<String>,
}

/// Storage format of knowledge content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Markdown,
    PlainText,
    /// Structured editor blocks (JSON) that need normalizing before use.
    Blocks,
}

/// A knowledge row as stored: content possibly encrypted and not yet normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeRecord {
    pub id: String,
    pub space_id: String,
    pub user_id: String,
    pub resource: String,
    pub title: String,
    pub content_type: ContentType,
    pub content: Vec<u8>,
    pub encrypted: bool,
    /// Desensitization placeholders used in `content`, mapped to their real values.
    pub masks: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Selection for a knowledge-store listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeFilter {
    pub space_id: String,
    pub ids: Vec<String>,
}

/// Hydrated knowledge content bound to its source metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceDoc {
    pub id: String,
    pub resource: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Retrieval or rerank score; `None` for pinned documents.
    pub score: Option<f32>,
    pub pinned: bool,
    pub masks: HashMap<String, String>,
}

/// A stored chat message from session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Payload of one user-visible increment.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamIncrement {
    /// Flushed text (content and think markers).
    Text(String),
    /// The model finished the choice.
    Finish { reason: String },
    /// Token accounting for the generation.
    Usage { model: String, usage: TokenUsage },
    /// Terminal: the stream failed. Earlier text stays valid.
    Error(String),
    /// Terminal: the caller cancelled the generation.
    Cancelled,
    /// Terminal: the stream ended normally.
    Done,
}

impl StreamIncrement {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamIncrement::Error(_) | StreamIncrement::Cancelled | StreamIncrement::Done
        )
    }
}

/// One ordered increment delivered to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseChoice {
    pub message_id: String,
    pub sequence: u64,
    pub increment: StreamIncrement,
}

/// Progress status of a tool tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Running,
    Success,
    Failed,
}

/// A side-channel progress notice (e.g. "searching knowledge base").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTip {
    pub message_id: String,
    pub tool: String,
    pub status: ToolStatus,
    pub detail: String,
}

/// Everything the outbound push layer may deliver for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Choice(ResponseChoice),
    ToolTip(ToolTip),
}
