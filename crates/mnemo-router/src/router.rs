// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability routing across registered drivers.
//!
//! Resolution order for a usage key: explicit `[usage]` entry > first-registered
//! driver supporting the key's capability > typed `Unsupported` error.

use std::collections::HashMap;
use std::sync::Arc;

use mnemo_context::{PromptAssembler, PromptKind, PromptVars};
use mnemo_core::types::{
    usage_keys, Capability, ChatMessage, EmbeddingOutput, ReaderOutput, RerankDoc, RerankOutput,
    TokenUsage,
};
use mnemo_core::{
    ChatCapable, Driver, EmbeddingCapable, MnemoError, ReaderCapable, RerankCapable,
    VisionCapable,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::query::{strip_code_fence, QueryBuilder, VisionQuery};
use crate::registry::{DriverEntry, DriverRegistry};

/// Result of [`ProviderRouter::summarize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub summary: String,
    pub title: String,
    pub tags: Vec<String>,
    pub model: String,
    pub usage: TokenUsage,
}

/// Result of [`ProviderRouter::chunk`].
#[derive(Debug, Clone, PartialEq)]
pub struct Chunks {
    pub chunks: Vec<String>,
    pub model: String,
    pub usage: TokenUsage,
}

#[derive(Deserialize)]
struct SummaryJson {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Builder collecting drivers and usage entries before validation.
#[derive(Default)]
pub struct ProviderRouterBuilder {
    drivers: Vec<Arc<dyn Driver>>,
    usage: Vec<(String, String)>,
    prompts: Option<PromptAssembler>,
    default_lang: Option<String>,
}

impl ProviderRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver. Registration order decides per-capability defaults.
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Route `key` (e.g. `embedding.query`) to the driver named `driver`.
    pub fn usage(mut self, key: impl Into<String>, driver: impl Into<String>) -> Self {
        self.usage.push((key.into(), driver.into()));
        self
    }

    pub fn usage_map<'a>(mut self, usage: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.usage
            .extend(usage.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn prompts(mut self, prompts: PromptAssembler) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Prompt language used when the chat driver declares none.
    pub fn default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = Some(lang.into());
        self
    }

    /// Register every driver, validate usage entries, and check mandatory capabilities.
    ///
    /// Fails if a usage entry names an unknown driver or one lacking the key's
    /// capability, or if no driver serves chat or embedding.
    pub fn build(self) -> Result<ProviderRouter, MnemoError> {
        let mut registry = DriverRegistry::new();
        for driver in self.drivers {
            registry.register(driver)?;
        }

        let mut usage = HashMap::new();
        for (key, name) in self.usage {
            let key = key.trim().to_ascii_lowercase();
            let capability = Capability::for_usage_key(&key);
            let entry = registry.get(&name).ok_or_else(|| MnemoError::DriverNotFound {
                name: name.clone(),
            })?;
            if !entry.supports(capability) {
                return Err(MnemoError::Config(format!(
                    "usage `{key}` routes to driver `{}`, which does not provide {capability}",
                    entry.name
                )));
            }
            usage.insert(key, entry.name.clone());
        }

        for required in [Capability::Chat, Capability::Embedding] {
            if registry.first_supporting(required).is_none() {
                return Err(MnemoError::Config(format!(
                    "no registered driver provides {required}; at least one is required"
                )));
            }
        }

        for entry in registry.entries() {
            info!(
                driver = entry.name.as_str(),
                capabilities = ?entry.capabilities(),
                "registered driver"
            );
        }

        Ok(ProviderRouter {
            registry,
            usage,
            prompts: self.prompts.unwrap_or_default(),
            default_lang: self.default_lang.unwrap_or_else(|| "en".to_string()),
        })
    }
}

/// Immutable after construction; safe to share across requests behind an `Arc`.
pub struct ProviderRouter {
    registry: DriverRegistry,
    usage: HashMap<String, String>,
    prompts: PromptAssembler,
    default_lang: String,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("registry", &self.registry)
            .field("usage", &self.usage)
            .finish()
    }
}

impl ProviderRouter {
    pub fn builder() -> ProviderRouterBuilder {
        ProviderRouterBuilder::new()
    }

    /// The driver entry serving `key`, or `Unsupported`.
    pub fn entry_for(&self, key: &str) -> Result<&DriverEntry, MnemoError> {
        let key = key.trim().to_ascii_lowercase();
        let capability = Capability::for_usage_key(&key);

        if let Some(entry) = self.usage.get(&key).and_then(|name| self.registry.get(name)) {
            return Ok(entry);
        }
        self.registry
            .first_supporting(capability)
            .ok_or_else(|| MnemoError::Unsupported {
                capability: key.clone(),
            })
    }

    pub fn resolve_chat(&self, key: &str) -> Result<Arc<dyn ChatCapable>, MnemoError> {
        let entry = self.entry_for(key)?;
        entry.chat.clone().ok_or_else(|| unsupported(key))
    }

    pub fn resolve_embedding(&self, key: &str) -> Result<Arc<dyn EmbeddingCapable>, MnemoError> {
        let entry = self.entry_for(key)?;
        entry.embedding.clone().ok_or_else(|| unsupported(key))
    }

    pub fn resolve_rerank(&self) -> Result<Arc<dyn RerankCapable>, MnemoError> {
        let entry = self.entry_for(usage_keys::RERANK)?;
        entry.rerank.clone().ok_or_else(|| unsupported(usage_keys::RERANK))
    }

    pub fn resolve_vision(&self) -> Result<Arc<dyn VisionCapable>, MnemoError> {
        let entry = self.entry_for(usage_keys::VISION)?;
        entry.vision.clone().ok_or_else(|| unsupported(usage_keys::VISION))
    }

    pub fn resolve_reader(&self) -> Result<Arc<dyn ReaderCapable>, MnemoError> {
        let entry = self.entry_for(usage_keys::READER)?;
        entry.reader.clone().ok_or_else(|| unsupported(usage_keys::READER))
    }

    /// Chat handle used for query enhancement.
    pub fn resolve_enhance(&self) -> Result<Arc<dyn ChatCapable>, MnemoError> {
        self.resolve_chat(usage_keys::ENHANCE_QUERY)
    }

    /// Prompt language of the driver answering user queries.
    pub fn lang(&self) -> &str {
        match self.entry_for(usage_keys::QUERY) {
            Ok(entry) if !entry.lang.is_empty() => &entry.lang,
            _ => &self.default_lang,
        }
    }

    pub fn prompts(&self) -> &PromptAssembler {
        &self.prompts
    }

    /// Resolved driver name per known usage key, for diagnostics.
    pub fn capability_table(&self) -> Vec<(&'static str, Option<String>)> {
        usage_keys::ALL
            .into_iter()
            .map(|key| (key, self.entry_for(key).ok().map(|e| e.name.clone())))
            .collect()
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Start a chat query on the driver serving user queries.
    pub fn new_query(
        &self,
        system: Option<String>,
        messages: Vec<ChatMessage>,
    ) -> Result<QueryBuilder, MnemoError> {
        let mut builder = QueryBuilder::new(self.resolve_chat(usage_keys::QUERY)?).messages(messages);
        if let Some(system) = system {
            builder = builder.system(system);
        }
        Ok(builder)
    }

    /// Start an empty query on the enhancement driver.
    pub fn new_enhance(&self) -> Result<QueryBuilder, MnemoError> {
        Ok(QueryBuilder::new(self.resolve_enhance()?))
    }

    pub fn new_vision_query(
        &self,
        prompt: &str,
        image_urls: &[String],
    ) -> Result<VisionQuery, MnemoError> {
        Ok(VisionQuery::new(self.resolve_vision()?, prompt, image_urls))
    }

    /// Describe an image for later text search.
    pub async fn describe_image(&self, url: &str, lang: &str) -> Result<String, MnemoError> {
        let instruction = self
            .prompts
            .build(PromptKind::DescribeImage, lang, &PromptVars::now_utc(), &[]);
        let response = self
            .new_vision_query(&instruction, &[url.to_string()])?
            .complete()
            .await?;
        Ok(response.content)
    }

    /// Summarize `text`. Output that is not the expected JSON becomes the summary verbatim.
    pub async fn summarize(&self, text: &str, lang: &str) -> Result<Summary, MnemoError> {
        let system = self
            .prompts
            .build(PromptKind::Summary, lang, &PromptVars::now_utc(), &[]);
        let response = QueryBuilder::new(self.resolve_chat(usage_keys::SUMMARY)?)
            .system(system)
            .message(ChatMessage::user(text))
            .complete()
            .await?;

        let parsed = serde_json::from_str::<SummaryJson>(strip_code_fence(&response.content));
        let (summary, title, tags) = match parsed {
            Ok(json) => (json.summary, json.title, json.tags),
            Err(e) => {
                debug!(error = %e, "summary output is not JSON, using raw text");
                (response.content.trim().to_string(), String::new(), Vec::new())
            }
        };

        Ok(Summary {
            summary,
            title,
            tags,
            model: response.model,
            usage: response.usage,
        })
    }

    /// Split `text` into semantically coherent chunks.
    pub async fn chunk(&self, text: &str, lang: &str) -> Result<Chunks, MnemoError> {
        let system = self
            .prompts
            .build(PromptKind::Chunk, lang, &PromptVars::now_utc(), &[]);
        let response = QueryBuilder::new(self.resolve_chat(usage_keys::CHUNK)?)
            .system(system)
            .message(ChatMessage::user(text))
            .complete()
            .await?;

        let chunks: Vec<String> = serde_json::from_str(strip_code_fence(&response.content))
            .map_err(|e| MnemoError::Provider {
                message: "chunk output is not a JSON array of strings".to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(Chunks {
            chunks,
            model: response.model,
            usage: response.usage,
        })
    }

    pub async fn embedding_for_query(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError> {
        self.resolve_embedding(usage_keys::EMBEDDING_QUERY)?
            .embed_query(texts)
            .await
    }

    /// Embed document chunks, each prefixed with the document title.
    pub async fn embedding_for_document(
        &self,
        title: &str,
        texts: &[String],
    ) -> Result<EmbeddingOutput, MnemoError> {
        let prefixed: Vec<String> = if title.trim().is_empty() {
            texts.to_vec()
        } else {
            texts.iter().map(|t| format!("{}\n{t}", title.trim())).collect()
        };
        self.resolve_embedding(usage_keys::EMBEDDING_DOCUMENT)?
            .embed_documents(&prefixed)
            .await
    }

    pub async fn rerank(&self, query: &str, docs: &[RerankDoc]) -> Result<RerankOutput, MnemoError> {
        self.resolve_rerank()?.rerank(query, docs).await
    }

    pub async fn read(&self, url: &str) -> Result<ReaderOutput, MnemoError> {
        let reader = self.resolve_reader().inspect_err(|_| {
            warn!(url, "reader requested but no driver provides it");
        })?;
        reader.read(url).await
    }
}

fn unsupported(key: &str) -> MnemoError {
    MnemoError::Unsupported {
        capability: key.to_string(),
    }
}
