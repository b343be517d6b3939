// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the mnemo knowledge assistant.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level mnemo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemoConfig {
    /// Site identity and process settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Language-model drivers, in registration order.
    #[serde(default)]
    pub drivers: Vec<DriverConfig>,

    /// Capability usage map: capability key -> driver name.
    #[serde(default)]
    pub usage: HashMap<String, String>,

    /// Retrieval tuning.
    #[serde(default)]
    pub rag: RagConfig,

    /// Streaming response tuning.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Prompt header/append overrides.
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Knowledge content decryption key settings.
    #[serde(default)]
    pub vault: VaultConfig,
}

/// Site identity and process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Site title substituted into prompts.
    #[serde(default = "default_site_title")]
    pub title: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prompt language used when a driver does not declare one.
    #[serde(default = "default_lang")]
    pub default_lang: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_site_title(),
            log_level: default_log_level(),
            default_lang: default_lang(),
        }
    }
}

fn default_site_title() -> String {
    "mnemo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

/// Wire protocol spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// OpenAI-compatible HTTP API (OpenAI, Azure-compatible gateways, Qwen, DeepSeek, ...).
    #[default]
    Openai,
}

/// One language-model driver.
///
/// A driver only advertises the capabilities whose model is configured.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    /// Registry name (case-insensitive).
    pub name: String,

    #[serde(default)]
    pub kind: DriverKind,

    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,

    /// API key. `None` reads `<NAME>_API_KEY` from the environment.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Prompt language tag for this driver.
    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default)]
    pub chat_model: Option<String>,

    #[serde(default)]
    pub embedding_model: Option<String>,

    #[serde(default)]
    pub rerank_model: Option<String>,

    #[serde(default)]
    pub vision_model: Option<String>,

    /// HTTP timeout for a single request.
    #[serde(default = "default_driver_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_driver_timeout_secs() -> u64 {
    300
}

/// Retrieval tuning. Defaults reproduce the production constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RagConfig {
    /// Base cosine cutoff.
    #[serde(default = "default_base_threshold")]
    pub base_threshold: f32,

    /// More than this many matches enables the adaptive cutoff.
    #[serde(default = "default_adaptive_min_matches")]
    pub adaptive_min_matches: usize,

    /// Adaptive cutoff = top score minus this margin.
    #[serde(default = "default_adaptive_margin")]
    pub adaptive_margin: f32,

    /// Number of top-ranked matches always kept.
    #[serde(default = "default_high_score_keep")]
    pub high_score_keep: usize,

    /// Matches whose source is at most this many characters survive the cutoff.
    #[serde(default = "default_short_content_chars")]
    pub short_content_chars: usize,

    /// Below-cutoff matches are no longer taken once this many matches
    /// of any score have been accepted.
    #[serde(default = "default_low_score_accept_limit")]
    pub low_score_accept_limit: usize,

    /// Similarity search size.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum prior messages before query enhancement runs.
    #[serde(default = "default_enhance_min_history")]
    pub enhance_min_history: usize,

    /// Session history window loaded per turn.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Long assistant turns are truncated to this many characters in the enhancement transcript.
    #[serde(default = "default_assistant_truncate_chars")]
    pub assistant_truncate_chars: usize,

    #[serde(default = "default_enhance_timeout_ms")]
    pub enhance_timeout_ms: u64,

    #[serde(default = "default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,

    #[serde(default = "default_rerank_timeout_ms")]
    pub rerank_timeout_ms: u64,
}

impl RagConfig {
    pub fn enhance_timeout(&self) -> Duration {
        Duration::from_millis(self.enhance_timeout_ms)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_millis(self.rerank_timeout_ms)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            base_threshold: default_base_threshold(),
            adaptive_min_matches: default_adaptive_min_matches(),
            adaptive_margin: default_adaptive_margin(),
            high_score_keep: default_high_score_keep(),
            short_content_chars: default_short_content_chars(),
            low_score_accept_limit: default_low_score_accept_limit(),
            top_k: default_top_k(),
            enhance_min_history: default_enhance_min_history(),
            history_window: default_history_window(),
            assistant_truncate_chars: default_assistant_truncate_chars(),
            enhance_timeout_ms: default_enhance_timeout_ms(),
            embed_timeout_ms: default_embed_timeout_ms(),
            rerank_timeout_ms: default_rerank_timeout_ms(),
        }
    }
}

fn default_base_threshold() -> f32 {
    0.5
}

fn default_adaptive_min_matches() -> usize {
    10
}

fn default_adaptive_margin() -> f32 {
    0.1
}

fn default_high_score_keep() -> usize {
    3
}

fn default_short_content_chars() -> usize {
    200
}

fn default_low_score_accept_limit() -> usize {
    15
}

fn default_top_k() -> usize {
    100
}

fn default_enhance_min_history() -> usize {
    2
}

fn default_history_window() -> usize {
    6
}

fn default_assistant_truncate_chars() -> usize {
    40
}

fn default_enhance_timeout_ms() -> u64 {
    8_000
}

fn default_embed_timeout_ms() -> u64 {
    10_000
}

fn default_rerank_timeout_ms() -> u64 {
    8_000
}

/// Streaming response tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Interval between scheduled buffer flushes.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Characters buffered after `$` before the mask suspicion is abandoned.
    #[serde(default = "default_mask_lookahead")]
    pub mask_lookahead: usize,

    /// Longest confirmed placeholder span before it is given up as literal text.
    #[serde(default = "default_mask_max_span")]
    pub mask_max_span: usize,

    /// Capacity of the bounded delivery channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Overall generation deadline.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
}

impl StreamConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            mask_lookahead: default_mask_lookahead(),
            mask_max_span: default_mask_max_span(),
            channel_capacity: default_channel_capacity(),
            stream_timeout_secs: default_stream_timeout_secs(),
        }
    }
}

fn default_flush_interval_ms() -> u64 {
    500
}

fn default_mask_lookahead() -> usize {
    10
}

fn default_mask_max_span() -> usize {
    128
}

fn default_channel_capacity() -> usize {
    64
}

fn default_stream_timeout_secs() -> u64 {
    300
}

/// Prompt overrides keyed by language tag.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    #[serde(default)]
    pub overrides: HashMap<String, PromptOverride>,
}

/// Replacement for the built-in header and/or append section of one language.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptOverride {
    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    pub append: Option<String>,
}

/// Content decryption key settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Hex-encoded 32-byte key. Takes precedence over `key_env`.
    #[serde(default)]
    pub key: Option<String>,

    /// Environment variable holding the hex-encoded key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            key: None,
            key_env: default_key_env(),
        }
    }
}

fn default_key_env() -> String {
    "MNEMO_CONTENT_KEY".to_string()
}
