// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the mnemo knowledge assistant.

use thiserror::Error;

/// The primary error type used across all mnemo capability traits and pipeline stages.
#[derive(Debug, Error)]
pub enum MnemoError {
    /// Configuration errors (invalid TOML, unresolvable drivers, bad usage entries).
    /// The process must not start with one of these.
    #[error("configuration error: {0}")]
    Config(String),

    /// A capability was requested that no registered driver can serve.
    #[error("unsupported feature: no driver provides `{capability}`")]
    Unsupported { capability: String },

    /// A usage entry or lookup named a driver that is not registered.
    #[error("driver not found: {name}")]
    DriverNotFound { name: String },

    /// Language-model driver errors (API failure, malformed response, transport).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The embedding call failed or produced no vectors.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The vector store query failed.
    #[error("vector store error: {source}")]
    VectorStore {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Knowledge, history, or pin store errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Knowledge content could not be decrypted.
    #[error("decrypt error: {0}")]
    Decrypt(String),

    /// The query enhancer returned output that is not a JSON array of strings.
    #[error("failed to parse enhanced queries: {source}")]
    EnhanceParse {
        raw: String,
        source: serde_json::Error,
    },

    /// The rerank call failed.
    #[error("rerank error: {message}")]
    Rerank { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The request was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        MnemoError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// True for the typed "no driver can do this" error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, MnemoError::Unsupported { .. })
    }

    /// True for failures the pipeline recovers from with a reduced-quality fallback.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            MnemoError::EnhanceParse { .. } | MnemoError::Rerank { .. } | MnemoError::Timeout { .. }
        )
    }
}
