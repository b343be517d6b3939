// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding capability for vector generation.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::EmbeddingOutput;

/// A driver that turns text into vectors.
///
/// Query and document embeddings are separate calls because some models
/// use asymmetric instructions for the two sides.
#[async_trait]
pub trait EmbeddingCapable: Send + Sync {
    fn driver_name(&self) -> &str;

    /// Embeds search queries.
    async fn embed_query(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError>;

    /// Embeds stored documents.
    async fn embed_documents(&self, texts: &[String]) -> Result<EmbeddingOutput, MnemoError>;
}
