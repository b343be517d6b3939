// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rerank capability.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::{RerankDoc, RerankOutput};

/// A driver that scores documents against a query.
///
/// Results reference input documents by id and may omit documents the
/// reranker considers irrelevant.
#[async_trait]
pub trait RerankCapable: Send + Sync {
    fn driver_name(&self) -> &str;

    async fn rerank(&self, query: &str, docs: &[RerankDoc]) -> Result<RerankOutput, MnemoError>;
}
