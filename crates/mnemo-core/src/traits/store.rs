// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator interfaces for persistence owned outside the pipeline.
//!
//! Users, spaces, sessions, and knowledge rows live in services this crate
//! does not define; the pipeline only reads through these narrow traits.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::{HistoryMessage, KnowledgeFilter, KnowledgeRecord, VectorFilter, VectorMatch};

/// Externally provided nearest-neighbour search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns up to `top_k` matches ordered by descending score.
    async fn query(
        &self,
        filter: &VectorFilter,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, MnemoError>;
}

/// Knowledge rows with content still encrypted or in its raw format.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn list_knowledges(
        &self,
        filter: &KnowledgeFilter,
    ) -> Result<Vec<KnowledgeRecord>, MnemoError>;
}

/// Chat session history.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// Returns at most `window` most recent messages of a session, oldest first.
    async fn list_session_messages_up_to(
        &self,
        session_id: &str,
        window: usize,
    ) -> Result<Vec<HistoryMessage>, MnemoError>;
}

/// Knowledge documents a user pinned to a chat session.
#[async_trait]
pub trait SessionPinStore: Send + Sync {
    /// Returns pinned knowledge ids, or an empty list when nothing is pinned.
    async fn get_by_session(&self, session_id: &str) -> Result<Vec<String>, MnemoError>;
}
