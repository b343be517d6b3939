// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and result types for query enhancement and retrieval.

use mnemo_core::types::{
    usage_keys, EvidenceDoc, ResourceFilter, TokenUsage, UsageRecord, VectorMatch,
};

/// The original query plus model-generated alternative phrasings.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedQuery {
    pub original: String,
    pub alternatives: Vec<String>,
    /// Model that produced the alternatives; `None` when enhancement was skipped.
    pub model: Option<String>,
    pub usage: TokenUsage,
}

impl EnhancedQuery {
    /// An unenhanced query.
    pub fn passthrough(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            alternatives: Vec::new(),
            model: None,
            usage: TokenUsage::default(),
        }
    }

    /// Whether an LLM call produced this result.
    pub fn is_enhanced(&self) -> bool {
        self.model.is_some()
    }

    /// Text handed to retrieval: the original followed by every alternative, space-joined.
    pub fn result_query(&self) -> String {
        let mut out = self.original.clone();
        for alt in &self.alternatives {
            out.push(' ');
            out.push_str(alt);
        }
        out
    }

    pub fn usage_record(&self) -> Option<UsageRecord> {
        self.model
            .as_ref()
            .map(|m| UsageRecord::new(usage_keys::ENHANCE_QUERY, m.clone(), self.usage))
    }
}

/// Threshold-filtered, deduplicated vector matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    /// Surviving matches in descending retrieval confidence. No duplicate ids.
    pub matches: Vec<VectorMatch>,
    /// The top-ranked matches, preserved through reranking.
    pub high_score: Vec<VectorMatch>,
    /// Cutoff that was applied.
    pub cutoff: f32,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.knowledge_id.clone()).collect()
    }
}

/// One retrieval call.
#[derive(Debug, Clone, Default)]
pub struct RetrievalRequest {
    pub space_id: String,
    /// Restricts matches to one owner; `None` searches the whole space.
    pub user_id: Option<String>,
    /// Text to embed (usually [`EnhancedQuery::result_query`]).
    pub query: String,
    /// Text scored by the reranker; falls back to `query`.
    pub rerank_query: Option<String>,
    pub resource_filter: ResourceFilter,
    /// Session whose pinned knowledge is appended to the evidence.
    pub session_id: Option<String>,
}

impl RetrievalRequest {
    pub fn new(space_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn rerank_query(mut self, query: impl Into<String>) -> Self {
        self.rerank_query = Some(query.into());
        self
    }

    pub fn resources(mut self, filter: ResourceFilter) -> Self {
        self.resource_filter = filter;
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// How reranking went for one retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankStatus {
    /// Evidence is in reranker order.
    Applied,
    /// No rerank-capable driver, or nothing worth reordering.
    Skipped,
    /// The reranker failed or timed out; evidence is in retrieval order.
    Degraded,
}

/// Everything one retrieval produced.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub candidates: CandidateSet,
    /// Final ordered evidence; pinned documents come last.
    pub docs: Vec<EvidenceDoc>,
    pub usage: Vec<UsageRecord>,
    pub rerank: RerankStatus,
    /// High-score ids that could not be hydrated and were skipped.
    pub missing_high_score: usize,
    pub pinned: usize,
}

impl RetrievalOutcome {
    pub fn doc_ids(&self) -> Vec<&str> {
        self.docs.iter().map(|d| d.id.as_str()).collect()
    }
}
