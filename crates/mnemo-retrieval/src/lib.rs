// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query enhancement and knowledge retrieval for the mnemo pipeline.
//!
//! ## Architecture
//!
//! - **QueryEnhancer**: LLM rewrite of the query into alternative phrasings
//! - **filter_candidates**: adaptive cosine cutoff plus dedup by knowledge id
//! - **KnowledgeRetriever**: embed, search, hydrate, rerank, restore high-score ids, pin
//! - **BasicNormalizer**: default markdown normalization of hydrated content

pub mod enhancer;
pub mod normalize;
pub mod retriever;
pub mod threshold;
pub mod types;

pub use enhancer::{condense_history, QueryEnhancer};
pub use normalize::BasicNormalizer;
pub use retriever::KnowledgeRetriever;
pub use threshold::{filter_candidates, ThresholdPolicy};
pub use types::{CandidateSet, EnhancedQuery, RerankStatus, RetrievalOutcome, RetrievalRequest};
