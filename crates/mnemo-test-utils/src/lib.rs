// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for mnemo integration tests.
//!
//! Provides a scripted driver and in-memory collaborator stores for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockDriver`] - Driver with scripted chat, stream, embedding, and rerank replies
//! - [`InMemoryVectorStore`], [`InMemoryKnowledgeStore`], [`InMemoryHistory`], [`InMemoryPins`]
//! - [`RecordingSink`] - Outbound push sink capturing every event

pub mod mock_driver;
pub mod stores;

pub use mock_driver::{MockDriver, StreamStep, StreamTracker, MOCK_USAGE};
pub use stores::{
    history_message, knowledge, vector_match, InMemoryHistory, InMemoryKnowledgeStore,
    InMemoryPins, InMemoryVectorStore, RecordingSink,
};
