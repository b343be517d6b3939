// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the mnemo knowledge assistant.
//!
//! This crate provides the error taxonomy, the shared domain types, and the
//! trait definitions every other crate builds on: capability traits that
//! language-model drivers implement, and the narrow collaborator traits the
//! RAG pipeline reads persistence through.

pub mod error;
pub mod traits;
pub mod types;

pub use error::MnemoError;
pub use types::{Capability, StreamIncrement, StreamToken, TokenUsage};

pub use traits::{
    ChatCapable, ChatHistoryStore, ContentDecryptor, Driver, EmbeddingCapable, EventSink,
    KnowledgeStore, MarkdownNormalizer, ReaderCapable, RerankCapable, SessionPinStore,
    TokenStream, VectorStore, VisionCapable,
};
