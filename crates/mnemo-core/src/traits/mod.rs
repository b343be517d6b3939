// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability and collaborator trait definitions.
//!
//! Capability traits are object-safe and use `#[async_trait]` for dynamic
//! dispatch; the router holds them as `Arc<dyn ...>`.

pub mod chat;
pub mod content;
pub mod driver;
pub mod embedding;
pub mod reader;
pub mod rerank;
pub mod sink;
pub mod store;
pub mod vision;

pub use chat::{ChatCapable, TokenStream};
pub use content::{ContentDecryptor, MarkdownNormalizer};
pub use driver::Driver;
pub use embedding::EmbeddingCapable;
pub use reader::ReaderCapable;
pub use rerank::RerankCapable;
pub use sink::EventSink;
pub use store::{ChatHistoryStore, KnowledgeStore, SessionPinStore, VectorStore};
pub use vision::VisionCapable;
