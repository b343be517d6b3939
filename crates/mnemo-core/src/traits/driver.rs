// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base driver trait that every language-model backend implements.

use std::sync::Arc;

use crate::traits::chat::ChatCapable;
use crate::traits::embedding::EmbeddingCapable;
use crate::traits::reader::ReaderCapable;
use crate::traits::rerank::RerankCapable;
use crate::traits::vision::VisionCapable;

/// A capability-tagged language-model backend.
///
/// A driver advertises what it can do through the `as_*` accessors. The
/// provider router calls each accessor exactly once at registration and
/// records the result; nothing is probed per request.
pub trait Driver: Send + Sync + 'static {
    /// Registry name of this driver. Stored lowercased by the router.
    fn name(&self) -> &str;

    /// Language tag used to localize prompts (`zh`, `en`, ...).
    fn lang(&self) -> &str;

    fn as_chat(self: Arc<Self>) -> Option<Arc<dyn ChatCapable>> {
        None
    }

    fn as_embedding(self: Arc<Self>) -> Option<Arc<dyn EmbeddingCapable>> {
        None
    }

    fn as_rerank(self: Arc<Self>) -> Option<Arc<dyn RerankCapable>> {
        None
    }

    fn as_vision(self: Arc<Self>) -> Option<Arc<dyn VisionCapable>> {
        None
    }

    fn as_reader(self: Arc<Self>) -> Option<Arc<dyn ReaderCapable>> {
        None
    }
}
