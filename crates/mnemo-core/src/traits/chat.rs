// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat capability: single-shot completion and incremental streaming.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::MnemoError;
use crate::types::{ChatRequest, ChatResponse, StreamToken};

/// An open token stream. Dropping it releases the underlying connection.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<StreamToken, MnemoError>> + Send>>;

/// A driver that can hold a conversation.
#[async_trait]
pub trait ChatCapable: Send + Sync {
    /// Name of the driver serving this capability.
    fn driver_name(&self) -> &str;

    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, MnemoError>;

    /// Sends a completion request and returns a stream of increments.
    async fn stream(&self, request: ChatRequest) -> Result<TokenStream, MnemoError>;
}
