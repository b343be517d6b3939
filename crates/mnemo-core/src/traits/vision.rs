// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vision capability.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::{ChatRequest, ChatResponse};

/// A driver that accepts images in chat messages.
#[async_trait]
pub trait VisionCapable: Send + Sync {
    fn driver_name(&self) -> &str;

    /// Completes a request whose messages may carry image URLs.
    async fn complete_vision(&self, request: ChatRequest) -> Result<ChatResponse, MnemoError>;
}
