// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content post-processing applied while hydrating knowledge.

use crate::error::MnemoError;
use crate::types::ContentType;

/// Decrypts stored knowledge content.
pub trait ContentDecryptor: Send + Sync {
    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, MnemoError>;
}

/// Converts stored content into markdown suitable for prompts.
pub trait MarkdownNormalizer: Send + Sync {
    fn normalize(&self, content_type: ContentType, raw: &str) -> Result<String, MnemoError>;
}
