// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reader capability: fetch a URL and return it as markdown.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::ReaderOutput;

#[async_trait]
pub trait ReaderCapable: Send + Sync {
    fn driver_name(&self) -> &str;

    async fn read(&self, url: &str) -> Result<ReaderOutput, MnemoError>;
}
