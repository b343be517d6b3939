// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound push of turn events to a transport (WebSocket or equivalent).

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::types::TurnEvent;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: TurnEvent) -> Result<(), MnemoError>;
}
