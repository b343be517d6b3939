// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat turn coordination for mnemo.
//!
//! [`RagPipeline::run_turn`] prepares a turn (history, query enhancement,
//! retrieval, prompt) and hands the chat stream to a background processor
//! that emits ordered [`ResponseChoice`](mnemo_core::types::ResponseChoice)
//! increments:
//! - reasoning is wrapped in think markers
//! - text is flushed on an interval, except while a `$hidden[...]`
//!   placeholder may be forming
//! - placeholders are replaced with their real values before delivery
//! - every stream ends with exactly one terminal increment

pub mod mask;
pub mod pipeline;
pub mod stream;
pub mod writer;

pub use mask::{MaskMap, MaskScanner, MaskState, MASK_PREFIX};
pub use pipeline::{RagPipeline, TurnOutcome, TurnRequest};
pub use stream::{spawn_processor, ProcessorConfig, ResponseStream};
pub use writer::{BufferedWriter, Detached, THINK_CLOSE, THINK_OPEN};
