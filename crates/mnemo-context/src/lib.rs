// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered prompt assembly for the mnemo knowledge assistant.
//!
//! A prompt is built from three parts:
//! - **Header**: identity and policy, overridable per language from configuration
//! - **Body**: scenario-specific instructions selected by [`PromptKind`]
//! - **Append**: output format and desensitization rules for conversational kinds
//!
//! Tokens such as `${time_range}` and `${relevant_passage}` are substituted in a
//! single pass; evidence docs are rendered into divider-separated passages.

pub mod assembler;
pub mod passages;
pub mod template;
pub mod time;

pub use assembler::{substitute, PromptAssembler, PromptVars, SpacePrompt};
pub use passages::render_passages;
pub use template::{Lang, PromptKind};
pub use time::time_range_table;
