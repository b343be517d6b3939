// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mnemo prompt` command implementation.

use mnemo_config::MnemoConfig;
use mnemo_context::{PromptAssembler, PromptKind, PromptVars};

/// Renders `kind` as the pipeline would, with no evidence and placeholder query.
pub fn render_prompt(config: &MnemoConfig, kind: PromptKind, lang: Option<&str>) -> String {
    let lang = lang.unwrap_or(&config.site.default_lang);
    let vars = PromptVars::now_utc()
        .with_query("<query>")
        .with_history("<history>");
    PromptAssembler::new(&config.prompt, &config.site).build(kind, lang, &vars, &[])
}
