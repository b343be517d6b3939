// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-based query enhancement.
//!
//! Asks the enhancement driver for alternative phrasings of the user's
//! question so retrieval sees more of the vocabulary the notes might use.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use mnemo_config::model::RagConfig;
use mnemo_context::{PromptKind, PromptVars};
use mnemo_core::types::{ChatMessage, ChatRole, HistoryMessage};
use mnemo_core::MnemoError;
use mnemo_router::{strip_code_fence, ProviderRouter};
use tracing::debug;

use crate::types::EnhancedQuery;

/// Rewrites queries with the driver resolved for `enhance_query`.
pub struct QueryEnhancer {
    router: Arc<ProviderRouter>,
    min_history: usize,
    assistant_truncate_chars: usize,
}

impl QueryEnhancer {
    pub fn new(router: Arc<ProviderRouter>, config: &RagConfig) -> Self {
        Self {
            router,
            min_history: config.enhance_min_history,
            assistant_truncate_chars: config.assistant_truncate_chars,
        }
    }

    /// Enhance `query` given the prior messages of its session, oldest first.
    ///
    /// With fewer than the configured minimum of prior messages the query is
    /// returned unchanged and no model is called. Output that is not a JSON
    /// array of strings is an [`MnemoError::EnhanceParse`]; callers are
    /// expected to fall back to the original query.
    pub async fn enhance(
        &self,
        query: &str,
        history: &[HistoryMessage],
        lang: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<EnhancedQuery, MnemoError> {
        if history.len() < self.min_history {
            debug!(
                history = history.len(),
                min = self.min_history,
                "skipping query enhancement"
            );
            return Ok(EnhancedQuery::passthrough(query));
        }

        let transcript = condense_history(history, self.assistant_truncate_chars);
        let vars = PromptVars::new(now)
            .with_query(query)
            .with_history(transcript);
        let system = self
            .router
            .prompts()
            .build(PromptKind::EnhanceQuery, lang, &vars, &[]);

        let response = self
            .router
            .new_enhance()?
            .system(system)
            .message(ChatMessage::user(query))
            .complete()
            .await?;

        let alternatives = parse_alternatives(&response.content, query)?;
        debug!(
            model = response.model,
            alternatives = alternatives.len(),
            "query enhanced"
        );

        Ok(EnhancedQuery {
            original: query.to_string(),
            alternatives,
            model: Some(response.model),
            usage: response.usage,
        })
    }
}

/// Renders history as `role: content` lines. System turns are dropped and
/// assistant turns longer than `truncate_chars` are cut.
pub fn condense_history(history: &[HistoryMessage], truncate_chars: usize) -> String {
    let mut lines = Vec::with_capacity(history.len());
    for message in history {
        let content = message.content.trim();
        if content.is_empty() {
            continue;
        }
        match message.role {
            ChatRole::System => {}
            ChatRole::User => lines.push(format!("user: {content}")),
            ChatRole::Assistant => {
                lines.push(format!("assistant: {}", truncate_chars_at(content, truncate_chars)));
            }
        }
    }
    lines.join("\n")
}

fn truncate_chars_at(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Parses a JSON array of strings, dropping blanks, repeats, and the original query.
fn parse_alternatives(raw: &str, original: &str) -> Result<Vec<String>, MnemoError> {
    let parsed: Vec<String> =
        serde_json::from_str(strip_code_fence(raw)).map_err(|source| MnemoError::EnhanceParse {
            raw: raw.to_string(),
            source,
        })?;

    let mut out: Vec<String> = Vec::with_capacity(parsed.len());
    for alt in parsed {
        let alt = alt.trim();
        if alt.is_empty() || alt == original.trim() || out.iter().any(|o| o == alt) {
            continue;
        }
        out.push(alt.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: ChatRole, content: &str) -> HistoryMessage {
        HistoryMessage {
            id: String::new(),
            session_id: "s".into(),
            role,
            content: content.into(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn condense_truncates_long_assistant_turns() {
        let history = vec![
            msg(ChatRole::System, "ignored"),
            msg(ChatRole::User, "where did I travel last spring?"),
            msg(ChatRole::Assistant, &"x".repeat(100)),
            msg(ChatRole::User, "   "),
        ];
        let transcript = condense_history(&history, 40);
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "user: where did I travel last spring?");
        assert_eq!(lines[1], format!("assistant: {}...", "x".repeat(40)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars_at("你好世界", 2), "你好...");
        assert_eq!(truncate_chars_at("short", 40), "short");
    }

    #[test]
    fn alternatives_are_cleaned() {
        let alts = parse_alternatives(
            "```json\n[\"trip\", \"Kyoto trip\", \" \", \"Kyoto trip\", \"spring vacation\"]\n```",
            "trip",
        )
        .unwrap();
        assert_eq!(alts, vec!["Kyoto trip", "spring vacation"]);
    }

    #[test]
    fn non_array_output_is_a_parse_error() {
        let err = parse_alternatives("Sure! Here are some queries", "q").unwrap_err();
        assert!(matches!(err, MnemoError::EnhanceParse { ref raw, .. } if raw.starts_with("Sure")));
        assert!(err.is_degradable());
    }
}
