// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered prompt assembly: Header + Body + Append with token substitution.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use mnemo_config::model::{PromptConfig, PromptOverride, SiteConfig};
use mnemo_core::types::EvidenceDoc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::passages::render_passages;
use crate::template::{
    builtin_append, builtin_body, builtin_header, symbol_notice, tokens, Lang, PromptKind,
};
use crate::time::time_range_table;

/// Space-level prompt customization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpacePrompt {
    /// Prepended to the body of every kind.
    #[serde(default)]
    pub base_prompt: Option<String>,
    /// Replaces the leading instruction paragraph of Chat and Rag bodies.
    #[serde(default)]
    pub chat_prompt: Option<String>,
}

/// Per-request substitution values.
#[derive(Debug, Clone)]
pub struct PromptVars {
    pub now: DateTime<FixedOffset>,
    pub query: String,
    pub history: String,
}

impl PromptVars {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now,
            query: String::new(),
            history: String::new(),
        }
    }

    /// Vars stamped with the current UTC time.
    pub fn now_utc() -> Self {
        Self::new(Utc::now().fixed_offset())
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.history = history.into();
        self
    }
}

/// Builds the final instruction text the model receives.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    site_title: String,
    overrides: HashMap<String, PromptOverride>,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(&PromptConfig::default(), &SiteConfig::default())
    }
}

impl PromptAssembler {
    pub fn new(prompt: &PromptConfig, site: &SiteConfig) -> Self {
        let overrides = prompt
            .overrides
            .iter()
            .map(|(lang, o)| (lang.trim().to_ascii_lowercase(), o.clone()))
            .collect();
        Self {
            site_title: site.title.clone(),
            overrides,
        }
    }

    /// Build a prompt without space customization.
    pub fn build(
        &self,
        kind: PromptKind,
        lang: &str,
        vars: &PromptVars,
        evidence: &[EvidenceDoc],
    ) -> String {
        self.build_for_space(kind, lang, vars, evidence, None)
    }

    /// Build a prompt, applying the space's base and chat prompts when given.
    pub fn build_for_space(
        &self,
        kind: PromptKind,
        lang: &str,
        vars: &PromptVars,
        evidence: &[EvidenceDoc],
        space: Option<&SpacePrompt>,
    ) -> String {
        let parsed = Lang::parse(lang);
        let custom = self.override_for(lang, parsed);

        let header = custom
            .and_then(|o| o.header.as_deref())
            .unwrap_or_else(|| builtin_header(parsed));
        let body = customize_body(kind, builtin_body(kind, parsed), space);

        let mut template = String::with_capacity(header.len() + body.len() + 512);
        template.push_str(header.trim_end());
        template.push_str("\n\n");
        template.push_str(body.trim_end());
        if kind.is_conversational() {
            let append = custom
                .and_then(|o| o.append.as_deref())
                .unwrap_or_else(|| builtin_append(parsed));
            template.push_str("\n\n");
            template.push_str(append.trim_end());
        }

        let passage = if template.contains(tokens::RELEVANT_PASSAGE) {
            render_passages(evidence)
        } else {
            String::new()
        };
        let time_range = if template.contains(tokens::TIME_RANGE) {
            time_range_table(vars.now, parsed)
        } else {
            String::new()
        };

        debug!(
            kind = %kind,
            lang = parsed.tag(),
            evidence = evidence.len(),
            overridden = custom.is_some(),
            "assembling prompt"
        );

        substitute(
            &template,
            &[
                (tokens::TIME_RANGE, time_range.as_str()),
                (tokens::SITE_TITLE, self.site_title.as_str()),
                (tokens::SYMBOL, symbol_notice(parsed)),
                (tokens::RELEVANT_PASSAGE, passage.as_str()),
                (tokens::LANG, parsed.display_name()),
                (tokens::QUERY, vars.query.as_str()),
                (tokens::HISTORY, vars.history.as_str()),
            ],
        )
    }

    fn override_for(&self, lang: &str, parsed: Lang) -> Option<&PromptOverride> {
        self.overrides
            .get(&lang.trim().to_ascii_lowercase())
            .or_else(|| self.overrides.get(parsed.tag()))
    }
}

fn customize_body(kind: PromptKind, body: &str, space: Option<&SpacePrompt>) -> String {
    let Some(space) = space else {
        return body.to_string();
    };

    let mut out = String::new();
    if let Some(base) = space.base_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        out.push_str(base.trim_end());
        out.push_str("\n\n");
    }

    match space.chat_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(chat) if kind.accepts_chat_prompt() => {
            out.push_str(chat.trim_end());
            if let Some((_, rest)) = body.split_once("\n\n") {
                out.push_str("\n\n");
                out.push_str(rest);
            }
        }
        _ => out.push_str(body),
    }
    out
}

/// Single left-to-right pass replacing known tokens.
///
/// Substituted values are never rescanned, so evidence text containing `${...}`
/// stays literal. Unknown tokens are left as-is.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find("${") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match vars.iter().find(|(token, _)| tail.starts_with(token)) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &tail[token.len()..];
            }
            None => {
                out.push_str("${");
                rest = &tail[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vars() -> PromptVars {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 4, 12, 0, 0)
            .unwrap();
        PromptVars::new(now).with_query("what's new?")
    }

    fn doc(id: &str, content: &str) -> EvidenceDoc {
        EvidenceDoc {
            id: id.into(),
            resource: "knowledge".into(),
            title: String::new(),
            content: content.into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            score: None,
            pinned: false,
            masks: HashMap::new(),
        }
    }

    #[test]
    fn substitute_is_single_pass() {
        let out = substitute(
            "a ${x} b ${y} ${unknown}",
            &[("${x}", "${y}"), ("${y}", "Y")],
        );
        assert_eq!(out, "a ${y} b Y ${unknown}");
    }

    #[test]
    fn rag_prompt_with_no_evidence_says_null() {
        let prompt = PromptAssembler::default().build(PromptKind::Rag, "en", &vars(), &[]);
        assert!(prompt.contains("Relevant passages:\nnull"));
        assert!(prompt.contains("mnemo"));
        assert!(prompt.contains("$hidden[...]"));
        assert!(!prompt.contains("${"));
    }

    #[test]
    fn evidence_tokens_are_not_expanded() {
        let prompt = PromptAssembler::default().build(
            PromptKind::Rag,
            "en",
            &vars(),
            &[doc("k1", "literal ${site_title} here")],
        );
        assert!(prompt.contains("literal ${site_title} here"));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = PromptConfig::default();
        config.overrides.insert(
            "EN".into(),
            PromptOverride {
                header: Some("Custom header for ${site_title}.".into()),
                append: None,
            },
        );
        let site = SiteConfig {
            title: "Brain".into(),
            ..Default::default()
        };
        let prompt = PromptAssembler::new(&config, &site).build(PromptKind::Chat, "en", &vars(), &[]);
        assert!(prompt.starts_with("Custom header for Brain."));
        // append falls back to the built-in
        assert!(prompt.contains("## Output rules"));

        let zh = PromptAssembler::new(&config, &site).build(PromptKind::Chat, "zh", &vars(), &[]);
        assert!(zh.contains("个人知识库助理"));
    }

    #[test]
    fn structured_kinds_omit_append() {
        let prompt = PromptAssembler::default().build(PromptKind::Summary, "en", &vars(), &[]);
        assert!(prompt.contains("\"summary\""));
        assert!(!prompt.contains("## Output rules"));
    }

    #[test]
    fn enhance_prompt_embeds_query_and_history() {
        let v = vars().with_history("user: hi\nassistant: hello");
        let prompt = PromptAssembler::default().build(PromptKind::EnhanceQuery, "en", &v, &[]);
        assert!(prompt.contains("Question: what's new?"));
        assert!(prompt.contains("assistant: hello"));
        assert!(prompt.contains("| yesterday | 2026-03-03 |"));
    }

    #[test]
    fn space_prompts_customize_body() {
        let space = SpacePrompt {
            base_prompt: Some("This space holds cooking notes.".into()),
            chat_prompt: Some("Answer like a chef.".into()),
        };
        let prompt = PromptAssembler::default().build_for_space(
            PromptKind::Rag,
            "en",
            &vars(),
            &[],
            Some(&space),
        );
        assert!(prompt.contains("This space holds cooking notes.\n\nAnswer like a chef.\n\nTime reference:"));
        assert!(!prompt.contains("Answer the user's question using the passages"));

        // chat_prompt does not touch structured kinds
        let summary = PromptAssembler::default().build_for_space(
            PromptKind::Summary,
            "en",
            &vars(),
            &[],
            Some(&space),
        );
        assert!(!summary.contains("Answer like a chef."));
        assert!(summary.contains("This space holds cooking notes."));
    }

    proptest::proptest! {
        #[test]
        fn text_without_tokens_is_unchanged(s in "[^$]*") {
            proptest::prop_assert_eq!(substitute(&s, &[("${x}", "y")]), s);
        }

        #[test]
        fn values_are_inserted_verbatim(v in ".*") {
            let out = substitute("[${query}]", &[(tokens::QUERY, v.as_str())]);
            proptest::prop_assert_eq!(out, format!("[{v}]"));
        }
    }
}
