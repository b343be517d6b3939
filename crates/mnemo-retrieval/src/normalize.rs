// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default markdown normalization for hydrated knowledge.

use mnemo_core::types::ContentType;
use mnemo_core::{MarkdownNormalizer, MnemoError};
use serde_json::Value;

/// Passes markdown and plain text through; flattens editor blocks to paragraphs.
///
/// Block content is a JSON array of nodes. Every `text` string found while
/// walking the tree is collected, and top-level nodes become paragraphs.
/// Block content that is not JSON is passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicNormalizer;

impl MarkdownNormalizer for BasicNormalizer {
    fn normalize(&self, content_type: ContentType, raw: &str) -> Result<String, MnemoError> {
        match content_type {
            ContentType::Markdown | ContentType::PlainText => Ok(raw.to_string()),
            ContentType::Blocks => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(blocks)) => Ok(blocks
                    .iter()
                    .map(|b| {
                        let mut text = String::new();
                        collect_text(b, &mut text);
                        text
                    })
                    .filter(|p| !p.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n")),
                Ok(other) => {
                    let mut text = String::new();
                    collect_text(&other, &mut text);
                    Ok(text)
                }
                Err(_) => Ok(raw.to_string()),
            },
        }
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            for (key, child) in map {
                if key != "text" {
                    collect_text(child, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        _ => {}
    }
}
