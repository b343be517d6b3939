// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evidence rendering for the `${relevant_passage}` block.

use mnemo_core::types::EvidenceDoc;

use crate::template::{EMPTY_PASSAGE, PASSAGE_DIVIDER};

/// Render evidence docs as divider-separated passages.
///
/// An empty slice renders as the literal `null` so the model can tell
/// "nothing found" apart from a broken template.
pub fn render_passages(docs: &[EvidenceDoc]) -> String {
    if docs.is_empty() {
        return EMPTY_PASSAGE.to_string();
    }

    let mut out = String::new();
    for doc in docs {
        out.push_str(PASSAGE_DIVIDER);
        out.push('\n');
        out.push_str(&format!(
            "event time: {}\nid: {}\nresource: {}\n",
            doc.created_at.format("%Y-%m-%d %H:%M"),
            doc.id,
            doc.resource
        ));
        if !doc.title.is_empty() {
            out.push_str(&format!("title: {}\n", doc.title));
        }
        out.push_str("content:\n");
        out.push_str(doc.content.trim_end());
        out.push('\n');
    }
    out.push_str(PASSAGE_DIVIDER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn doc(id: &str, content: &str) -> EvidenceDoc {
        EvidenceDoc {
            id: id.to_string(),
            resource: "knowledge".to_string(),
            title: format!("note {id}"),
            content: content.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 2, 14, 8, 0, 0).unwrap(),
            score: Some(0.8),
            pinned: false,
            masks: HashMap::new(),
        }
    }

    #[test]
    fn empty_evidence_is_null() {
        assert_eq!(render_passages(&[]), "null");
    }

    #[test]
    fn passages_carry_metadata_and_dividers() {
        let out = render_passages(&[doc("k1", "first body\n"), doc("k2", "second body")]);
        assert_eq!(out.matches(PASSAGE_DIVIDER).count(), 3);
        assert!(out.contains("event time: 2026-02-14 08:00"));
        assert!(out.contains("id: k1\nresource: knowledge\ntitle: note k1\ncontent:\nfirst body\n"));
        assert!(out.find("k1").unwrap() < out.find("k2").unwrap());
    }
}
