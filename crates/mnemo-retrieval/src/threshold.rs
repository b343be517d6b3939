// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adaptive score threshold and deduplication over raw vector matches.

use std::collections::HashSet;

use mnemo_config::model::RagConfig;
use mnemo_core::types::VectorMatch;

use crate::types::CandidateSet;

/// Tuning knobs for [`filter_candidates`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub base: f32,
    pub adaptive_min_matches: usize,
    pub adaptive_margin: f32,
    pub high_score_keep: usize,
    pub short_content_chars: usize,
    pub low_score_accept_limit: usize,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

impl From<&RagConfig> for ThresholdPolicy {
    fn from(config: &RagConfig) -> Self {
        Self {
            base: config.base_threshold,
            adaptive_min_matches: config.adaptive_min_matches,
            adaptive_margin: config.adaptive_margin,
            high_score_keep: config.high_score_keep,
            short_content_chars: config.short_content_chars,
            low_score_accept_limit: config.low_score_accept_limit,
        }
    }
}

impl ThresholdPolicy {
    /// Cutoff for matches sorted by descending score.
    pub fn cutoff(&self, matches: &[VectorMatch]) -> f32 {
        match matches.first() {
            Some(top) if matches.len() > self.adaptive_min_matches && top.score < self.base => {
                top.score - self.adaptive_margin
            }
            _ => self.base,
        }
    }
}

/// Applies the cutoff, then deduplicates by knowledge id (first occurrence wins).
///
/// A match below the cutoff survives only when it ranks within
/// `high_score_keep` or its source is short, and only while fewer than
/// `low_score_accept_limit` matches have been accepted in total.
pub fn filter_candidates(mut matches: Vec<VectorMatch>, policy: &ThresholdPolicy) -> CandidateSet {
    // Stable: equal scores keep store order.
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    let cutoff = policy.cutoff(&matches);

    let mut accepted = Vec::with_capacity(matches.len());
    for (rank, m) in matches.into_iter().enumerate() {
        if m.score >= cutoff {
            accepted.push(m);
            continue;
        }
        if accepted.len() >= policy.low_score_accept_limit {
            continue;
        }
        if rank < policy.high_score_keep || m.original_length <= policy.short_content_chars {
            accepted.push(m);
        }
    }

    let mut seen = HashSet::with_capacity(accepted.len());
    accepted.retain(|m| seen.insert(m.knowledge_id.clone()));

    let high_score = accepted
        .iter()
        .take(policy.high_score_keep)
        .cloned()
        .collect();

    CandidateSet {
        matches: accepted,
        high_score,
        cutoff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(id: &str, score: f32, len: usize) -> VectorMatch {
        VectorMatch {
            knowledge_id: id.to_string(),
            score,
            space_id: "s".into(),
            user_id: "u".into(),
            original_length: len,
        }
    }

    #[test]
    fn confident_top_keeps_base_cutoff() {
        let matches: Vec<_> = (0..20)
            .map(|i| m(&format!("k{i}"), 0.9 - i as f32 * 0.04, 1000))
            .collect();
        let set = filter_candidates(matches, &ThresholdPolicy::default());
        assert_eq!(set.cutoff, 0.5);
        assert!(set.matches.iter().skip(3).all(|c| c.score >= 0.5));
    }

    #[test]
    fn weak_large_result_set_lowers_cutoff() {
        let scores = [0.45, 0.42, 0.40, 0.37, 0.36, 0.30, 0.29, 0.28, 0.27, 0.26, 0.25, 0.24];
        let matches: Vec<_> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| m(&format!("k{i}"), *s, 1000))
            .collect();
        let set = filter_candidates(matches, &ThresholdPolicy::default());
        assert!((set.cutoff - 0.35).abs() < 1e-6);
        assert_eq!(set.ids(), vec!["k0", "k1", "k2", "k3", "k4"]);
    }

    #[test]
    fn weak_small_result_set_keeps_base_cutoff() {
        let matches = vec![
            m("a", 0.4, 1000),
            m("b", 0.3, 1000),
            m("c", 0.2, 1000),
            m("d", 0.1, 1000),
        ];
        let set = filter_candidates(matches, &ThresholdPolicy::default());
        assert_eq!(set.cutoff, 0.5);
        // only the top three survive, as high-score entries
        assert_eq!(set.ids(), vec!["a", "b", "c"]);
        assert_eq!(set.high_score.len(), 3);
    }

    #[test]
    fn short_sources_survive_low_scores() {
        let matches = vec![
            m("a", 0.9, 1000),
            m("b", 0.8, 1000),
            m("c", 0.7, 1000),
            m("long", 0.2, 201),
            m("short", 0.1, 200),
        ];
        let set = filter_candidates(matches, &ThresholdPolicy::default());
        assert_eq!(set.ids(), vec!["a", "b", "c", "short"]);
    }

    #[test]
    fn short_sources_are_refused_once_limit_is_reached() {
        let mut matches: Vec<_> = (0..20)
            .map(|i| m(&format!("k{i}"), 0.9 - i as f32 * 0.01, 1000))
            .collect();
        matches.extend((0..10).map(|i| m(&format!("s{i}"), 0.2, 50)));
        let set = filter_candidates(matches, &ThresholdPolicy::default());
        assert_eq!(set.matches.len(), 20);
        assert!(set.ids().iter().all(|id| id.starts_with('k')));
    }

    #[test]
    fn short_sources_fill_up_to_the_limit() {
        let mut matches = vec![m("top", 0.9, 1000)];
        matches.extend((0..30).map(|i| m(&format!("s{i}"), 0.3 - i as f32 * 0.001, 10)));
        let policy = ThresholdPolicy::default();
        let set = filter_candidates(matches, &policy);
        assert_eq!(set.matches.len(), policy.low_score_accept_limit);
        assert_eq!(set.ids()[0], "top");
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let matches = vec![
            m("a", 0.9, 1000),
            m("b", 0.8, 1000),
            m("a", 0.7, 1000),
            m("c", 0.6, 1000),
        ];
        let set = filter_candidates(matches, &ThresholdPolicy::default());
        assert_eq!(set.ids(), vec!["a", "b", "c"]);
        assert_eq!(set.matches[0].score, 0.9);
        assert_eq!(
            set.high_score.iter().map(|h| h.knowledge_id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn empty_input() {
        let set = filter_candidates(Vec::new(), &ThresholdPolicy::default());
        assert!(set.is_empty());
        assert!(set.high_score.is_empty());
        assert_eq!(set.cutoff, 0.5);
    }

    fn arb_matches() -> impl Strategy<Value = Vec<VectorMatch>> {
        prop::collection::vec((0u8..12, 0.0f32..1.0, 0usize..500), 0..60).prop_map(|raw| {
            raw.into_iter()
                .map(|(id, score, len)| m(&format!("k{id}"), score, len))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn no_duplicate_ids(matches in arb_matches()) {
            let set = filter_candidates(matches, &ThresholdPolicy::default());
            let mut seen = HashSet::new();
            for c in &set.matches {
                prop_assert!(seen.insert(c.knowledge_id.clone()));
            }
        }

        #[test]
        fn cutoff_is_base_or_adaptive(matches in arb_matches()) {
            let policy = ThresholdPolicy::default();
            let top = matches.iter().map(|m| m.score).fold(f32::MIN, f32::max);
            let count = matches.len();
            let set = filter_candidates(matches, &policy);
            if count > policy.adaptive_min_matches && top < policy.base {
                prop_assert!((set.cutoff - (top - policy.adaptive_margin)).abs() < 1e-6);
            } else {
                prop_assert_eq!(set.cutoff, policy.base);
            }
        }

        #[test]
        fn order_is_descending(matches in arb_matches()) {
            let set = filter_candidates(matches, &ThresholdPolicy::default());
            prop_assert!(set.matches.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }
}
