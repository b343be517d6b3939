// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Desensitization placeholders and their live resolution in streamed text.
//!
//! Evidence may carry `$hidden[token]` placeholders in place of real values.
//! The model is told to copy them verbatim; [`MaskScanner`] spots them in the
//! outgoing text, even when split across deltas, and substitutes the value.

use std::collections::HashMap;
use std::fmt;

use mnemo_core::types::EvidenceDoc;

/// Literal prefix of every placeholder.
pub const MASK_PREFIX: &str = "$hidden[";
const MASK_SUFFIX: char = ']';

/// Placeholder to real value, scoped to one response. Never logged.
#[derive(Clone, Default)]
pub struct MaskMap {
    entries: HashMap<String, String>,
}

impl fmt::Debug for MaskMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskMap")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl MaskMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges the masks of every evidence doc. Later docs win on conflicts.
    pub fn from_docs(docs: &[EvidenceDoc]) -> Self {
        let mut map = Self::new();
        for doc in docs {
            for (placeholder, value) in &doc.masks {
                map.insert(placeholder, value);
            }
        }
        map
    }

    /// Adds an entry. A bare token such as `u1` is stored as `$hidden[u1]`.
    pub fn insert(&mut self, placeholder: &str, value: &str) {
        let key = if placeholder.starts_with(MASK_PREFIX) {
            placeholder.to_string()
        } else {
            format!("{MASK_PREFIX}{placeholder}{MASK_SUFFIX}")
        };
        self.entries.insert(key, value.to_string());
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.entries.get(placeholder).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan state over outgoing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskState {
    /// Passing text through.
    Idle,
    /// Saw `$`; waiting to see whether the prefix follows.
    Suspect,
    /// Inside `$hidden[`; waiting for `]`.
    Confirmed,
}

/// Streaming placeholder resolver.
///
/// Text that might belong to a placeholder is held back in `pending` until
/// it is resolved or ruled out, so callers must not flush while
/// [`is_scanning`](Self::is_scanning) is true.
#[derive(Debug)]
pub struct MaskScanner {
    masks: MaskMap,
    state: MaskState,
    pending: String,
    pending_chars: usize,
    lookahead: usize,
    max_span: usize,
}

impl MaskScanner {
    pub fn new(masks: MaskMap, lookahead: usize, max_span: usize) -> Self {
        Self {
            masks,
            state: MaskState::Idle,
            pending: String::new(),
            pending_chars: 0,
            lookahead,
            max_span,
        }
    }

    pub fn state(&self) -> MaskState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state != MaskState::Idle
    }

    /// Feeds a content delta, appending releasable text to `out`.
    pub fn push(&mut self, text: &str, out: &mut String) {
        if self.masks.is_empty() {
            out.push_str(text);
            return;
        }
        for c in text.chars() {
            self.push_char(c, out);
        }
    }

    /// Releases held-back text verbatim and returns to idle.
    pub fn drain(&mut self, out: &mut String) {
        out.push_str(&self.pending);
        self.reset();
    }

    fn push_char(&mut self, c: char, out: &mut String) {
        match self.state {
            MaskState::Idle => {
                if c == '$' {
                    self.hold(c);
                    self.state = MaskState::Suspect;
                } else {
                    out.push(c);
                }
            }
            MaskState::Suspect => {
                self.hold(c);
                if self.pending == MASK_PREFIX {
                    self.state = MaskState::Confirmed;
                } else if !MASK_PREFIX.starts_with(self.pending.as_str())
                    || self.pending_chars >= self.lookahead
                {
                    self.abandon(out);
                }
            }
            MaskState::Confirmed => {
                self.hold(c);
                if c == MASK_SUFFIX {
                    match self.masks.get(&self.pending) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&self.pending),
                    }
                    self.reset();
                } else if self.pending_chars > self.max_span {
                    self.drain(out);
                }
            }
        }
    }

    /// The held `$` was not a placeholder. Release it and rescan what followed,
    /// which may itself start a placeholder (`$$hidden[...]`).
    fn abandon(&mut self, out: &mut String) {
        let held = std::mem::take(&mut self.pending);
        self.reset();
        let mut chars = held.chars();
        if let Some(first) = chars.next() {
            out.push(first);
        }
        for c in chars {
            self.push_char(c, out);
        }
    }

    fn hold(&mut self, c: char) {
        self.pending.push(c);
        self.pending_chars += 1;
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.pending_chars = 0;
        self.state = MaskState::Idle;
    }
}
