// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Load failures from figment and findings from validation both end up as
//! [`ConfigError`]s. Where the offending key can be found in one of the TOML
//! sources, the error carries a span so miette can point at it. Tables are
//! located by their mnemo header: `[rag]`, the n-th `[[drivers]]`, or
//! `[prompt.overrides.<lang>]`.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::ops::Range;

use miette::{Diagnostic, NamedSource, SourceSpan};
use mnemo_core::types::usage_keys;
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, rendered with miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {table}")]
    #[diagnostic(
        code(mnemo::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Table label, e.g. `[stream]` or `[[drivers]] #2`.
        table: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(mnemo::config::invalid_value), help("{hint}"))]
    InvalidValue {
        key: String,
        detail: String,
        hint: String,
        #[label("here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing `{key}` in {table}")]
    #[diagnostic(code(mnemo::config::missing_key), help("add `{key} = ...` to {table}"))]
    MissingKey { key: String, table: String },

    #[error("validation error: {message}")]
    #[diagnostic(code(mnemo::config::validation))]
    Validation { message: String },

    /// A `[[drivers]]` entry that cannot be built.
    #[error("drivers[{index}]: {message}")]
    #[diagnostic(
        code(mnemo::config::driver),
        help("each [[drivers]] entry needs a unique name, an http(s) endpoint, and at least one *_model")
    )]
    Driver {
        index: usize,
        message: String,
        #[label("in this driver")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A `[usage]` entry names a driver that is not configured or cannot serve the key.
    #[error("usage entry `{key}` is invalid: {reason}")]
    #[diagnostic(code(mnemo::config::usage), help("configured drivers: {drivers}"))]
    Usage {
        key: String,
        reason: String,
        drivers: String,
        #[label("this entry")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A `[usage]` key the router never asks for.
    #[error("unknown usage key `{key}`")]
    #[diagnostic(
        code(mnemo::config::usage_key),
        help("{}", unknown_key_help(suggestion.as_deref(), &usage_keys::ALL.join(", ")))
    )]
    UnknownUsageKey {
        key: String,
        suggestion: Option<String>,
        #[label("never consulted")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(mnemo::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Best Jaro-Winkler match for `unknown` among `candidates`, if close enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(unknown, c), *c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Human label for a figment path to a table.
///
/// `["drivers", "1"]` is `[[drivers]] #2`, `["prompt", "overrides", "en"]`
/// is `[prompt.overrides.en]`, and the empty path is the top level.
pub fn table_label(path: &[String]) -> String {
    match path {
        [] => "the top level".to_string(),
        [first, rest @ ..] if first == "drivers" => match rest.first().and_then(|i| i.parse::<usize>().ok()) {
            Some(i) => format!("[[drivers]] #{}", i + 1),
            None => "[[drivers]]".to_string(),
        },
        _ => format!("[{}]", path.join(".")),
    }
}

/// Converts a figment extraction failure into diagnostics.
///
/// `sources` are `(display path, content)` pairs in precedence order; the
/// first one containing the key supplies the span.
pub fn from_figment(err: figment::Error, sources: &[(String, String)]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(sources, &path, field);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        table: table_label(&path),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                    table: table_label(&path),
                },
                Kind::UnknownVariant(value, expected) => {
                    let (table, key) = split_leaf(&path);
                    let (span, src) = locate(sources, table, key);
                    let hint = match suggest_key(value, expected) {
                        Some(s) => format!("did you mean `{s}`?"),
                        None => format!("one of: {}", expected.join(", ")),
                    };
                    ConfigError::InvalidValue {
                        key: path.join("."),
                        detail: format!("unknown variant `{value}`"),
                        hint,
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
                    let (table, key) = split_leaf(&path);
                    let (span, src) = locate(sources, table, key);
                    ConfigError::InvalidValue {
                        key: path.join("."),
                        detail: format!("found {actual}"),
                        hint: format!("expected {expected}"),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Points validation findings at their TOML entries.
pub fn attach_sources(errors: Vec<ConfigError>, sources: &[(String, String)]) -> Vec<ConfigError> {
    errors
        .into_iter()
        .map(|error| match error {
            ConfigError::Usage {
                key,
                reason,
                drivers,
                ..
            } => {
                let (span, src) = locate(sources, &["usage".to_string()], &key);
                ConfigError::Usage {
                    key,
                    reason,
                    drivers,
                    span,
                    src,
                }
            }
            ConfigError::UnknownUsageKey { key, suggestion, .. } => {
                let (span, src) = locate(sources, &["usage".to_string()], &key);
                ConfigError::UnknownUsageKey {
                    key,
                    suggestion,
                    span,
                    src,
                }
            }
            ConfigError::Driver { index, message, .. } => {
                let (span, src) = locate_driver_header(sources, index);
                ConfigError::Driver {
                    index,
                    message,
                    span,
                    src,
                }
            }
            other => other,
        })
        .collect()
}

fn split_leaf(path: &[String]) -> (&[String], &str) {
    match path.split_last() {
        Some((leaf, table)) => (table, leaf.as_str()),
        None => (&[], ""),
    }
}

fn locate(
    sources: &[(String, String)],
    table: &[String],
    key: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    if key.is_empty() {
        return (None, None);
    }
    for (path, content) in sources {
        if let Some(range) = TomlTables::parse(content).key_range(table, key) {
            return spanned(path, content, range);
        }
    }
    (None, None)
}

fn locate_driver_header(
    sources: &[(String, String)],
    index: usize,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    for (path, content) in sources {
        if let Some(table) = TomlTables::parse(content).drivers().nth(index) {
            return spanned(path, content, table.header.clone());
        }
    }
    (None, None)
}

fn spanned(
    path: &str,
    content: &str,
    range: Range<usize>,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    (
        Some(SourceSpan::new(range.start.into(), range.len())),
        Some(NamedSource::new(path, content.to_string())),
    )
}

/// One table in a TOML document: its header range and body range.
#[derive(Debug, Clone)]
struct Table {
    name: String,
    array: bool,
    header: Range<usize>,
    body: Range<usize>,
}

/// Line-level index of the tables in a TOML document.
///
/// Only headers and `key = value` lines are recognised, which is all the
/// mnemo config format uses.
#[derive(Debug)]
struct TomlTables<'a> {
    content: &'a str,
    tables: Vec<Table>,
}

impl<'a> TomlTables<'a> {
    fn parse(content: &'a str) -> Self {
        let mut tables = vec![Table {
            name: String::new(),
            array: false,
            header: 0..0,
            body: 0..content.len(),
        }];
        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            let trimmed = line.trim();
            let header = trimmed
                .strip_prefix("[[")
                .and_then(|rest| rest.split_once("]]"))
                .map(|(name, _)| (name, true))
                .or_else(|| {
                    trimmed
                        .strip_prefix('[')
                        .and_then(|rest| rest.split_once(']'))
                        .map(|(name, _)| (name, false))
                });
            if let Some((name, array)) = header {
                let start = offset + (line.len() - line.trim_start().len());
                if let Some(last) = tables.last_mut() {
                    last.body.end = offset;
                }
                tables.push(Table {
                    name: name.trim().to_string(),
                    array,
                    header: start..start + trimmed.len(),
                    body: offset + line.len()..content.len(),
                });
            }
            offset += line.len();
        }
        Self { content, tables }
    }

    fn drivers(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| t.array && t.name == "drivers")
    }

    /// Tables a figment path may refer to. A `drivers` path without an index
    /// matches every `[[drivers]]` entry.
    fn candidates(&self, path: &[String]) -> Vec<&Table> {
        match path {
            [first, rest @ ..] if first == "drivers" => {
                match rest.first().and_then(|i| i.parse::<usize>().ok()) {
                    Some(i) => self.drivers().nth(i).into_iter().collect(),
                    None => self.drivers().collect(),
                }
            }
            _ => {
                let name = path.join(".");
                self.tables
                    .iter()
                    .filter(|t| !t.array && t.name == name)
                    .collect()
            }
        }
    }

    /// Byte range of `key` (bare or quoted) inside the table at `path`.
    fn key_range(&self, path: &[String], key: &str) -> Option<Range<usize>> {
        let quoted = format!("\"{key}\"");
        self.candidates(path).into_iter().find_map(|table| {
            let body = &self.content[table.body.clone()];
            let mut offset = table.body.start;
            for line in body.split_inclusive('\n') {
                let indent = line.len() - line.trim_start().len();
                let trimmed = line.trim_start();
                for candidate in [quoted.as_str(), key] {
                    if let Some(after) = trimmed.strip_prefix(candidate)
                        && after.trim_start().starts_with('=')
                    {
                        let start = offset + indent;
                        return Some(start..start + candidate.len());
                    }
                }
                offset += line.len();
            }
            None
        })
    }
}

/// Renders each error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    eprintln!(
        "mnemo: {} configuration error{}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("  {error}"),
        }
    }
}
