// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as threshold ranges, non-zero intervals, unique driver names, and
//! usage entries that point at a configured driver able to serve them.

use std::collections::HashSet;

use mnemo_core::types::{usage_keys, Capability};

use crate::diagnostic::{suggest_key, ConfigError};
use crate::model::{DriverConfig, MnemoConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Length of the `$hidden[` placeholder prefix the stream processor matches.
const MASK_PREFIX_LEN: usize = 8;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MnemoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.site.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "site.log_level `{}` must be one of: {}",
                config.site.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    validate_drivers(&config.drivers, &mut errors);
    validate_usage(config, &mut errors);

    let rag = &config.rag;
    for (name, value) in [
        ("rag.base_threshold", rag.base_threshold),
        ("rag.adaptive_margin", rag.adaptive_margin),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be within 0.0..=1.0, got {value}"),
            });
        }
    }

    if rag.top_k == 0 {
        errors.push(ConfigError::Validation {
            message: "rag.top_k must be at least 1".to_string(),
        });
    }

    if rag.history_window < rag.enhance_min_history {
        errors.push(ConfigError::Validation {
            message: format!(
                "rag.history_window ({}) must be at least rag.enhance_min_history ({})",
                rag.history_window, rag.enhance_min_history
            ),
        });
    }

    for (name, value) in [
        ("rag.enhance_timeout_ms", rag.enhance_timeout_ms),
        ("rag.embed_timeout_ms", rag.embed_timeout_ms),
        ("rag.rerank_timeout_ms", rag.rerank_timeout_ms),
        ("stream.flush_interval_ms", config.stream.flush_interval_ms),
        ("stream.stream_timeout_secs", config.stream.stream_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be greater than zero"),
            });
        }
    }

    let stream = &config.stream;
    if stream.mask_lookahead < MASK_PREFIX_LEN {
        errors.push(ConfigError::Validation {
            message: format!(
                "stream.mask_lookahead must be at least {MASK_PREFIX_LEN} to fit the placeholder prefix, got {}",
                stream.mask_lookahead
            ),
        });
    }

    if stream.mask_max_span <= stream.mask_lookahead {
        errors.push(ConfigError::Validation {
            message: format!(
                "stream.mask_max_span ({}) must exceed stream.mask_lookahead ({})",
                stream.mask_max_span, stream.mask_lookahead
            ),
        });
    }

    if stream.channel_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "stream.channel_capacity must be at least 1".to_string(),
        });
    }

    if let Some(key) = &config.vault.key
        && (key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()))
    {
        errors.push(ConfigError::Validation {
            message: "vault.key must be 64 hex characters (32 bytes)".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_drivers(drivers: &[DriverConfig], errors: &mut Vec<ConfigError>) {
    let mut seen_names = HashSet::new();
    let mut fail = |index: usize, message: String| {
        errors.push(ConfigError::Driver {
            index,
            message,
            span: None,
            src: None,
        });
    };
    for (i, driver) in drivers.iter().enumerate() {
        let name = driver.name.trim();
        if name.is_empty() {
            fail(i, "name must not be empty".to_string());
            continue;
        }

        if !seen_names.insert(name.to_ascii_lowercase()) {
            fail(i, format!("duplicate driver name `{name}`"));
        }

        let endpoint = driver.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            fail(i, format!("endpoint `{endpoint}` must be an http(s) URL"));
        }

        if driver.timeout_secs == 0 {
            fail(i, "timeout_secs must be greater than zero".to_string());
        }

        if driver_capabilities(driver).is_empty() {
            fail(i, format!("driver `{name}` configures no model and would serve nothing"));
        }
    }
}

fn validate_usage(config: &MnemoConfig, errors: &mut Vec<ConfigError>) {
    let drivers = config
        .drivers
        .iter()
        .map(|d| d.name.trim())
        .collect::<Vec<_>>()
        .join(", ");

    let mut keys: Vec<_> = config.usage.iter().collect();
    keys.sort();

    for (key, driver_name) in keys {
        if !usage_keys::ALL.contains(&key.as_str()) {
            errors.push(ConfigError::UnknownUsageKey {
                key: key.clone(),
                suggestion: suggest_key(key, &usage_keys::ALL),
                span: None,
                src: None,
            });
            continue;
        }
        let wanted = driver_name.trim().to_ascii_lowercase();
        let Some(driver) = config
            .drivers
            .iter()
            .find(|d| d.name.trim().to_ascii_lowercase() == wanted)
        else {
            errors.push(ConfigError::Usage {
                key: key.clone(),
                reason: format!("driver `{driver_name}` is not configured"),
                drivers: drivers.clone(),
                span: None,
                src: None,
            });
            continue;
        };

        let capability = Capability::for_usage_key(key);
        if !driver_capabilities(driver).contains(&capability) {
            errors.push(ConfigError::Usage {
                key: key.clone(),
                reason: format!("driver `{driver_name}` cannot serve {capability}"),
                drivers: drivers.clone(),
                span: None,
                src: None,
            });
        }
    }
}

/// Capabilities a configured driver will advertise once built.
///
/// Mirrors the HTTP driver: one capability per configured model, enhance rides on chat.
pub fn driver_capabilities(driver: &DriverConfig) -> Vec<Capability> {
    let mut caps = Vec::new();
    if driver.chat_model.is_some() {
        caps.push(Capability::Chat);
        caps.push(Capability::Enhance);
    }
    if driver.embedding_model.is_some() {
        caps.push(Capability::Embedding);
    }
    if driver.rerank_model.is_some() {
        caps.push(Capability::Rerank);
    }
    if driver.vision_model.is_some() {
        caps.push(Capability::Vision);
    }
    caps
}
