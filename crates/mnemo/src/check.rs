// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mnemo check` command implementation.
//!
//! Builds every configured driver and the provider router exactly as a
//! serving process would, then prints which driver answers each usage key.

use std::io::IsTerminal;
use std::sync::Arc;

use mnemo_config::model::DriverKind;
use mnemo_config::MnemoConfig;
use mnemo_context::PromptAssembler;
use mnemo_core::{Driver, MnemoError};
use mnemo_openai::OpenAiDriver;
use mnemo_router::ProviderRouter;
use mnemo_vault::ContentCipher;

/// Constructs the router from configuration. Failures here are fatal at startup.
pub fn build_router(config: &MnemoConfig) -> Result<ProviderRouter, MnemoError> {
    let mut builder = ProviderRouter::builder()
        .usage_map(&config.usage)
        .prompts(PromptAssembler::new(&config.prompt, &config.site))
        .default_lang(&config.site.default_lang);
    for driver in &config.drivers {
        let driver: Arc<dyn Driver> = match driver.kind {
            DriverKind::Openai => Arc::new(OpenAiDriver::from_config(driver)?),
        };
        builder = builder.driver(driver);
    }
    builder.build()
}

/// Rows of the capability report: usage key and the serving driver, if any.
pub fn capability_rows(router: &ProviderRouter) -> Vec<(String, String)> {
    router
        .capability_table()
        .into_iter()
        .map(|(key, driver)| {
            (
                key.to_string(),
                driver.unwrap_or_else(|| "unsupported".to_string()),
            )
        })
        .collect()
}

/// Run the `mnemo check` command.
pub fn run_check(config: &MnemoConfig, plain: bool) -> Result<(), MnemoError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let router = build_router(config)?;
    let key = ContentCipher::from_config(&config.vault)?;

    println!();
    println!("  mnemo check");
    println!("  {}", "-".repeat(50));
    for (usage, driver) in capability_rows(&router) {
        let supported = driver != "unsupported";
        let line = if use_color {
            use colored::Colorize;
            let driver = if supported {
                driver.green().to_string()
            } else {
                driver.yellow().to_string()
            };
            format!("    {usage:<20} {driver}")
        } else {
            format!("    {usage:<20} {driver}")
        };
        println!("{line}");
    }
    println!("  {}", "-".repeat(50));
    println!("    {:<20} {}", "prompt language", router.lang());
    for line in content_key_lines(key.as_ref())? {
        println!("    {line}");
    }
    println!();
    Ok(())
}

/// Content key status. When no key is configured, suggests a freshly generated one.
pub fn content_key_lines(key: Option<&ContentCipher>) -> Result<Vec<String>, MnemoError> {
    if key.is_some() {
        return Ok(vec![format!("{:<20} configured", "content key")]);
    }
    let fresh = ContentCipher::generate_hex()?;
    Ok(vec![
        format!("{:<20} not configured", "content key"),
        format!("{:<20} [vault] key = \"{}\"", "", fresh.as_str()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> MnemoConfig {
        mnemo_config::load_and_validate_str(toml).unwrap()
    }

    #[test]
    fn router_from_config() {
        let config = config(
            r#"
            [[drivers]]
            name = "local"
            endpoint = "http://127.0.0.1:9/v1"
            api_key = "sk-test"
            chat_model = "qwen"
            embedding_model = "bge-m3"

            [[drivers]]
            name = "ranker"
            endpoint = "http://127.0.0.1:9/v1"
            api_key = "sk-test"
            chat_model = "small"
            rerank_model = "bge-reranker"

            [usage]
            rerank = "ranker"
            "#,
        );
        let router = build_router(&config).unwrap();
        let rows = capability_rows(&router);
        let lookup = |key: &str| {
            rows.iter()
                .find(|(k, _)| k == key)
                .map(|(_, d)| d.as_str())
                .unwrap()
        };
        assert_eq!(lookup("query"), "local");
        assert_eq!(lookup("embedding.query"), "local");
        assert_eq!(lookup("rerank"), "ranker");
        assert_eq!(lookup("vision"), "unsupported");
        assert_eq!(lookup("reader"), "unsupported");
    }

    #[test]
    fn missing_embedding_driver_is_fatal() {
        let config = config(
            r#"
            [[drivers]]
            name = "chat-only"
            endpoint = "http://127.0.0.1:9/v1"
            api_key = "sk-test"
            chat_model = "qwen"
            "#,
        );
        let err = build_router(&config).unwrap_err();
        assert!(matches!(err, MnemoError::Config(ref m) if m.contains("embedding")));
    }

    #[test]
    fn missing_content_key_suggests_a_fresh_one() {
        let lines = content_key_lines(None).unwrap();
        assert!(lines[0].ends_with("not configured"));
        let suggested = lines[1].trim().trim_start_matches("[vault] key = ").trim_matches('"');
        assert!(ContentCipher::from_hex(suggested).is_ok());

        let cipher = ContentCipher::new([9u8; 32]);
        let lines = content_key_lines(Some(&cipher)).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("configured"));
    }

    #[test]
    fn no_drivers_is_fatal() {
        let config = config("");
        assert!(build_router(&config).is_err());
    }
}
