// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! mnemo - a personal knowledge-base assistant.
//!
//! The binary validates configuration, wires the configured drivers into a
//! provider router, and previews the prompts the pipeline sends.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod prompt;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mnemo_context::PromptKind;

/// mnemo - a personal knowledge-base assistant.
#[derive(Parser, Debug)]
#[command(name = "mnemo", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and show which driver serves each capability.
    Check {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Render a prompt template with empty evidence.
    Prompt {
        #[arg(long, default_value = "rag")]
        kind: PromptKind,
        /// Prompt language; the site default when omitted.
        #[arg(long)]
        lang: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => mnemo_config::load_and_validate_path(path),
        None => mnemo_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            mnemo_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.site.log_level);

    match cli.command {
        Some(Commands::Check { plain }) => {
            if let Err(e) = check::run_check(&config, plain) {
                eprintln!("mnemo: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Prompt { kind, lang }) => {
            println!("{}", prompt::render_prompt(&config, kind, lang.as_deref()));
        }
        None => {
            println!("mnemo: use --help for available commands");
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mnemo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
