//! # Docs Coordinator CLI (`docs-coord`)
//!
//! Generates coordination snapshots for a shared document: open questions,
//! recent decisions, and suggested next steps, extracted from its comments
//! and revision history.
//!
//! ## Usage
//!
//! ```bash
//! docs-coord --config ./config/docs-coord.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docs-coord snapshot <doc-id>` | Analyze one document and print/save the report |
//! | `docs-coord serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Report on the last 24 hours, ignoring cached data
//! docs-coord snapshot 1AbCdEf --since-hours 24 --force-refresh
//!
//! # Machine-readable output
//! docs-coord snapshot 1AbCdEf --json
//!
//! # HTTP API on a custom address
//! docs-coord serve --bind 0.0.0.0:8000
//! ```
//!
//! ## Environment
//!
//! | Variable | Purpose |
//! |----------|---------|
//! | `OPENAI_API_KEY` | Required for analysis |
//! | `GOOGLE_ACCESS_TOKEN` | Overrides the token file |
//! | `DOCS_COORD_LOG` | Log filter (e.g. `docs_coordinator=debug`) |
//! | `DOCS_COORD_LOG_FORMAT` | `compact` (default) or `json` |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use docs_coordinator::config::{self, Config};
use docs_coordinator::coordinator::Coordinator;
use docs_coordinator::formatter::{format_snapshot, save_snapshot};
use docs_coordinator::models::CoordinationSnapshot;
use docs_coordinator::server;

/// Docs Coordinator: turn document discussion into questions, decisions,
/// and next steps.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docs-coord.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docs-coord",
    about = "Docs Coordinator: coordination snapshots for shared documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docs-coord.toml`. Built-in defaults are used
    /// when the file does not exist.
    #[arg(long, global = true, default_value = "./config/docs-coord.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one document and print the coordination report.
    ///
    /// Exits with status 1 when any data source or the analysis failed;
    /// the report is still printed and saved.
    Snapshot {
        /// Document ID (from the document URL).
        document_id: String,

        /// Hours of revision history to consider (default: from config).
        #[arg(long)]
        since_hours: Option<u32>,

        /// Ignore cached data for this document.
        #[arg(long)]
        force_refresh: bool,

        /// Directory the markdown report is saved to.
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,

        /// Print the snapshot as JSON instead of markdown. Nothing is saved.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API.
    Serve {
        /// Bind address (default: `[server] bind` from config).
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = read_config(&cli.config)?;
    init_tracing(&cfg.logging.level);
    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Snapshot {
            document_id,
            since_hours,
            force_refresh,
            output_dir,
            json,
        } => {
            let snapshot = tokio::task::spawn_blocking(move || -> Result<CoordinationSnapshot> {
                let coordinator = Coordinator::from_config(&cfg)?;
                Ok(coordinator.generate_snapshot(&document_id, since_hours, force_refresh))
            })
            .await
            .context("snapshot worker failed")??;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let report = format_snapshot(&snapshot);
                println!("\n{}", "=".repeat(80));
                println!("{}", report);
                println!("{}\n", "=".repeat(80));

                let path = save_snapshot(&report, &output_dir)?;
                println!("Saved report to {}", path.display());
            }

            let errors = &snapshot.data_completeness.errors;
            if !errors.is_empty() {
                eprintln!(
                    "⚠️  {} warning(s) occurred, see the report for details",
                    errors.len()
                );
                std::process::exit(1);
            }
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            let coordinator = tokio::task::spawn_blocking(move || Coordinator::from_config(&cfg))
                .await
                .context("startup worker failed")??;
            server::run_server(&bind, Arc::new(coordinator)).await?;
        }
    }

    Ok(())
}

fn read_config(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("DOCS_COORD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let format = std::env::var("DOCS_COORD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
