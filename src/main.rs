//! # History Sync CLI (`hsync`)
//!
//! Runs the incremental history-sync pipeline for one configured logger at a
//! time. Meant to be invoked periodically (cron, systemd timer); each call
//! runs to completion and is safe to repeat.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hsync init` | Create the run-state database |
//! | `hsync loggers` | List configured loggers and history-file health |
//! | `hsync sync <logger>` | Run the pipeline once for a logger |
//! | `hsync status [<logger>]` | Show persisted totals and last success |
//! | `hsync prune <logger>` | Forget old dedup identities |
//!
//! ## Exit Status
//!
//! Zero on success, including no-op runs (sink unreachable, history
//! unchanged). Non-zero on fatal errors: missing or unreadable history,
//! failed snapshot, bad configuration.
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr and
//! the run summary to stdout.

use clap::{Parser, Subcommand};
use history_sync::{config, ingest, migrate, prune, sources, stats};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// History Sync: incremental browser-history sync into DiMe.
#[derive(Parser)]
#[command(
    name = "hsync",
    about = "History Sync: incremental browser-history sync into a DiMe server",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/hsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the run-state database. Idempotent.
    Init,

    /// List configured loggers and whether their history files exist.
    Loggers,

    /// Sync one logger's history to the sink.
    ///
    /// Exits successfully without doing anything when the sink is
    /// unreachable or the history file has not changed since the last run.
    Sync {
        /// Logger identity, e.g. `firefox`, `chrome`, `chromium`.
        logger: String,
    },

    /// Show persisted run state.
    Status {
        /// Only show this logger.
        logger: Option<String>,
    },

    /// Forget old identities from a logger's dedup sets.
    Prune {
        /// Logger identity.
        logger: String,

        /// Forget identities first seen more than this many days ago.
        #[arg(long)]
        max_age_days: Option<u32>,

        /// Keep at most this many identities per set.
        #[arg(long)]
        max_events: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("State database initialized successfully.");
        }
        Commands::Loggers => {
            sources::list_loggers(&cfg)?;
        }
        Commands::Sync { logger } => {
            ingest::run_sync(&cfg, &logger).await?;
        }
        Commands::Status { logger } => {
            stats::run_status(&cfg, logger.as_deref()).await?;
        }
        Commands::Prune {
            logger,
            max_age_days,
            max_events,
        } => {
            prune::run_prune(&cfg, &logger, max_age_days, max_events).await?;
        }
    }

    Ok(())
}
