//! Scholia CLI - operator console for a thesis store
//!
//! ## Usage
//!
//! ```bash
//! # Where the store is and what state it is in
//! scholia status
//!
//! # Run pending schema migrations and print the report
//! scholia --config ~/.config/scholia/store.toml migrate
//!
//! # Check every cross-entity invariant (exit code 1 on violations)
//! scholia --data-dir /tmp/scholia verify
//!
//! # Summary of one thesis
//! scholia stats 0f9c…
//!
//! # Whole state as JSON
//! scholia export > backup.json
//! ```
//!
//! Logs go to stderr and follow `RUST_LOG` (default `warn`), so stdout
//! stays machine-readable.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scholia_store::{BackendKind, StoreConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scholia")]
#[command(about = "Inspect, migrate and verify a scholia thesis store")]
struct Args {
    /// Path to a TOML store config
    #[arg(short, long, env = "SCHOLIA_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory, overriding the config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage backend, overriding the config
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Accept writes even if a migration step fails
    #[arg(long)]
    allow_degraded_writes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Schema version, write mode, startup report and per-thesis overview
    Status,
    /// Run pending migrations; fails if any step failed
    Migrate,
    /// Report integrity violations; fails if there are any
    Verify,
    /// Derived statistics for one thesis
    Stats {
        /// Thesis id
        thesis: String,
    },
    /// Print the whole stored state as JSON
    Export {
        /// Single-line output
        #[arg(long)]
        compact: bool,
    },
}

fn load_config(args: &Args) -> anyhow::Result<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };

    // CLI overrides
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if args.allow_degraded_writes {
        config.allow_degraded_writes = true;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    debug!(
        backend = ?config.backend,
        data_dir = %config.resolved_data_dir().display(),
        "Opening store"
    );

    let mut out = std::io::stdout().lock();
    let healthy = match args.command {
        Command::Status => commands::status(&config, &mut out)?,
        Command::Migrate => commands::migrate(&config, &mut out)?,
        Command::Verify => commands::verify(&config, &mut out)?,
        Command::Stats { thesis } => commands::stats(&config, &thesis, &mut out)?,
        Command::Export { compact } => commands::export(&config, !compact, &mut out)?,
    };

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
