//! orgcopy command-line tool.
//!
//! Copies the records of a root object and everything they reference from a
//! source store to a target store.

mod runner;
mod settings;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orgcopy_core::MigrationMode;

/// Default log filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "orgcopy=info,orgcopy_core=info,orgcopy_client=info";

/// Log filter used with `--verbose`.
const VERBOSE_FILTER: &str = "orgcopy=debug,orgcopy_core=debug,orgcopy_client=debug";

/// Migration strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Every record of every object type, in dependency order
    Bulk,
    /// Each root record with the records it references
    PerRecord,
}

impl From<Mode> for MigrationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Bulk => MigrationMode::Bulk,
            Mode::PerRecord => MigrationMode::PerRecord,
        }
    }
}

/// Copy records and their dependencies between two stores
#[derive(Parser, Debug)]
#[command(name = "orgcopy")]
#[command(version, about = "Copy records and their dependencies between two stores")]
pub struct Args {
    /// Root object type to migrate
    #[arg(short, long)]
    pub object: String,

    /// Migration strategy
    #[arg(short, long, value_enum, default_value_t = Mode::Bulk)]
    pub mode: Mode,

    /// Settings file (defaults to ./orgcopy.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum rows read per source query
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Create attempts per record
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Print the migration plan and exit without inserting
    #[arg(long)]
    pub plan_only: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = runner::run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["orgcopy", "--object", "Contact"]).unwrap();
        assert_eq!(args.object, "Contact");
        assert_eq!(args.mode, Mode::Bulk);
        assert!(args.config.is_none());
        assert!(!args.plan_only);
        assert!(!args.json);
    }

    #[test]
    fn test_args_full() {
        let args = Args::try_parse_from([
            "orgcopy",
            "-o",
            "Contact",
            "--mode",
            "per-record",
            "--config",
            "prod.toml",
            "--limit",
            "5",
            "--max-attempts",
            "4",
            "--plan-only",
            "--json",
            "-v",
        ])
        .unwrap();

        assert_eq!(MigrationMode::from(args.mode), MigrationMode::PerRecord);
        assert_eq!(args.config, Some(PathBuf::from("prod.toml")));
        assert_eq!(args.limit, Some(5));
        assert_eq!(args.max_attempts, Some(4));
        assert!(args.plan_only);
        assert!(args.json);
        assert!(args.verbose);
    }

    #[test]
    fn test_object_is_required() {
        assert!(Args::try_parse_from(["orgcopy"]).is_err());
    }
}
