//! ldb — run the greedy refinement rebalancer on a recorded snapshot.
//!
//! # Usage
//!
//! ```text
//! ldb refine --snapshot snap.json --format json
//! ldb inspect --snapshot snap.json --config ldb.toml
//! ldb config > ldb.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ldb_core::{LdbConfig, LogConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "ldb",
    about = "ldb — greedy refinement load rebalancer",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file (ldb.toml). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a new object-to-processor assignment
    Refine {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show processor loads after placement and evacuation, before refinement
    Inspect {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
    },
    /// Print the default configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LdbConfig::from_file(path)?,
        None => LdbConfig::default(),
    };
    init_tracing(&config.log, cli.log_json)?;

    match cli.command {
        Commands::Refine { snapshot, format } => {
            commands::refine::run(&config, &snapshot, &format)
        }
        Commands::Inspect { snapshot } => commands::inspect::run(&config, &snapshot),
        Commands::Config => {
            print!("{}", LdbConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(log: &LogConfig, force_json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log.filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log.json || force_json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
