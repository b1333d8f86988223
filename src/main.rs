//! egrul-ingest: EGRUL/EGRIP registry archive ingestion
//!
//! Streams registry archives into an embedded document store and derives
//! link lists from it.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use egrul_ingest::config::{Config, LogFormat, DEFAULT_CONFIG_FILE};
use egrul_ingest::extract::Registry;
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "egrul-ingest")]
#[command(about = "Ingest EGRUL/EGRIP registry archives into an embedded store")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Data directory
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every archive in the input folder
    Enrich {
        /// Folder holding the registry archives (defaults to input.dir)
        input: Option<PathBuf>,

        /// Registry type (overrides config and REGISTRY_TYPE)
        #[arg(short, long)]
        registry: Option<Registry>,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Clear the store before ingesting
        #[arg(long)]
        drop: bool,

        /// Quiet mode (no progress output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write link-list files for every stored entity
    Links {
        /// Base URL for links
        #[arg(long)]
        hostname: Option<String>,

        /// Output folder
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Links per file
        #[arg(long)]
        file_size: Option<usize>,
    },

    /// Show store statistics and the last run report
    Stats,

    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env()?;

    // Setup logging
    let log_level = config.logging.level.with_verbosity(cli.verbose).as_tracing();
    let json = cli.json_logs || config.logging.format == LogFormat::Json;
    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_target(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_target(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }

    match cli.command {
        Commands::Enrich {
            input,
            registry,
            workers,
            drop,
            quiet,
        } => {
            if let Some(registry) = registry {
                config.registry.kind = registry;
            }
            if let Some(workers) = workers {
                config.pool.workers = workers;
            }
            config.store.drop_existing |= drop;
            if let Some(input) = input {
                config.input.dir = input;
            }
            config.validate()?;
            commands::enrich::run_enrich(config, quiet).await
        }
        Commands::Links {
            hostname,
            output,
            file_size,
        } => {
            if let Some(hostname) = hostname {
                config.links.hostname = hostname;
            }
            if let Some(output) = output {
                config.links.output_dir = output;
            }
            if let Some(file_size) = file_size {
                config.links.file_size = file_size;
            }
            config.validate()?;
            commands::links::write_links(config).await
        }
        Commands::Stats => commands::stats::show_stats(config).await,
        Commands::Init { path } => commands::init::init_config(path).await,
    }
}
