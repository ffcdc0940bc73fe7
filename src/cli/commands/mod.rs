//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod helpers;
mod init;
mod lot;
mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lotwatch::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "lotwatch")]
#[command(about = "Auction lot ingestion for antiquarian books")]
#[command(version)]
pub struct Cli {
    /// Target directory or database file (overrides config file).
    /// Can be a directory containing lotwatch.db or a .db file directly.
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Walk categories and store lots not seen before
    Discover {
        /// Category IDs to walk (default: crawl.categories from config)
        category_ids: Vec<i64>,
        /// Classify without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-check ended lots that are still monitored
    Monitor {
        /// Download imagery while refreshing
        #[arg(long)]
        images: bool,
    },

    /// Fetch and store a single lot
    Lot {
        /// Marketplace lot ID
        id: i64,
        /// Archive the lot's imagery
        #[arg(long)]
        images: bool,
        /// Flag the lot as less valuable (never archived)
        #[arg(long)]
        less_valuable: bool,
    },

    /// Show lot counts
    Stats,

    /// Print the publication year found in a piece of text
    Year {
        /// Title or description text
        text: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        target: cli.target,
    };
    let (settings, _config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Discover {
            category_ids,
            dry_run,
        } => crawl::cmd_discover(&settings, category_ids, dry_run).await,
        Commands::Monitor { images } => crawl::cmd_monitor(&settings, images).await,
        Commands::Lot {
            id,
            images,
            less_valuable,
        } => lot::cmd_lot(&settings, id, images, less_valuable).await,
        Commands::Stats => stats::cmd_stats(&settings).await,
        Commands::Year { text } => {
            lot::cmd_year(&text);
            Ok(())
        }
    }
}
