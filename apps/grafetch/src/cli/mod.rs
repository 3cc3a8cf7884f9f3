//! # Grafetch CLI Module
//!
//! ## Available Commands
//!
//! - `retrieve` - Fetch, cache and build a dataset, print its report
//! - `list` - List (or search) the dataset registry
//! - `locate` - Show remote sources and local cache paths of a dataset
//! - `cache status` / `cache clear` - Inspect or reset a cache entry

mod commands;

use clap::{Parser, Subcommand};
use grafetch_core::{GraphError, Verbosity};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Grafetch - cached retrieval of STRING interaction networks
///
/// Downloads a dataset once, keeps it in a local cache, and builds a
/// deterministic graph from it on every call.
#[derive(Parser, Debug)]
#[command(name = "grafetch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache root, overriding the configuration
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve a dataset and print its report
    Retrieve {
        /// Dataset name, e.g. HomoSapiens
        name: String,

        /// Build a directed graph
        #[arg(long)]
        directed: bool,

        /// 0 = silent, 1 = progress bars, 2 = progress bars and statistics
        #[arg(short, long, default_value = "2")]
        verbosity: Verbosity,

        /// Number of most central nodes in the report
        #[arg(long)]
        top_k: Option<usize>,

        /// Fail on self-loops instead of counting them
        #[arg(long)]
        strict_self_loops: bool,

        /// Abort the retrieval after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Drop stored graph snapshots and rebuild from the raw files
        #[arg(long)]
        no_snapshots: bool,

        /// Ignore the weight column
        #[arg(long)]
        no_weights: bool,
    },

    /// List datasets in the registry
    List {
        /// Case-insensitive substring of the name or species
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show remote sources and cache paths of a dataset
    Locate {
        /// Dataset name
        name: String,
    },

    /// Inspect or reset cache entries
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Cache maintenance actions.
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show whether a dataset is fully cached
    Status {
        /// Dataset name
        name: String,
    },

    /// Delete a dataset's cache entry
    Clear {
        /// Dataset name
        name: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), GraphError> {
    let mut config = load_config(cli.config.as_deref())?;
    let json_mode = cli.json;

    match cli.command {
        Commands::Retrieve {
            name,
            directed,
            verbosity,
            top_k,
            strict_self_loops,
            timeout,
            no_snapshots,
            no_weights,
        } => {
            if let Some(k) = top_k {
                config.top_k = k;
            }
            config.strict_self_loops |= strict_self_loops;
            let options = RetrieveOptions {
                directed,
                verbosity: if cli.quiet { Verbosity::Silent } else { verbosity },
                timeout,
                snapshots: !no_snapshots,
                edge_weights: !no_weights,
            };
            cmd_retrieve(config, cli.cache_path.as_deref(), &name, &options, json_mode)
        }
        Commands::List { filter } => cmd_list(&config, filter.as_deref(), json_mode),
        Commands::Locate { name } => {
            apply_cache_path(&mut config, cli.cache_path);
            cmd_locate(&config, &name, json_mode)
        }
        Commands::Cache { action } => {
            apply_cache_path(&mut config, cli.cache_path);
            match action {
                CacheAction::Status { name } => cmd_cache_status(&config, &name, json_mode),
                CacheAction::Clear { name } => cmd_cache_clear(&config, &name, json_mode),
            }
        }
    }
}
