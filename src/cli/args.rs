//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery find --dataset <path> [--config <path>]
//! - aeroquery explain --dataset <path> [--config <path>] [--dialect <dialect>] [--text]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::planner::Dialect;

/// aeroquery - declarative find requests over relational tables
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one find request read from stdin and exit
    Find {
        /// Dataset file with table schemas and rows
        #[arg(long)]
        dataset: PathBuf,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the statements a find request would issue and exit
    Explain {
        /// Dataset file with table schemas and rows
        #[arg(long)]
        dataset: PathBuf,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// SQL dialect to render (postgres or sqlite)
        #[arg(long, default_value = "postgres")]
        dialect: Dialect,

        /// Print the plain-text plan instead of JSON
        #[arg(long)]
        text: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
