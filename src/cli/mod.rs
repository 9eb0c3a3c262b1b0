//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - find: One-shot find request against a dataset file
//! - explain: One-shot explain of a find request

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{explain, find, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
