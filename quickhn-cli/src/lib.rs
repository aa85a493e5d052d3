//! Command-line interface for querying quickhn address sources.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod query;

pub use error::CliError;

use query::{QueryArgs, run_query};

const ARG_SOURCES: &str = "sources";
const ARG_BBOX: &str = "bbox";
const ARG_LOOKUP: &str = "lookup";
const ARG_CELL_VISIT_CEILING: &str = "cell-visit-ceiling";
const ARG_CULL_DISTANCE_M: &str = "cull-distance-m";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";
const ENV_SOURCES: &str = "QUICKHN_CMDS_QUERY_SOURCES";
const ENV_BBOX: &str = "QUICKHN_CMDS_QUERY_BBOX";

/// Run the quickhn CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Query(args) => run_query(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "quickhn",
    about = "Query house-number sources through the cell cache",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the house numbers inside one or more bounding boxes.
    Query(QueryArgs),
}

#[cfg(test)]
mod tests;
