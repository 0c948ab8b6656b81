//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// covrand: merge and inspect exported functional coverage
#[derive(Parser, Debug)]
#[command(name = "covrand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge exported coverage files (XML, YAML or JSON) into one
    Merge(MergeArgs),

    /// Print the coverage report of an exported file
    Report(ReportArgs),
}

/// Arguments for the merge command
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Output file; the extension picks the format
    #[arg(short, long)]
    pub output: PathBuf,

    /// Input files, merged left to right
    #[arg(required = true, num_args = 2..)]
    pub inputs: Vec<PathBuf>,
}

/// Arguments for the report command
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Exported coverage file
    pub file: PathBuf,

    /// List per-bin hit counts
    #[arg(long)]
    pub bins: bool,

    /// Only report nodes under this dotted prefix
    #[arg(long)]
    pub node: Option<String>,
}
