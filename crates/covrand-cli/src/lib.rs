//! covrand CLI library
//!
//! Merges coverage documents exported by test runs and prints their
//! reports. Log output goes to stderr, filtered by `RUST_LOG` when set and
//! by `-q` / `-v` / `-vv` otherwise; reports go to stdout.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;

pub use commands::{Cli, Commands, MergeArgs, ReportArgs};
pub use config::Verbosity;
pub use error::{CliError, CliResult};

use covrand::{merge_files, CoverageDocument};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber
pub fn init_tracing(verbosity: Verbosity) -> CliResult<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.level().into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CliError::config(format!("cannot install logger: {e}")))
}

/// Run a parsed command line
pub fn run(cli: Cli) -> CliResult<()> {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    init_tracing(verbosity)?;
    debug!(?verbosity, "starting");

    match cli.command {
        Commands::Merge(args) => run_merge(&args, verbosity),
        Commands::Report(args) => run_report(&args),
    }
}

/// Merge the inputs and print the merged totals
pub fn run_merge(args: &MergeArgs, verbosity: Verbosity) -> CliResult<()> {
    info!(inputs = args.inputs.len(), output = %args.output.display(), "merging");
    let merged = merge_files(&args.output, &args.inputs)?;
    if verbosity.is_quiet() {
        return Ok(());
    }

    println!(
        "Merged {} files into {}",
        args.inputs.len(),
        args.output.display()
    );
    if let Some(top) = merged.top() {
        println!(
            "top: coverage={}, size={}, cover_percentage={:.2}",
            top.coverage, top.size, top.cover_percentage
        );
    }
    Ok(())
}

/// Print the report of one exported document
pub fn run_report(args: &ReportArgs) -> CliResult<()> {
    let (doc, format) = CoverageDocument::load_with_format(&args.file)?;
    debug!(file = %args.file.display(), %format, nodes = doc.len(), "loaded");

    let prefix = args.node.as_deref();
    if let Some(prefix) = prefix {
        if !doc.iter().any(|(name, _)| name.starts_with(prefix)) {
            return Err(CliError::invalid_argument(format!(
                "no coverage node under '{prefix}' in {}",
                args.file.display()
            )));
        }
    }
    print!("{}", doc.report(args.bins, prefix));
    Ok(())
}
