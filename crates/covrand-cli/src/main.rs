//! covrand CLI: merge and inspect exported coverage
//!
//! ## Usage
//!
//! ```bash
//! covrand merge -o merged.xml run1.xml run2.yml   # Merge two runs
//! covrand report merged.xml --bins                # Report with bin hits
//! covrand report merged.xml --node top.alu        # Report one subtree
//! ```

use clap::Parser;
use covrand_cli::{run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
