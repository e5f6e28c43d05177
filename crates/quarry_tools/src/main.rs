//! quarry CLI
//!
//! Command-line access to grammar validation, analysis, parsing, profiling
//! and code generation.

use clap::Parser;
use quarry_tools::cli::Cli;
use std::io::Write;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    quarry_tools::init_logging(cli.verbose);

    let out = quarry_tools::run(&cli)?;
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(out.as_bytes());
    let _ = stdout.flush();
    Ok(())
}
