//! quarry tools - command-line front end for the quarry grammar engine
//!
//! Every subcommand reads a grammar file, runs one operation through a
//! [`quarry::Session`], and prints the report as text or JSON.

pub mod cli;
pub mod commands;
pub mod render;

pub use commands::run;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks the level for the
/// quarry crates (0 warn, 1 debug, 2 and up trace).
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,quarry={level},quarry_tools={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
