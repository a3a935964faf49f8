//! Command-line interface definition.
//!
//! - `kiln build` - one full build: graph, chunks, output and manifest
//! - `kiln watch` - initial build, then incremental rebuilds on change

mod commands;
pub mod enums;
#[cfg(test)]
mod tests;

use clap::Parser;

pub use commands::{BuildArgs, Command, ProjectArgs, WatchArgs};
pub use enums::ModeArg;

/// Kiln - a module bundler with content-hashed code splitting
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "A module bundler with content-hashed code splitting",
    long_about = "Kiln resolves and transforms a module graph from its entry points,\n\
                  splits it into entry, shared, vendor and async chunks, and writes\n\
                  content-hashed files plus a manifest. Watch mode rebuilds only what\n\
                  changed."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
