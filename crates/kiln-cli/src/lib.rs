//! Kiln CLI - command-line front end for the kiln bundler.
//!
//! - [`cli`] - argument definitions (clap derive)
//! - [`commands`] - `build` and `watch`
//! - [`error`] - CLI errors and their miette rendering
//! - [`logger`] - tracing subscriber setup from the global flags
//! - [`ui`] - status lines and build summaries on stderr
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
