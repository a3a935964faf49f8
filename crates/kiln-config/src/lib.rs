//! Configuration for the kiln build pipeline.
//!
//! A [`KilnConfig`] is assembled from defaults, a `kiln.toml` (or
//! `kiln.config.json`) file, `KILN_` environment variables and command line
//! overrides, then narrowed to the active [`Mode`] through its `profiles`
//! table. Library users can skip discovery entirely and build a config with
//! [`KilnConfig::from_value`].

pub mod config;
pub mod dev;
pub mod discovery;
pub mod error;
pub mod loading;
pub mod module;
pub mod optimization;
pub mod output;
pub mod resolve;
pub mod settings;
pub mod validation;

pub use config::*;
pub use dev::*;
pub use error::*;
pub use module::*;
pub use optimization::*;
pub use output::*;
pub use resolve::*;
pub use settings::*;

pub use discovery::ConfigDiscovery;
pub use loading::{ConfigLoader, Overrides};
pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_schema};
