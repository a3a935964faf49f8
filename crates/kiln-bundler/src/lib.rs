#![cfg_attr(docsrs, feature(doc_cfg))]
//! # kiln-bundler
//!
//! The build core of kiln: resolve specifiers, run loader chains, build the
//! module graph, split it into chunks, hash and emit them with a manifest,
//! and keep all of that up to date as files change.
//!
//! ```text
//!  entries ──▶ Resolver ──▶ LoaderPipeline ──▶ GraphBuilder ──▶ ModuleGraph
//!                                                                  │
//!  Manifest ◀── Emitter ◀── content_hash ◀── optimize ◀────────────┘
//!      ▲
//!      └── Coordinator (watch, debounce, cancel, rebuild)
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use kiln_bundler::Pipeline;
//! use kiln_config::ConfigDiscovery;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigDiscovery::new(".").load()?;
//! let pipeline = Pipeline::new(&config, std::path::Path::new("."))?;
//! let output = pipeline.build().await?;
//! println!("{}", output.manifest.to_json()?);
//! # Ok(()) }
//! ```

pub use kiln_graph;

pub mod build;
pub mod cache;
pub mod cancel;
pub mod chunk;
pub mod coordinator;
pub mod emit;
pub mod hash;
pub mod loader;
pub mod pipeline;
pub mod resolve;
pub mod tsconfig;

#[cfg(test)]
pub(crate) mod test_utils;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use build::{BuildContext, BuildReport, GraphBuilder, Invalidation};
pub use cache::{BuildCache, CacheEntry};
pub use cancel::CancellationToken;
pub use chunk::{Chunk, ChunkGraph, ChunkId, ChunkKind, SplitPolicy, VendorClassifier, optimize};
pub use coordinator::{BuildEvent, Coordinator, FileChange, FileWatcher, ModuleState};
pub use emit::{
    ChunkManifest, EmitError, EmitOptions, EmitPlan, Emitter, Manifest, ManifestDelta,
    WriteSummary,
};
pub use loader::{LoaderPipeline, Transform, TransformError, TransformRegistry};
pub use pipeline::{BuildOutput, Pipeline};
pub use resolve::{ResolutionError, Resolver};
pub use tsconfig::TsPaths;

use std::path::{Path, PathBuf};

use kiln_config::ConfigError;
use kiln_graph::DependencyChain;
use serde::{Deserialize, Serialize};

/// Build stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Config,
    Resolve,
    Load,
    Graph,
    Chunk,
    Emit,
    Cancelled,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::Config => "config",
            BuildStage::Resolve => "resolve",
            BuildStage::Load => "load",
            BuildStage::Graph => "graph",
            BuildStage::Chunk => "chunk",
            BuildStage::Emit => "emit",
            BuildStage::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for kiln-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A specifier could not be resolved.
    #[error("{error}{}", via(chain))]
    Resolution {
        error: ResolutionError,
        chain: DependencyChain,
    },

    /// A loader stage rejected a module.
    #[error("{error}{}", via(chain))]
    Transform {
        error: TransformError,
        chain: DependencyChain,
    },

    /// A module file could not be read.
    #[error("failed to read {}: {source}{}", path.display(), via(chain))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        chain: DependencyChain,
    },

    /// Loading a module took longer than `settings.module_timeout_ms`.
    #[error("loading {} exceeded {timeout_ms}ms{}", path.display(), via(chain))]
    LoadTimeout {
        path: PathBuf,
        timeout_ms: u64,
        chain: DependencyChain,
    },

    /// The chunk partition broke one of its own guarantees.
    #[error("chunking invariant violated: {0}")]
    ChunkingInvariantViolation(String),

    #[error(transparent)]
    Emit(#[from] emit::EmitError),

    /// The pass was superseded by a newer change.
    #[error("build cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("graph error: {0}")]
    Graph(#[from] kiln_graph::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker task failed outside of the module it was processing.
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Result type alias for kiln-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

fn via(chain: &DependencyChain) -> String {
    if chain.path.len() < 2 {
        String::new()
    } else {
        format!(" (via {})", chain.format_chain())
    }
}

impl Error {
    pub fn stage(&self) -> BuildStage {
        match self {
            Error::Resolution { .. } => BuildStage::Resolve,
            Error::Transform { .. } | Error::Read { .. } | Error::LoadTimeout { .. } => {
                BuildStage::Load
            }
            Error::Graph(_) | Error::Worker(_) => BuildStage::Graph,
            Error::ChunkingInvariantViolation(_) => BuildStage::Chunk,
            Error::Emit(_) => BuildStage::Emit,
            Error::Cancelled => BuildStage::Cancelled,
            Error::Config(_) | Error::InvalidConfig(_) => BuildStage::Config,
        }
    }

    /// Importer chain from an entry to the failing module, if known.
    pub fn chain(&self) -> Option<&DependencyChain> {
        match self {
            Error::Resolution { chain, .. }
            | Error::Transform { chain, .. }
            | Error::Read { chain, .. }
            | Error::LoadTimeout { chain, .. } => Some(chain),
            _ => None,
        }
    }

    /// The file the error is about, if any.
    pub fn failed_path(&self) -> Option<&Path> {
        match self {
            Error::Transform { error, .. } => Some(&error.path),
            Error::Read { path, .. } | Error::LoadTimeout { path, .. } => Some(path),
            Error::Resolution {
                error: ResolutionError::NotFound { importer, .. },
                ..
            } => Some(importer),
            Error::Resolution { chain, .. } => chain.target().map(|id| id.as_path()),
            Error::Emit(e) => e.path(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Resolution { .. } => "RESOLUTION_ERROR",
            Error::Transform { .. } => "TRANSFORM_ERROR",
            Error::Read { .. } => "READ_ERROR",
            Error::LoadTimeout { .. } => "LOAD_TIMEOUT",
            Error::ChunkingInvariantViolation(_) => "CHUNKING_INVARIANT",
            Error::Emit(_) => "EMIT_ERROR",
            Error::Cancelled => "CANCELLED",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Graph(_) => "GRAPH_ERROR",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Worker(_) => "WORKER_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self {
            Error::Cancelled => miette::Severity::Advice,
            _ => miette::Severity::Error,
        })
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Resolution {
                error: ResolutionError::NotFound { tried, .. },
                ..
            } if !tried.is_empty() => Some(Box::new(format!(
                "Tried:\n{}",
                tried
                    .iter()
                    .map(|p| format!("  {}", p.display()))
                    .collect::<Vec<_>>()
                    .join("\n")
            ))),
            Error::Resolution {
                error: ResolutionError::AmbiguousExtension { .. },
                ..
            } => Some(Box::new("Remove the duplicate from resolve.extensions")),
            Error::Resolution {
                error: ResolutionError::InvalidTsConfig { .. },
                ..
            } => Some(Box::new(
                "Fix the tsconfig file, or point resolve.tsconfig at another one",
            )),
            Error::LoadTimeout { .. } => Some(Box::new(
                "Raise settings.module_timeout_ms or check the loader chain for this file",
            )),
            Error::Config(e) => e.hint().map(|h| Box::new(h) as Box<dyn std::fmt::Display + '_>),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration file for syntax errors.\nError: {msg}"
            ))),
            Error::Emit(emit::EmitError::AssetCollision { .. }) => Some(Box::new(
                "Add [contenthash] to output.asset_filename so distinct assets get distinct names",
            )),
            Error::ChunkingInvariantViolation(_) => {
                Some(Box::new("This is a bug in kiln; please report it"))
            }
            _ => None,
        }
    }
}
