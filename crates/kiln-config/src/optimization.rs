//! Chunk splitting policy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizationOptions {
    #[serde(default, alias = "splitChunks")]
    pub split_chunks: SplitChunksConfig,
}

/// Which chunks shared-module extraction applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunksMode {
    #[default]
    All,
    Async,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitChunksConfig {
    #[serde(default)]
    pub chunks: ChunksMode,

    /// Minimum reuse before a module is extracted into a shared chunk. Reuse
    /// is the larger of the number of roots that reach the module and the
    /// number of modules that import it statically.
    #[serde(default = "default_min_reuse_count", alias = "minReuseCount")]
    pub min_reuse_count: usize,

    /// Path components that mark a module as third-party.
    #[serde(default = "default_vendor_test", alias = "vendorTest")]
    pub vendor_test: Vec<String>,
}

impl Default for SplitChunksConfig {
    fn default() -> Self {
        Self {
            chunks: ChunksMode::default(),
            min_reuse_count: default_min_reuse_count(),
            vendor_test: default_vendor_test(),
        }
    }
}

fn default_min_reuse_count() -> usize {
    2
}

fn default_vendor_test() -> Vec<String> {
    vec!["node_modules".to_string()]
}
