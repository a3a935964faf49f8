//! Global settings shared across modes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    #[serde(default, alias = "logLevel")]
    pub log_level: Option<String>,

    /// Upper bound on concurrently loading modules. Defaults to the CPU count.
    #[serde(default, alias = "parallelJobs")]
    pub parallel_jobs: Option<usize>,

    /// Per-module budget for read + transform + resolve.
    #[serde(default = "default_module_timeout_ms", alias = "moduleTimeoutMs")]
    pub module_timeout_ms: u64,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_level: None,
            parallel_jobs: None,
            module_timeout_ms: default_module_timeout_ms(),
        }
    }
}

fn default_module_timeout_ms() -> u64 {
    30_000
}
