//! Watch-mode and dev-server options.
//!
//! Host, port and fallback are only carried through for the external
//! transport; the build core reads `debounce_ms` and `watch_ignore`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    /// Serve the entry document for unknown paths.
    #[serde(default = "default_true", alias = "historyApiFallback")]
    pub history_api_fallback: bool,

    /// Show build errors as an overlay in the browser.
    #[serde(default = "default_true")]
    pub overlay: bool,

    #[serde(default = "default_debounce_ms", alias = "debounceMs")]
    pub debounce_ms: u64,

    /// Extra path fragments the watcher ignores.
    #[serde(default, alias = "watchIgnore")]
    pub watch_ignore: Vec<String>,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            history_api_fallback: true,
            overlay: true,
            debounce_ms: default_debounce_ms(),
            watch_ignore: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    50
}
