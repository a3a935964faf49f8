//! Module resolution options.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveOptions {
    /// Extensions tried, in priority order, when a specifier has none.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Specifier prefix rewrites. Targets may be bare, relative to the
    /// project root, or absolute.
    #[serde(default)]
    pub alias: IndexMap<String, String>,

    /// tsconfig-style `paths` table. Keys and targets may hold one `*`.
    #[serde(default)]
    pub paths: IndexMap<String, Vec<String>>,

    /// Directory `paths` targets are relative to. Defaults to the project root.
    #[serde(default, alias = "baseUrl")]
    pub base_url: Option<PathBuf>,

    /// tsconfig whose `compilerOptions.paths` and `baseUrl` apply when
    /// `paths` is empty. Unset means `<root>/tsconfig.json` if it exists.
    #[serde(default)]
    pub tsconfig: Option<PathBuf>,

    /// Directory names searched upward for bare specifiers.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// package.json fields consulted, in order, when entering a package.
    #[serde(default = "default_main_fields", alias = "mainFields")]
    pub main_fields: Vec<String>,

    /// File stems tried inside a directory.
    #[serde(default = "default_main_files", alias = "mainFiles")]
    pub main_files: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            alias: IndexMap::new(),
            paths: IndexMap::new(),
            base_url: None,
            tsconfig: None,
            modules: default_modules(),
            main_fields: default_main_fields(),
            main_files: default_main_files(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    [".ts", ".tsx", ".js", ".jsx", ".json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_modules() -> Vec<String> {
    vec!["node_modules".to_string()]
}

fn default_main_fields() -> Vec<String> {
    vec![
        "browser".to_string(),
        "module".to_string(),
        "main".to_string(),
    ]
}

fn default_main_files() -> Vec<String> {
    vec!["index".to_string()]
}
