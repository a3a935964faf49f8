//! Top-level configuration structure and profile merging.
//!
//! For file discovery see [`crate::discovery`]; for layering defaults, files,
//! environment and CLI overrides see [`crate::loading`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dev::DevServerConfig;
use crate::error::{ConfigError, Result as ConfigResult};
use crate::module::ModuleOptions;
use crate::optimization::OptimizationOptions;
use crate::output::OutputOptions;
use crate::resolve::ResolveOptions;
use crate::settings::GlobalSettings;

/// Build mode.
///
/// Controls whether compression runs and which profile overrides apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
    None,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::None => "none",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            "none" => Ok(Mode::None),
            other => Err(ConfigError::InvalidValue {
                field: "mode".to_string(),
                hint: Some(format!(
                    "'{other}' is not a mode; use development, production or none"
                )),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    /// Entry name to source specifier, in declaration order.
    #[serde(default)]
    pub entry: IndexMap<String, String>,

    #[serde(default)]
    pub mode: Mode,

    /// Project root. Relative specifiers in `entry` and relative alias
    /// targets are interpreted against it.
    #[serde(default)]
    pub context: Option<PathBuf>,

    #[serde(default)]
    pub resolve: ResolveOptions,

    #[serde(default)]
    pub module: ModuleOptions,

    #[serde(default)]
    pub optimization: OptimizationOptions,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default, alias = "devServer")]
    pub dev_server: DevServerConfig,

    #[serde(default)]
    pub settings: GlobalSettings,

    /// Per-mode overrides, deep-merged over the rest of the config.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub profiles: HashMap<String, Value>,
}

impl KilnConfig {
    /// Create from a `serde_json::Value`.
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_config::KilnConfig;
    /// use serde_json::json;
    ///
    /// let config = KilnConfig::from_value(json!({
    ///     "entry": { "main": "./src/index.tsx" },
    ///     "mode": "development"
    /// }))
    /// .unwrap();
    /// assert_eq!(config.entry["main"], "./src/index.tsx");
    /// ```
    pub fn from_value(mut value: Value) -> ConfigResult<Self> {
        normalize_keys(&mut value);
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Apply the profile named after the current mode, if one exists.
    pub fn materialize_profile(self) -> ConfigResult<Self> {
        let name = self.mode.as_str().to_string();
        self.apply_profile(&name)
    }

    /// Deep-merge `profiles.<name>` over the config. The profile table
    /// itself is kept so a later mode switch can re-apply it.
    pub fn apply_profile(self, name: &str) -> ConfigResult<Self> {
        let Some(mut overrides) = self.profiles.get(name).cloned() else {
            return Ok(self);
        };
        if overrides.is_null() {
            return Ok(self);
        }
        if !overrides.is_object() {
            return Err(ConfigError::InvalidProfileOverride {
                message: format!("profile '{name}' must be a table"),
            });
        }

        normalize_keys(&mut overrides);
        let profiles = self.profiles.clone();
        let mut base = self.to_value()?;
        merge_values(&mut base, &overrides);
        let mut merged: KilnConfig =
            serde_json::from_value(base).map_err(|err| ConfigError::InvalidProfileOverride {
                message: err.to_string(),
            })?;
        merged.profiles = profiles;
        Ok(merged)
    }

    /// Project root, falling back to `fallback` when `context` is unset.
    /// A relative `context` is joined onto `fallback`.
    pub fn root(&self, fallback: &Path) -> PathBuf {
        match &self.context {
            Some(ctx) if ctx.is_absolute() => ctx.clone(),
            Some(ctx) => fallback.join(ctx),
            None => fallback.to_path_buf(),
        }
    }

    /// Whether `.gz` siblings should be written for emitted chunks.
    pub fn compression_enabled(&self) -> bool {
        self.output
            .compress
            .unwrap_or(self.mode == Mode::Production)
    }
}

/// Tables whose own keys are option names. Map-valued options nested in
/// them (`resolve.alias`, `resolve.paths`) hold user keys and stay as written.
const SECTIONS: &[&str] = &[
    "resolve",
    "module",
    "optimization",
    "output",
    "dev_server",
    "settings",
];

/// webpack spellings that differ from ours by more than case.
const SYNONYMS: &[(&str, &str)] = &[
    ("hash_digest_length", "hash_length"),
    ("asset_module_filename", "asset_filename"),
];

/// Rewrite camelCase option names (`publicPath`, `splitChunks`) to their
/// snake_case form in place, so layers written in either style merge onto
/// the same key. Entry names, alias keys and profile names are untouched.
pub fn normalize_keys(value: &mut Value) {
    let Value::Object(root) = value else {
        return;
    };
    snake_case_keys(root);
    for section in SECTIONS {
        if let Some(Value::Object(table)) = root.get_mut(*section) {
            snake_case_keys(table);
        }
    }
    if let Some(Value::Object(split)) = root
        .get_mut("optimization")
        .and_then(|o| o.get_mut("split_chunks"))
    {
        snake_case_keys(split);
    }
    if let Some(Value::Object(profiles)) = root.get_mut("profiles") {
        for profile in profiles.values_mut() {
            normalize_keys(profile);
        }
    }
}

fn snake_case_keys(table: &mut Map<String, Value>) {
    let renamed: Vec<(String, String)> = table
        .keys()
        .filter_map(|key| {
            let snake = to_snake_case(key);
            let snake = SYNONYMS
                .iter()
                .find(|(from, _)| *from == snake)
                .map_or(snake.clone(), |(_, to)| to.to_string());
            (snake != *key).then(|| (key.clone(), snake))
        })
        .collect();

    for (from, to) in renamed {
        if let Some(value) = table.remove(&from) {
            merge_values(table.entry(to).or_insert(Value::Null), &value);
        }
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Recursively merge `update` into `target`. Objects merge key by key,
/// everything else (arrays included) replaces.
pub fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}
