//! Layered configuration loading.
//!
//! Priority: CLI overrides > environment variables > config file > defaults.
//! The file is parsed directly so `entry` keeps its declaration order;
//! figment supplies the environment layer.

use std::path::{Path, PathBuf};

use figment::{Figment, providers::Env};
use serde_json::{Map, Value, json};

use crate::config::{KilnConfig, Mode, merge_values, normalize_keys};
use crate::discovery::{ConfigDiscovery, read_value};
use crate::error::{ConfigError, Result};

pub const DEFAULT_ENV_PREFIX: &str = "KILN_";

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub output_path: Option<PathBuf>,
    pub public_path: Option<String>,
}

impl Overrides {
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(mode) = self.mode {
            map.insert("mode".into(), json!(mode));
        }
        if self.output_path.is_some() || self.public_path.is_some() {
            let mut output = Map::new();
            if let Some(path) = &self.output_path {
                output.insert("path".into(), json!(path));
            }
            if let Some(public) = &self.public_path {
                output.insert("public_path".into(), json!(public));
            }
            map.insert("output".into(), Value::Object(output));
        }
        Value::Object(map)
    }
}

/// Drop prefixed variables that do not name a config section, such as a
/// `KILN_HOME` set for other tools. Keys inside a known section are kept and
/// still checked against the schema.
fn retain_known_sections(env: &mut Value) -> Result<()> {
    let Value::Object(env) = env else {
        return Ok(());
    };
    let known = KilnConfig::default().to_value()?;
    env.retain(|key, _| {
        let keep = key == "profiles" || known.get(key).is_some();
        if !keep {
            tracing::debug!(key = %key, "ignoring environment variable outside the config schema");
        }
        keep
    });
    Ok(())
}

pub struct ConfigLoader {
    root: PathBuf,
    file: Option<PathBuf>,
    overrides: Overrides,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            file: None,
            overrides: Overrides::default(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Use an explicit config file instead of discovery.
    pub fn file(mut self, path: Option<PathBuf>) -> Self {
        self.file = path;
        self
    }

    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load, layer and materialize the profile for the resulting mode.
    ///
    /// Nested keys in environment variables are separated by `__`, e.g.
    /// `KILN_OUTPUT__PUBLIC_PATH=/static/`.
    pub fn load(&self) -> Result<KilnConfig> {
        let path = match &self.file {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.root.join(p),
            None => ConfigDiscovery::new(&self.root)
                .find()
                .ok_or_else(|| ConfigError::NotFound {
                    root: self.root.clone(),
                })?,
        };
        tracing::debug!(path = %path.display(), "loading config file");

        let mut value = read_value(&path)?;
        if !value.is_object() {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                hint: Some(format!("{} must contain a table", path.display())),
            });
        }

        normalize_keys(&mut value);

        let mut env: Value = Figment::from(Env::prefixed(&self.env_prefix).split("__"))
            .extract()
            .map_err(|e| ConfigError::InvalidValue {
                field: "environment".to_string(),
                hint: Some(e.to_string()),
            })?;
        retain_known_sections(&mut env)?;
        merge_values(&mut value, &env);
        merge_values(&mut value, &self.overrides.to_value());

        let mut config = KilnConfig::from_value(value)?.materialize_profile()?;
        if config.context.is_none() {
            config.context = path.parent().map(Path::to_path_buf);
        }
        Ok(config)
    }
}
