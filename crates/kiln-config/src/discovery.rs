//! File-based config discovery for CLI use.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

/// Searches a project root for a kiln configuration file.
///
/// Library users that already hold a config value should call
/// [`KilnConfig::from_value`] instead.
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory.
    ///
    /// Searches in this order:
    /// 1. `kiln.toml`
    /// 2. `kiln.config.json`
    /// 3. `package.json` with a `kiln` field
    pub fn find(&self) -> Option<PathBuf> {
        for name in ["kiln.toml", "kiln.config.json"] {
            let path = self.root.join(name);
            if path.is_file() {
                return Some(path);
            }
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed: Value = serde_json::from_str(&content).ok()?;
        match parsed.get("kiln") {
            Some(v) if !v.is_null() => Some(pkg_path),
            _ => None,
        }
    }

    /// Load and parse the discovered file, without layering or profiles.
    pub fn load(&self) -> Result<KilnConfig> {
        let path = self.find().ok_or_else(|| ConfigError::NotFound {
            root: self.root.clone(),
        })?;
        KilnConfig::from_value(read_value(&path)?)
    }
}

/// Read a config file into an order-preserving JSON value.
pub fn read_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if file_name == "package.json" {
        let mut parsed: Value =
            serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
        return match parsed.get_mut("kiln").map(Value::take) {
            Some(v) if v.is_object() => Ok(v),
            _ => Err(ConfigError::InvalidValue {
                field: "kiln".to_string(),
                hint: Some("Add a 'kiln' object to your package.json".to_string()),
            }),
        };
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}
