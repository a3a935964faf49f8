//! Pluggable config validation strategies.
//!
//! Schema validation checks the config in isolation; filesystem validation
//! additionally checks the project directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks).
///
/// # Example
///
/// ```
/// use kiln_config::{ConfigValidator, KilnConfig, SchemaValidator};
///
/// let mut config = KilnConfig::default();
/// config.entry.insert("main".into(), "./src/index.ts".into());
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()> {
        if config.entry.is_empty() {
            return Err(ConfigError::NoEntries);
        }
        for (name, specifier) in &config.entry {
            if name.trim().is_empty() || specifier.trim().is_empty() {
                return Err(schema_error(
                    "entry names and specifiers cannot be empty",
                    "Remove empty keys or values from [entry]",
                ));
            }
        }

        let mut seen = HashSet::new();
        for ext in &config.resolve.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(schema_error(
                    format!("resolve extension '{ext}' must start with '.'"),
                    "Write extensions as \".ts\", \".js\", ...",
                ));
            }
            if !seen.insert(ext.as_str()) {
                return Err(schema_error(
                    format!("resolve extension '{ext}' is listed twice"),
                    "Each extension may appear once; the list is a priority order",
                ));
            }
        }

        for (key, targets) in &config.resolve.paths {
            if key.matches('*').count() > 1 || targets.iter().any(|t| t.matches('*').count() > 1) {
                return Err(schema_error(
                    format!("paths entry '{key}' has more than one '*'"),
                    "Each paths key and target may contain at most one wildcard",
                ));
            }
        }

        for rule in &config.module.rules {
            compile(&rule.test, "module.rules.test")?;
            if let Some(exclude) = &rule.exclude {
                compile(exclude, "module.rules.exclude")?;
            }
        }
        compile(&config.output.compress_test, "output.compress_test")?;

        let split = &config.optimization.split_chunks;
        if split.min_reuse_count < 2 {
            return Err(schema_error(
                format!(
                    "min_reuse_count must be at least 2 (got {})",
                    split.min_reuse_count
                ),
                "A module reached by a single root is never shared",
            ));
        }

        if !(4..=64).contains(&config.output.hash_length) {
            return Err(schema_error(
                format!(
                    "hash_length {} is out of range (4 to 64)",
                    config.output.hash_length
                ),
                "Use a hash_length between 4 and 64",
            ));
        }

        for (field, pattern) in [
            ("output.filename", &config.output.filename),
            ("output.chunk_filename", &config.output.chunk_filename),
            ("output.vendor_filename", &config.output.vendor_filename),
        ] {
            if !pattern.contains("[name]") {
                return Err(schema_error(
                    format!("{field} must contain [name]"),
                    "Chunk filenames must be unique per chunk",
                ));
            }
        }

        if config.settings.parallel_jobs == Some(0) {
            return Err(schema_error(
                "parallel_jobs must be at least 1",
                "Omit parallel_jobs to use the CPU count",
            ));
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use).
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &KilnConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let root = config.root(&self.root);
        if !root.is_dir() {
            return Err(ConfigError::ContextNotFound { path: root });
        }
        Ok(())
    }
}

pub fn validate_schema(config: &KilnConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

fn compile(pattern: &str, field: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        hint: Some(format!("'{pattern}' is not a valid regular expression: {e}")),
    })
}

fn schema_error(message: impl Into<String>, hint: &str) -> ConfigError {
    ConfigError::SchemaValidation {
        message: message.into(),
        hint: Some(hint.to_string()),
    }
}
