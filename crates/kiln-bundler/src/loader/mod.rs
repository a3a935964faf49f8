//! Loader pipeline: rule matching, transform chains and import extraction.

pub mod scan;
pub mod transform;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::{RuleConfig, RuleKind};
use kiln_graph::{ImportRecord, ModuleKind};
use regex::Regex;
use thiserror::Error;

pub use scan::scan_imports;
pub use transform::{
    FnTransform, JsonModule, Passthrough, StripBom, TextModule, Transform, TransformRegistry,
};

/// A transform rejected its input.
#[derive(Debug, Clone, Error)]
#[error("transform '{stage}' failed for {}: {message}", path.display())]
pub struct TransformError {
    pub path: PathBuf,
    pub stage: String,
    pub message: String,
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub output: Vec<u8>,
    pub kind: ModuleKind,
    pub imports: Vec<ImportRecord>,
}

#[derive(Debug)]
struct CompiledRule {
    test: Regex,
    exclude: Option<Regex>,
    chain: Vec<Arc<dyn Transform>>,
    kind: ModuleKind,
}

impl CompiledRule {
    fn matches(&self, path: &str) -> bool {
        self.test.is_match(path) && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(path))
    }
}

/// Compiled `module.rules`.
///
/// Every matching rule contributes its transforms, in rule order. A module
/// is an asset if any matching rule says so; assets are not scanned for
/// imports.
#[derive(Debug, Default)]
pub struct LoaderPipeline {
    rules: Vec<CompiledRule>,
}

impl LoaderPipeline {
    pub fn new(rules: &[RuleConfig], registry: &TransformRegistry) -> crate::Result<Self> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| compile_rule(i, rule, registry))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Transform names that would run for `path`, in order.
    pub fn stages_for(&self, path: &Path) -> Vec<&str> {
        let text = path.to_string_lossy();
        self.rules
            .iter()
            .filter(|r| r.matches(&text))
            .flat_map(|r| r.chain.iter().map(|t| t.name()))
            .collect()
    }

    pub fn run(&self, source: &[u8], path: &Path) -> Result<Loaded, TransformError> {
        let text = path.to_string_lossy();
        let mut kind = ModuleKind::Script;
        let mut current = source.to_vec();

        for rule in self.rules.iter().filter(|r| r.matches(&text)) {
            if rule.kind == ModuleKind::Asset {
                kind = ModuleKind::Asset;
            }
            for stage in &rule.chain {
                current = stage
                    .transform(&current, path)
                    .map_err(|message| TransformError {
                        path: path.to_path_buf(),
                        stage: stage.name().to_string(),
                        message,
                    })?;
            }
        }

        let imports = match kind {
            ModuleKind::Script => scan_imports(&current),
            ModuleKind::Asset => Vec::new(),
        };
        Ok(Loaded {
            output: current,
            kind,
            imports,
        })
    }
}

fn compile_rule(
    index: usize,
    rule: &RuleConfig,
    registry: &TransformRegistry,
) -> crate::Result<CompiledRule> {
    let regex = |field: &str, pattern: &str| {
        Regex::new(pattern).map_err(|e| {
            crate::Error::InvalidConfig(format!("module.rules[{index}].{field}: {e}"))
        })
    };
    let test = regex("test", &rule.test)?;
    let exclude = rule
        .exclude
        .as_deref()
        .map(|p| regex("exclude", p))
        .transpose()?;
    let chain = rule
        .uses
        .iter()
        .map(|name| {
            registry.get(name).ok_or_else(|| {
                crate::Error::InvalidConfig(format!(
                    "module.rules[{index}] uses unknown transform '{name}' (registered: {})",
                    registry.names().join(", ")
                ))
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;
    let kind = match rule.kind {
        RuleKind::Script => ModuleKind::Script,
        RuleKind::Asset => ModuleKind::Asset,
    };
    Ok(CompiledRule {
        test,
        exclude,
        chain,
        kind,
    })
}
