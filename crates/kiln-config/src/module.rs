//! Loader rules: which transforms apply to which files.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleOptions {
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// One `module.rules` entry.
///
/// Every rule whose `test` matches (and whose `exclude` does not) contributes
/// its `use` chain, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Regular expression matched against the absolute module path.
    pub test: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// Names of registered transforms, applied in order.
    #[serde(default, rename = "use")]
    pub uses: Vec<String>,

    #[serde(default, rename = "type")]
    pub kind: RuleKind,
}

/// How matched modules are treated after transformation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Scanned for imports and serialized into a chunk.
    #[default]
    Script,
    /// Copied to the media directory; importers receive its public URL.
    Asset,
}

fn default_rules() -> Vec<RuleConfig> {
    vec![RuleConfig {
        test: r"\.json$".to_string(),
        exclude: None,
        uses: vec!["json".to_string()],
        kind: RuleKind::Script,
    }]
}
