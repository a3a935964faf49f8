use serde::{Deserialize, Serialize};

use crate::graph::ModuleIdx;

/// How an import is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// `import ... from`, `export ... from`, bare `import 'x'`, `require('x')`.
    Static,
    /// `import('x')`. A chunk boundary candidate.
    Dynamic,
}

impl ImportKind {
    pub fn is_static(&self) -> bool {
        matches!(self, ImportKind::Static)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ImportKind::Dynamic)
    }
}

/// An import found in a module's transformed output, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
}

impl ImportRecord {
    pub fn new(specifier: impl Into<String>, kind: ImportKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
        }
    }
}

/// A resolved outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdge {
    /// The specifier as written; the first one seen wins when deduplicating.
    pub specifier: String,
    pub kind: ImportKind,
    pub target: ModuleIdx,
}
