use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::ModuleIdx;
use crate::import::ImportEdge;
use crate::module_id::ModuleId;

/// BLAKE3 digest of a module's raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..12])
    }
}

/// Whether a module is executable code or an emitted file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    Script,
    Asset,
}

/// One resolved source file.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub kind: ModuleKind,
    /// Hash of the raw (pre-transform) bytes.
    pub hash: ContentHash,
    /// Transformed bytes.
    pub output: Arc<[u8]>,
    /// Outgoing edges in source order, deduplicated on `(target, kind)`.
    pub imports: Vec<ImportEdge>,
    /// Direct importers. Maintained by [`crate::ModuleGraph::set_imports`].
    pub importers: BTreeSet<ModuleIdx>,
}

impl Module {
    pub fn new(id: ModuleId, kind: ModuleKind, hash: ContentHash, output: Arc<[u8]>) -> Self {
        Self {
            id,
            kind,
            hash,
            output,
            imports: Vec::new(),
            importers: BTreeSet::new(),
        }
    }

    pub fn is_asset(&self) -> bool {
        self.kind == ModuleKind::Asset
    }

    pub fn static_imports(&self) -> impl Iterator<Item = &ImportEdge> {
        self.imports.iter().filter(|e| e.kind.is_static())
    }

    pub fn dynamic_imports(&self) -> impl Iterator<Item = &ImportEdge> {
        self.imports.iter().filter(|e| e.kind.is_dynamic())
    }
}
