//! Chunk graph: a partition of the module graph into deployable units.

mod split;
mod verify;

use std::fmt;

use kiln_graph::ModuleIdx;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub use split::{SplitPolicy, VendorClassifier, optimize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ChunkId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Entry,
    Async,
    Shared,
    /// Code several roots reach that the split policy left unextracted.
    Common,
    Vendor,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Entry => "entry",
            ChunkKind::Async => "async",
            ChunkKind::Shared => "shared",
            ChunkKind::Common => "common",
            ChunkKind::Vendor => "vendor",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    pub name: String,
    pub kind: ChunkKind,
    /// Modules in execution order.
    pub modules: Vec<ModuleIdx>,
    /// Chunks that must be loaded before this one runs, by id.
    pub requires: Vec<ChunkId>,
    /// Chunks this one may load on demand, by id.
    pub loads: Vec<ChunkId>,
}

/// Chunks plus their load-order edges.
///
/// Module indices refer to the [`kiln_graph::ModuleGraph`] the chunk graph
/// was built from.
#[derive(Debug, Clone, Default)]
pub struct ChunkGraph {
    chunks: Vec<Chunk>,
    owner: FxHashMap<ModuleIdx, ChunkId>,
    entries: Vec<(String, ChunkId)>,
}

impl ChunkGraph {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id.index()]
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_of(&self, module: ModuleIdx) -> Option<ChunkId> {
        self.owner.get(&module).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    /// Entry name and chunk, in declaration order.
    pub fn entry_chunks(&self) -> impl Iterator<Item = (&str, ChunkId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Every chunk `id` transitively requires, dependencies first, ending
    /// with `id` itself. Requires are followed in id order; a chunk already
    /// on the path is not revisited.
    pub fn load_order(&self, id: ChunkId) -> Vec<ChunkId> {
        let mut visited = vec![false; self.chunks.len()];
        let mut out = Vec::new();
        let mut stack = vec![(id, 0usize)];
        visited[id.index()] = true;

        while let Some((current, next)) = stack.pop() {
            let requires = &self.chunk(current).requires;
            if let Some(&dep) = requires.get(next) {
                stack.push((current, next + 1));
                if !visited[dep.index()] {
                    visited[dep.index()] = true;
                    stack.push((dep, 0));
                }
            } else {
                out.push(current);
            }
        }
        out
    }
}
