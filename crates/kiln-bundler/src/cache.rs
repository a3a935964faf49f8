//! Per-session build cache.
//!
//! Maps a module path to what the last successful pass learned about it. A
//! cache is created per build or watch session and handed to the builder
//! explicitly; passes work on a clone and the coordinator keeps the clone
//! only when the pass succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_graph::{ContentHash, ImportRecord, ModuleId, ModuleKind};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Hash of the raw bytes read from disk.
    pub hash: ContentHash,
    pub kind: ModuleKind,
    pub output: Arc<[u8]>,
    /// Scanned imports and what each one resolved to, in source order.
    pub imports: Arc<[(ImportRecord, ModuleId)]>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildCache {
    entries: FxHashMap<PathBuf, CacheEntry>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: PathBuf, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(path, entry)
    }

    pub fn remove(&mut self, path: &Path) -> Option<CacheEntry> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Drop every entry whose path fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.entries.retain(|path, _| keep(path));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
