use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::import::{ImportEdge, ImportKind};
use crate::module::{ContentHash, Module, ModuleKind};
use crate::module_id::ModuleId;
use crate::{Error, Result};

/// Index of a module in the graph arena.
///
/// Only valid for the graph that issued it and only until the next
/// [`ModuleGraph::evict_unreachable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdx(u32);

impl ModuleIdx {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ModuleIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Arena-backed module graph.
///
/// The graph is a plain owned value. Builders mutate a private copy and the
/// caller swaps it in once a pass succeeds, so readers never observe a
/// half-built graph.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    pub(crate) modules: Vec<Module>,
    pub(crate) index: FxHashMap<ModuleId, ModuleIdx>,
    pub(crate) entries: IndexMap<String, ModuleIdx>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module(&self, idx: ModuleIdx) -> &Module {
        &self.modules[idx.index()]
    }

    pub fn idx_of(&self, id: &ModuleId) -> Option<ModuleIdx> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &ModuleId) -> Option<&Module> {
        self.idx_of(id).map(|idx| self.module(idx))
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleIdx, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleIdx::new(i), m))
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.iter().map(|m| &m.id)
    }

    /// Named entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, ModuleIdx)> {
        self.entries.iter().map(|(name, idx)| (name.as_str(), *idx))
    }

    pub fn entry(&self, name: &str) -> Option<ModuleIdx> {
        self.entries.get(name).copied()
    }

    pub fn is_entry(&self, idx: ModuleIdx) -> bool {
        self.entries.values().any(|e| *e == idx)
    }

    /// Insert a module, or refresh the content of an existing one.
    ///
    /// Refreshing keeps the module's index, edges and importers; callers
    /// replace edges separately with [`Self::set_imports`].
    pub fn upsert_module(
        &mut self,
        id: ModuleId,
        kind: ModuleKind,
        hash: ContentHash,
        output: Arc<[u8]>,
    ) -> ModuleIdx {
        if let Some(idx) = self.idx_of(&id) {
            let module = &mut self.modules[idx.index()];
            module.kind = kind;
            module.hash = hash;
            module.output = output;
            return idx;
        }

        let idx = ModuleIdx::new(self.modules.len());
        self.index.insert(id.clone(), idx);
        self.modules.push(Module::new(id, kind, hash, output));
        idx
    }

    /// Replace a module's outgoing edges.
    ///
    /// Edges are kept in the given order and deduplicated on `(target, kind)`;
    /// a static and a dynamic import of the same module are distinct edges.
    /// Importer back-references of old and new targets are updated.
    pub fn set_imports(
        &mut self,
        from: ModuleIdx,
        edges: impl IntoIterator<Item = ImportEdge>,
    ) -> Result<()> {
        self.check(from)?;

        let mut seen: FxHashSet<(ModuleIdx, ImportKind)> = FxHashSet::default();
        let mut imports = Vec::new();
        for edge in edges {
            self.check(edge.target)?;
            if seen.insert((edge.target, edge.kind)) {
                imports.push(edge);
            }
        }

        let old = std::mem::take(&mut self.modules[from.index()].imports);
        for edge in &old {
            self.modules[edge.target.index()].importers.remove(&from);
        }
        for edge in &imports {
            self.modules[edge.target.index()].importers.insert(from);
        }
        self.modules[from.index()].imports = imports;
        Ok(())
    }

    pub fn set_entries(&mut self, entries: IndexMap<String, ModuleIdx>) -> Result<()> {
        for idx in entries.values() {
            self.check(*idx)?;
        }
        self.entries = entries;
        Ok(())
    }

    pub fn add_entry(&mut self, name: impl Into<String>, idx: ModuleIdx) -> Result<()> {
        self.check(idx)?;
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(Error::DuplicateEntry(name));
        }
        self.entries.insert(name, idx);
        Ok(())
    }

    fn check(&self, idx: ModuleIdx) -> Result<()> {
        if idx.index() < self.modules.len() {
            Ok(())
        } else {
            Err(Error::InvalidIndex(idx.index()))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a graph from `(name, [(target, kind)])` rows. The first row is
    /// the only entry unless more are added by the caller.
    pub fn graph(rows: &[(&str, &[(&str, ImportKind)])]) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        let mut ids = Vec::new();
        for (name, _) in rows {
            let id = ModuleId::new(format!("/proj/{name}.js")).unwrap();
            let idx = graph.upsert_module(
                id,
                ModuleKind::Script,
                ContentHash::of(name.as_bytes()),
                Arc::from(name.as_bytes()),
            );
            ids.push((*name, idx));
        }
        let lookup = |n: &str| ids.iter().find(|(name, _)| *name == n).unwrap().1;
        for (name, deps) in rows {
            let edges = deps.iter().map(|(t, kind)| ImportEdge {
                specifier: format!("./{t}"),
                kind: *kind,
                target: lookup(t),
            });
            graph.set_imports(lookup(name), edges).unwrap();
        }
        graph.add_entry(rows[0].0, lookup(rows[0].0)).unwrap();
        graph
    }

    pub fn idx(graph: &ModuleGraph, name: &str) -> ModuleIdx {
        graph
            .idx_of(&ModuleId::new(format!("/proj/{name}.js")).unwrap())
            .unwrap()
    }
}
