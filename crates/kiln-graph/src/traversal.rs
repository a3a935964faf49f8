//! Reachability queries and eviction.

use std::collections::VecDeque;

use crate::graph::{ModuleGraph, ModuleIdx};
use crate::module_id::ModuleId;

/// Set of modules reached by a traversal, indexed by [`ModuleIdx`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachability {
    marks: Vec<bool>,
}

impl Reachability {
    pub fn contains(&self, idx: ModuleIdx) -> bool {
        self.marks.get(idx.index()).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.marks.iter().filter(|m| **m).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = ModuleIdx> + '_ {
        self.marks
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(|(i, _)| ModuleIdx::new(i))
    }
}

impl ModuleGraph {
    /// Breadth-first reachability from `roots`. Dynamic edges are followed
    /// only when `follow_dynamic` is set.
    pub fn reachable_from(
        &self,
        roots: impl IntoIterator<Item = ModuleIdx>,
        follow_dynamic: bool,
    ) -> Reachability {
        let mut marks = vec![false; self.len()];
        let mut queue = VecDeque::new();
        for root in roots {
            if !marks[root.index()] {
                marks[root.index()] = true;
                queue.push_back(root);
            }
        }

        while let Some(current) = queue.pop_front() {
            for edge in &self.module(current).imports {
                if !follow_dynamic && edge.kind.is_dynamic() {
                    continue;
                }
                if !marks[edge.target.index()] {
                    marks[edge.target.index()] = true;
                    queue.push_back(edge.target);
                }
            }
        }

        Reachability { marks }
    }

    /// Every module reachable from an entry through any edge.
    pub fn reachable_from_entries(&self) -> Reachability {
        let roots: Vec<_> = self.entries().map(|(_, idx)| idx).collect();
        self.reachable_from(roots, true)
    }

    /// Targets of dynamic imports that no entry reaches statically, sorted
    /// by path. Each one seeds its own async chunk.
    pub fn async_roots(&self) -> Vec<ModuleIdx> {
        let entries: Vec<_> = self.entries().map(|(_, idx)| idx).collect();
        let statically = self.reachable_from(entries.iter().copied(), false);
        let all = self.reachable_from(entries, true);

        let mut roots: Vec<ModuleIdx> = all
            .iter()
            .flat_map(|idx| self.module(idx).dynamic_imports())
            .map(|edge| edge.target)
            .filter(|target| !statically.contains(*target))
            .collect();
        roots.sort_by(|a, b| self.module(*a).id.cmp(&self.module(*b).id));
        roots.dedup();
        roots
    }

    /// All modules that import `idx`, directly or transitively.
    pub fn transitive_importers(&self, idx: ModuleIdx) -> Vec<ModuleIdx> {
        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::from([idx]);
        seen[idx.index()] = true;
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for importer in &self.module(current).importers {
                if !seen[importer.index()] {
                    seen[importer.index()] = true;
                    out.push(*importer);
                    queue.push_back(*importer);
                }
            }
        }
        out
    }

    /// Drop every module no entry reaches and compact the arena.
    ///
    /// All [`ModuleIdx`] values issued before the call are invalidated.
    /// Returns the evicted ids in path order.
    pub fn evict_unreachable(&mut self) -> Vec<ModuleId> {
        let live = self.reachable_from_entries();
        if live.count() == self.len() {
            return Vec::new();
        }

        let mut remap: Vec<Option<ModuleIdx>> = vec![None; self.len()];
        let mut kept = Vec::with_capacity(live.count());
        let mut evicted = Vec::new();
        for (i, module) in std::mem::take(&mut self.modules).into_iter().enumerate() {
            if live.contains(ModuleIdx::new(i)) {
                remap[i] = Some(ModuleIdx::new(kept.len()));
                kept.push(module);
            } else {
                evicted.push(module.id);
            }
        }

        for module in &mut kept {
            module.imports.retain_mut(|edge| match remap[edge.target.index()] {
                Some(new) => {
                    edge.target = new;
                    true
                }
                None => false,
            });
            module.importers = module
                .importers
                .iter()
                .filter_map(|i| remap[i.index()])
                .collect();
        }

        for idx in self.entries.values_mut() {
            if let Some(new) = remap[idx.index()] {
                *idx = new;
            }
        }

        self.index = kept
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), ModuleIdx::new(i)))
            .collect();
        self.modules = kept;

        evicted.sort();
        evicted
    }
}
