//! Importer chains for diagnostics: how did the build reach this module?

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::graph::{ModuleGraph, ModuleIdx};
use crate::module_id::ModuleId;

/// One path from an entry to a target module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyChain {
    pub path: Vec<ModuleId>,
    pub depth: usize,
}

impl DependencyChain {
    pub fn new(path: Vec<ModuleId>) -> Self {
        let depth = path.len().saturating_sub(1);
        Self { path, depth }
    }

    pub fn entry_point(&self) -> Option<&ModuleId> {
        self.path.first()
    }

    pub fn target(&self) -> Option<&ModuleId> {
        self.path.last()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Extend the chain by one module.
    pub fn then(mut self, id: ModuleId) -> Self {
        self.path.push(id);
        self.depth = self.path.len().saturating_sub(1);
        self
    }

    /// Example: "src/index.ts -> src/a.ts -> src/util.ts"
    pub fn format_chain(&self) -> String {
        self.path
            .iter()
            .map(|id| id.path_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl ModuleGraph {
    /// Shortest chain from any entry to `target`, preferring entries in
    /// declaration order and edges in source order.
    pub fn chain_to(&self, target: ModuleIdx) -> Option<DependencyChain> {
        let mut parent: Vec<Option<ModuleIdx>> = vec![None; self.len()];
        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::new();

        for (_, entry) in self.entries() {
            if !seen[entry.index()] {
                seen[entry.index()] = true;
                queue.push_back(entry);
            }
        }

        while let Some(current) = queue.pop_front() {
            if current == target {
                let mut path = vec![self.module(current).id.clone()];
                let mut cursor = current;
                while let Some(up) = parent[cursor.index()] {
                    path.push(self.module(up).id.clone());
                    cursor = up;
                }
                path.reverse();
                return Some(DependencyChain::new(path));
            }
            for edge in &self.module(current).imports {
                if !seen[edge.target.index()] {
                    seen[edge.target.index()] = true;
                    parent[edge.target.index()] = Some(current);
                    queue.push_back(edge.target);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::*;
    use crate::import::ImportKind::*;

    #[test]
    fn chain_follows_shortest_path() {
        let graph = graph(&[
            ("index", &[("a", Static), ("util", Static)]),
            ("a", &[("util", Static)]),
            ("util", &[]),
        ]);
        let chain = graph.chain_to(idx(&graph, "util")).unwrap();
        assert_eq!(chain.depth, 1);
        assert_eq!(chain.format_chain(), "/proj/index.js -> /proj/util.js");
    }

    #[test]
    fn unreachable_module_has_no_chain() {
        let mut graph = graph(&[("index", &[]), ("orphan", &[])]);
        let orphan = idx(&graph, "orphan");
        assert!(graph.chain_to(orphan).is_none());
        graph.evict_unreachable();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn then_extends_depth() {
        let chain = DependencyChain::new(vec![ModuleId::new("/p/a.ts").unwrap()])
            .then(ModuleId::new("/p/b.ts").unwrap());
        assert_eq!(chain.depth, 1);
        assert_eq!(chain.target().unwrap().stem(), "b");
    }
}
