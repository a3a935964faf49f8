//! Deterministic linear order over a possibly cyclic graph.

use std::fmt;

use serde::Serialize;

use crate::graph::{ModuleGraph, ModuleIdx};
use crate::module_id::ModuleId;

/// A static import cycle found while ordering. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleWarning {
    /// The cycle, starting and ending at the same module.
    pub modules: Vec<ModuleId>,
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.modules.iter().map(|m| m.path_string()).collect();
        write!(f, "import cycle: {}", parts.join(" -> "))
    }
}

#[derive(Debug, Clone)]
pub struct ExecOrder {
    /// Modules in execution order: dependencies before dependents.
    pub order: Vec<ModuleIdx>,
    pub cycles: Vec<CycleWarning>,
    positions: Vec<Option<usize>>,
}

impl ExecOrder {
    pub fn position(&self, idx: ModuleIdx) -> Option<usize> {
        self.positions.get(idx.index()).copied().flatten()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl ModuleGraph {
    /// Depth-first post-order from the entries in declaration order,
    /// following edges in source order. Edges into a module still on the
    /// stack are skipped; static ones are reported as cycles.
    pub fn exec_order(&self) -> ExecOrder {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut order = Vec::with_capacity(self.len());
        let mut cycles = Vec::new();
        let mut stack: Vec<(ModuleIdx, usize)> = Vec::new();

        for (_, root) in self.entries() {
            if marks[root.index()] != Mark::Unvisited {
                continue;
            }
            marks[root.index()] = Mark::OnStack;
            stack.push((root, 0));

            while let Some(top) = stack.len().checked_sub(1) {
                let (node, next) = stack[top];
                let Some(edge) = self.module(node).imports.get(next) else {
                    marks[node.index()] = Mark::Done;
                    order.push(node);
                    stack.pop();
                    continue;
                };
                stack[top].1 += 1;

                match marks[edge.target.index()] {
                    Mark::Unvisited => {
                        marks[edge.target.index()] = Mark::OnStack;
                        stack.push((edge.target, 0));
                    }
                    Mark::OnStack if edge.kind.is_static() => {
                        let start = stack
                            .iter()
                            .position(|(m, _)| *m == edge.target)
                            .unwrap_or(top);
                        let mut modules: Vec<ModuleId> = stack[start..]
                            .iter()
                            .map(|(m, _)| self.module(*m).id.clone())
                            .collect();
                        modules.push(self.module(edge.target).id.clone());
                        cycles.push(CycleWarning { modules });
                    }
                    _ => {}
                }
            }
        }

        let mut positions = vec![None; self.len()];
        for (pos, idx) in order.iter().enumerate() {
            positions[idx.index()] = Some(pos);
        }

        ExecOrder {
            order,
            cycles,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::test_support::*;
    use crate::import::ImportKind::*;

    fn names(graph: &crate::ModuleGraph) -> Vec<String> {
        graph
            .exec_order()
            .order
            .iter()
            .map(|i| graph.module(*i).id.stem().into_owned())
            .collect()
    }

    #[test]
    fn dependencies_precede_dependents() {
        let graph = graph(&[
            ("index", &[("a", Static), ("b", Static)]),
            ("a", &[("util", Static)]),
            ("b", &[("util", Static)]),
            ("util", &[]),
        ]);
        assert_eq!(names(&graph), vec!["util", "a", "b", "index"]);
        assert!(graph.exec_order().cycles.is_empty());
    }

    #[test]
    fn first_discovered_edge_breaks_cycle() {
        let graph = graph(&[
            ("index", &[("a", Static)]),
            ("a", &[("b", Static)]),
            ("b", &[("a", Static)]),
        ]);
        let order = graph.exec_order();
        assert_eq!(names(&graph), vec!["b", "a", "index"]);
        assert_eq!(order.cycles.len(), 1);
        let cycle: Vec<_> = order.cycles[0]
            .modules
            .iter()
            .map(|m| m.stem().into_owned())
            .collect();
        assert_eq!(cycle, vec!["a", "b", "a"]);
    }

    #[test]
    fn dynamic_back_edge_is_not_a_cycle_warning() {
        let graph = graph(&[
            ("index", &[("lazy", Dynamic)]),
            ("lazy", &[("index", Dynamic)]),
        ]);
        let order = graph.exec_order();
        assert!(order.cycles.is_empty());
        assert_eq!(order.order.len(), 2);
        assert_eq!(order.position(idx(&graph, "lazy")), Some(0));
    }
}
