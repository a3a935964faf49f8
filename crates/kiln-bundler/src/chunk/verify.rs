//! Post-construction checks on a chunk graph.

use kiln_graph::ModuleGraph;

use super::ChunkGraph;
use crate::{Error, Result};

/// The chunks must partition the graph's modules exactly, and every static
/// import that crosses chunks must be covered by a `requires` edge.
pub(super) fn check(graph: &ModuleGraph, chunks: &ChunkGraph) -> Result<()> {
    let mut seen = vec![false; graph.len()];
    for chunk in chunks.chunks() {
        if chunk.modules.is_empty() {
            return Err(violation(format!("chunk '{}' is empty", chunk.name)));
        }
        for idx in &chunk.modules {
            if std::mem::replace(&mut seen[idx.index()], true) {
                return Err(violation(format!(
                    "{} appears in more than one chunk",
                    graph.module(*idx).id
                )));
            }
        }
    }
    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(violation(format!(
            "{} is not in any chunk",
            graph.module(kiln_graph::ModuleIdx::new(missing)).id
        )));
    }

    for chunk in chunks.chunks() {
        for idx in &chunk.modules {
            for edge in graph.module(*idx).static_imports() {
                let Some(target) = chunks.chunk_of(edge.target) else {
                    continue;
                };
                if target != chunk.id && !chunk.requires.contains(&target) {
                    return Err(violation(format!(
                        "chunk '{}' imports {} from '{}' without requiring it",
                        chunk.name,
                        graph.module(edge.target).id,
                        chunks.chunk(target).name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn violation(message: String) -> Error {
    Error::ChunkingInvariantViolation(message)
}
