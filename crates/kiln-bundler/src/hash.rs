//! Chunk serialization and content hashing.
//!
//! A chunk's bytes are its modules in execution order, each preceded by a
//! `//# module <path>` header with the path relative to the project root.
//! Asset modules are replaced by an `export default "<url>";` stub. Nothing
//! about other chunks (names, hashes) is embedded, so a chunk's hash moves
//! only when its own modules do.

use std::path::Path;

use kiln_graph::{ModuleGraph, ModuleIdx};
use rustc_hash::FxHashMap;

use crate::chunk::Chunk;

/// Serialize `chunk`. `asset_urls` maps asset modules to their public URL.
pub fn serialize_chunk(
    chunk: &Chunk,
    graph: &ModuleGraph,
    root: &Path,
    asset_urls: &FxHashMap<ModuleIdx, String>,
) -> Vec<u8> {
    let mut out = Vec::new();
    for idx in &chunk.modules {
        let module = graph.module(*idx);
        out.extend_from_slice(b"//# module ");
        out.extend_from_slice(module.id.relative_to(root).as_bytes());
        out.push(b'\n');
        match asset_urls.get(idx) {
            Some(url) if module.is_asset() => {
                out.extend_from_slice(asset_stub(url).as_bytes());
            }
            _ => out.extend_from_slice(&module.output),
        }
        out.push(b'\n');
    }
    out
}

/// The code an asset module contributes to its chunk.
pub fn asset_stub(url: &str) -> String {
    let quoted = serde_json::to_string(url).unwrap_or_else(|_| format!("\"{url}\""));
    format!("export default {quoted};")
}

/// BLAKE3 hex digest of `bytes`, truncated to `length` characters.
pub fn content_hash(bytes: &[u8], length: usize) -> String {
    let mut hex = blake3::hash(bytes).to_hex().to_string();
    hex.truncate(length.clamp(1, hex.len()));
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkId, ChunkKind};
    use kiln_graph::{ContentHash, ModuleId, ModuleKind};
    use std::sync::Arc;

    fn graph_with(modules: &[(&str, ModuleKind, &str)]) -> (ModuleGraph, Vec<ModuleIdx>) {
        let mut graph = ModuleGraph::new();
        let idxs = modules
            .iter()
            .map(|(path, kind, output)| {
                graph.upsert_module(
                    ModuleId::new(path).unwrap(),
                    *kind,
                    ContentHash::of(output.as_bytes()),
                    Arc::from(output.as_bytes()),
                )
            })
            .collect();
        (graph, idxs)
    }

    fn chunk(modules: Vec<ModuleIdx>) -> Chunk {
        Chunk {
            id: ChunkId::new(0),
            name: "main".into(),
            kind: ChunkKind::Entry,
            modules,
            requires: Vec::new(),
            loads: Vec::new(),
        }
    }

    #[test]
    fn serialization_uses_relative_headers() {
        let (graph, idxs) = graph_with(&[
            ("/proj/src/util.js", ModuleKind::Script, "export const x = 1;"),
            ("/proj/src/index.js", ModuleKind::Script, "import './util';"),
        ]);
        let bytes = serialize_chunk(&chunk(idxs), &graph, Path::new("/proj"), &FxHashMap::default());
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "//# module src/util.js\nexport const x = 1;\n//# module src/index.js\nimport './util';\n"
        );
    }

    #[test]
    fn assets_become_url_exports() {
        let (graph, idxs) = graph_with(&[("/proj/logo.png", ModuleKind::Asset, "\u{89}PNG")]);
        let mut urls = FxHashMap::default();
        urls.insert(idxs[0], "/static/media/logo.png".to_string());

        let bytes = serialize_chunk(&chunk(idxs), &graph, Path::new("/proj"), &urls);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "//# module logo.png\nexport default \"/static/media/logo.png\";\n"
        );
    }

    #[test]
    fn hash_is_truncated_and_stable() {
        let a = content_hash(b"chunk bytes", 8);
        assert_eq!(a.len(), 8);
        assert_eq!(a, content_hash(b"chunk bytes", 8));
        assert_ne!(a, content_hash(b"chunk bytes!", 8));
        assert_eq!(content_hash(b"x", 128).len(), 64);
    }
}
