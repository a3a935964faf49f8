//! Shared, vendor and async chunk extraction.
//!
//! Roots are the entries in declaration order followed by the async roots
//! (dynamic import targets no entry reaches statically) in path order. Every
//! root owns a chunk. For each other module the set of roots whose static
//! closure contains it decides where it lands:
//!
//! - vendor modules go to one vendor chunk per distinct root set
//! - modules reused at least `min_reuse_count` times go to one shared chunk
//!   per distinct root set, together with dependencies only they import
//! - modules reached by several roots but not extracted go to one common
//!   chunk per distinct root set, so no root chunk ever carries code for
//!   another root
//! - everything else belongs to the single root that reaches it
//!
//! With [`ChunksMode::Async`], extraction only applies to modules reached
//! exclusively by async roots.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use kiln_config::{ChunksMode, SplitChunksConfig};
use kiln_graph::{ModuleGraph, ModuleIdx};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::{Chunk, ChunkGraph, ChunkId, ChunkKind, verify};
use crate::Result;

/// Decides which module paths are third-party code.
///
/// A pattern without a separator matches a whole path component
/// (`node_modules`); an absolute pattern matches a path prefix; any other
/// pattern matches a substring of the `/`-separated path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorClassifier {
    patterns: Vec<String>,
}

impl VendorClassifier {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_vendor(&self, path: &Path) -> bool {
        let text = path.to_string_lossy().replace('\\', "/");
        self.patterns.iter().any(|pattern| {
            if !pattern.contains('/') {
                path.components().any(|c| match c {
                    Component::Normal(part) => part == pattern.as_str(),
                    _ => false,
                })
            } else if Path::new(pattern).is_absolute() {
                path.starts_with(pattern)
            } else {
                text.contains(pattern.as_str())
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct SplitPolicy {
    pub chunks: ChunksMode,
    pub min_reuse_count: usize,
    pub vendor: VendorClassifier,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self::from_config(&SplitChunksConfig::default())
    }
}

impl SplitPolicy {
    pub fn from_config(config: &SplitChunksConfig) -> Self {
        Self {
            chunks: config.chunks,
            min_reuse_count: config.min_reuse_count.max(2),
            vendor: VendorClassifier::new(config.vendor_test.iter().cloned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    Entry,
    Async,
}

/// Where a non-root module goes before chunk ids exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Home {
    Root(usize),
    Shared(Vec<usize>),
    Common(Vec<usize>),
    Vendor(Vec<usize>),
}

/// Partition `graph` into chunks.
///
/// `root` is the project root, used to disambiguate async chunk names.
pub fn optimize(graph: &ModuleGraph, policy: &SplitPolicy, root: &Path) -> Result<ChunkGraph> {
    let mut roots: Vec<(ModuleIdx, RootKind)> = graph
        .entries()
        .map(|(_, idx)| (idx, RootKind::Entry))
        .collect();
    roots.extend(
        graph
            .async_roots()
            .into_iter()
            .map(|idx| (idx, RootKind::Async)),
    );

    let root_of: FxHashMap<ModuleIdx, usize> = roots
        .iter()
        .enumerate()
        .map(|(r, (idx, _))| (*idx, r))
        .collect();

    // Reaching-root sets, ascending by root index.
    let mut reach: Vec<Vec<usize>> = vec![Vec::new(); graph.len()];
    for (r, (idx, _)) in roots.iter().enumerate() {
        for module in graph.reachable_from([*idx], false).iter() {
            reach[module.index()].push(r);
        }
    }

    let eligible = |set: &[usize]| match policy.chunks {
        ChunksMode::All => true,
        ChunksMode::Async => set.iter().all(|r| roots[*r].1 == RootKind::Async),
    };

    let mut home: Vec<Option<Home>> = vec![None; graph.len()];
    for (idx, module) in graph.iter() {
        let set = reach[idx.index()].as_slice();
        if let Some(r) = root_of.get(&idx) {
            home[idx.index()] = Some(Home::Root(*r));
            continue;
        }
        let Some(first) = set.first() else {
            continue;
        };
        let importers = module
            .importers
            .iter()
            .filter(|i| {
                graph
                    .module(**i)
                    .static_imports()
                    .any(|edge| edge.target == idx)
            })
            .count();
        let reuse = set.len().max(importers);

        home[idx.index()] = Some(if eligible(set) && policy.vendor.is_vendor(module.id.as_path()) {
            Home::Vendor(set.to_vec())
        } else if eligible(set) && reuse >= policy.min_reuse_count {
            Home::Shared(set.to_vec())
        } else if set.len() > 1 {
            Home::Common(set.to_vec())
        } else {
            Home::Root(*first)
        });
    }

    absorb_exclusive_dependencies(graph, &root_of, &mut home);

    let order = graph.exec_order();
    let chunks = assemble(graph, &roots, home, root, |idx| {
        order.position(idx).unwrap_or(usize::MAX)
    });
    let chunk_graph = link(graph, chunks)?;
    verify::check(graph, &chunk_graph)?;

    debug!(
        chunks = chunk_graph.len(),
        modules = graph.len(),
        "chunk graph optimized"
    );
    Ok(chunk_graph)
}

/// Pull a root-owned module into a shared group when every module that
/// imports it statically already lives in that group. Repeats until stable
/// so whole private subtrees follow their shared parent.
fn absorb_exclusive_dependencies(
    graph: &ModuleGraph,
    root_of: &FxHashMap<ModuleIdx, usize>,
    home: &mut [Option<Home>],
) {
    let mut changed = true;
    while changed {
        changed = false;
        for (idx, module) in graph.iter() {
            if root_of.contains_key(&idx) || !matches!(home[idx.index()], Some(Home::Root(_))) {
                continue;
            }
            let mut group: Option<&Home> = None;
            let mut exclusive = true;
            for importer in &module.importers {
                let statically = graph
                    .module(*importer)
                    .static_imports()
                    .any(|edge| edge.target == idx);
                if !statically {
                    continue;
                }
                match (&home[importer.index()], group) {
                    (Some(h @ Home::Shared(_)), None) => group = Some(h),
                    (Some(h), Some(g)) if h == g => {}
                    _ => {
                        exclusive = false;
                        break;
                    }
                }
            }
            let adopted = group.filter(|_| exclusive).cloned();
            if let Some(group) = adopted {
                home[idx.index()] = Some(group);
                changed = true;
            }
        }
    }
}

struct Draft {
    name: String,
    kind: ChunkKind,
    modules: Vec<ModuleIdx>,
}

fn assemble(
    graph: &ModuleGraph,
    roots: &[(ModuleIdx, RootKind)],
    home: Vec<Option<Home>>,
    project_root: &Path,
    position: impl Fn(ModuleIdx) -> usize,
) -> Vec<Draft> {
    let mut by_root: Vec<Vec<ModuleIdx>> = vec![Vec::new(); roots.len()];
    let mut shared: BTreeMap<Vec<usize>, Vec<ModuleIdx>> = BTreeMap::new();
    let mut common: BTreeMap<Vec<usize>, Vec<ModuleIdx>> = BTreeMap::new();
    let mut vendor: BTreeMap<Vec<usize>, Vec<ModuleIdx>> = BTreeMap::new();

    for (i, h) in home.into_iter().enumerate() {
        let idx = ModuleIdx::new(i);
        match h {
            Some(Home::Root(r)) => by_root[r].push(idx),
            Some(Home::Shared(set)) => shared.entry(set).or_default().push(idx),
            Some(Home::Common(set)) => common.entry(set).or_default().push(idx),
            Some(Home::Vendor(set)) => vendor.entry(set).or_default().push(idx),
            None => {}
        }
    }

    // Entry names are fixed; generated names are numbered past them.
    let entry_names: Vec<&str> = graph.entries().map(|(name, _)| name).collect();
    let mut names = ChunkNames::new(entry_names.iter().copied());
    let mut groups: Vec<(String, ChunkKind, Vec<ModuleIdx>)> = Vec::new();
    for (prefix, kind, sets) in [
        ("shared", ChunkKind::Shared, shared),
        ("common", ChunkKind::Common, common),
        ("vendor", ChunkKind::Vendor, vendor),
    ] {
        let mut counter = 1;
        for modules in sets.into_values() {
            groups.push((names.numbered(prefix, &mut counter), kind, modules));
        }
    }

    let async_stems: Vec<String> = roots
        .iter()
        .filter(|(_, kind)| *kind == RootKind::Async)
        .map(|(idx, _)| graph.module(*idx).id.stem().into_owned())
        .collect();

    let mut drafts = Vec::with_capacity(roots.len() + groups.len());
    let mut async_seen = 0usize;
    for (r, (idx, kind)) in roots.iter().enumerate() {
        let name = match kind {
            RootKind::Entry => entry_names[r].to_string(),
            RootKind::Async => {
                let stem = &async_stems[async_seen];
                async_seen += 1;
                let collides = names.is_taken(stem)
                    || async_stems.iter().filter(|s| *s == stem).count() > 1;
                if collides {
                    names.unique(path_chunk_name(project_root, graph.module(*idx).id.as_path()))
                } else {
                    names.unique(stem.clone())
                }
            }
        };
        drafts.push(Draft {
            name,
            kind: match kind {
                RootKind::Entry => ChunkKind::Entry,
                RootKind::Async => ChunkKind::Async,
            },
            modules: std::mem::take(&mut by_root[r]),
        });
    }
    for (name, kind, modules) in groups {
        drafts.push(Draft {
            name,
            kind,
            modules,
        });
    }

    for draft in &mut drafts {
        draft.modules.sort_by_key(|idx| position(*idx));
    }
    drafts
}

/// Names already handed out to chunks of one graph.
struct ChunkNames {
    taken: FxHashSet<String>,
}

impl ChunkNames {
    fn new<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            taken: reserved.into_iter().map(str::to_string).collect(),
        }
    }

    fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// `<prefix>-<counter>`, advancing `counter` past names in use.
    fn numbered(&mut self, prefix: &str, counter: &mut usize) -> String {
        loop {
            let name = format!("{prefix}-{counter}");
            *counter += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    /// `preferred`, or `preferred-2`, `preferred-3`, ... when it is in use.
    fn unique(&mut self, preferred: String) -> String {
        if self.taken.insert(preferred.clone()) {
            return preferred;
        }
        let mut n = 2;
        loop {
            let name = format!("{preferred}-{n}");
            if self.taken.insert(name.clone()) {
                return name;
            }
            n += 1;
        }
    }
}

/// `src/pages/about/index.ts` relative to the root becomes
/// `src_pages_about_index`.
fn path_chunk_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Assign ids and derive load-order edges from cross-chunk imports.
fn link(graph: &ModuleGraph, drafts: Vec<Draft>) -> Result<ChunkGraph> {
    let mut owner = FxHashMap::default();
    for (i, draft) in drafts.iter().enumerate() {
        for idx in &draft.modules {
            if owner.insert(*idx, ChunkId::new(i)).is_some() {
                return Err(crate::Error::ChunkingInvariantViolation(format!(
                    "{} assigned to more than one chunk",
                    graph.module(*idx).id
                )));
            }
        }
    }

    let mut chunks = Vec::with_capacity(drafts.len());
    for (i, draft) in drafts.into_iter().enumerate() {
        let id = ChunkId::new(i);
        let mut requires = Vec::new();
        let mut loads = Vec::new();
        for idx in &draft.modules {
            for edge in &graph.module(*idx).imports {
                let Some(target) = owner.get(&edge.target).copied() else {
                    continue;
                };
                if target == id {
                    continue;
                }
                if edge.kind.is_static() {
                    requires.push(target);
                } else {
                    loads.push(target);
                }
            }
        }
        requires.sort();
        requires.dedup();
        loads.sort();
        loads.dedup();
        loads.retain(|c| !requires.contains(c));

        chunks.push(Chunk {
            id,
            name: draft.name,
            kind: draft.kind,
            modules: draft.modules,
            requires,
            loads,
        });
    }

    let entries = graph
        .entries()
        .enumerate()
        .map(|(i, (name, _))| (name.to_string(), ChunkId::new(i)))
        .collect();

    Ok(ChunkGraph {
        chunks,
        owner,
        entries,
    })
}
