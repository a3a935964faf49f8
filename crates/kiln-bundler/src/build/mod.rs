//! Module graph builder.
//!
//! Traversal runs breadth-first, one layer at a time. Every module in a layer
//! is a unit of work on a bounded pool; results are applied by the calling
//! task in path order, so the graph and cache have a single writer and the
//! outcome does not depend on worker scheduling.
//!
//! A full build is an incremental rebuild against an empty graph.

mod worker;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use kiln_config::KilnConfig;
use kiln_graph::{CycleWarning, DependencyChain, ImportEdge, ModuleGraph, ModuleId, ModuleIdx};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info_span, warn, Instrument};

use crate::cache::BuildCache;
use crate::cancel::CancellationToken;
use crate::loader::{LoaderPipeline, TransformRegistry};
use crate::resolve::Resolver;
use crate::{Error, Result};

use worker::{Unit, UnitFailure, UnitKind, UnitOutcome};

/// Everything a pass needs besides the graph and cache.
#[derive(Debug)]
pub struct BuildContext {
    pub root: PathBuf,
    pub resolver: Resolver,
    pub loader: LoaderPipeline,
    pub parallel_jobs: usize,
    pub module_timeout: Duration,
}

impl BuildContext {
    pub fn from_config(
        config: &KilnConfig,
        root: &Path,
        registry: &TransformRegistry,
    ) -> Result<Self> {
        let resolver = Resolver::new(root, &config.resolve).map_err(|error| Error::Resolution {
            error,
            chain: DependencyChain::default(),
        })?;
        let loader = LoaderPipeline::new(&config.module.rules, registry)?;
        Ok(Self {
            root: root.to_path_buf(),
            resolver,
            loader,
            parallel_jobs: config
                .settings
                .parallel_jobs
                .unwrap_or_else(num_cpus::get)
                .max(1),
            module_timeout: Duration::from_millis(config.settings.module_timeout_ms),
        })
    }
}

/// What changed on disk since the previous pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Paths to re-read. Only those whose hash moved are re-transformed.
    pub dirty: BTreeSet<PathBuf>,
    /// Re-resolve every module's specifiers. Set when files appear or
    /// disappear, since that can change what a specifier points at.
    pub reresolve: bool,
}

impl Invalidation {
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty() && !self.reresolve
    }
}

/// Result of one successful pass.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub graph: ModuleGraph,
    /// Modules whose output was produced by the loader in this pass.
    pub transformed: Vec<ModuleId>,
    /// Modules new to the graph.
    pub added: Vec<ModuleId>,
    /// Modules dropped because no entry reaches them anymore.
    pub evicted: Vec<ModuleId>,
    pub cycles: Vec<CycleWarning>,
}

pub struct GraphBuilder {
    ctx: Arc<BuildContext>,
    cancel: CancellationToken,
}

impl GraphBuilder {
    pub fn new(ctx: Arc<BuildContext>, cancel: CancellationToken) -> Self {
        Self { ctx, cancel }
    }

    /// Build a graph from scratch.
    pub async fn build(
        &self,
        entries: &IndexMap<String, String>,
        cache: &mut BuildCache,
    ) -> Result<BuildReport> {
        self.rebuild(&ModuleGraph::new(), entries, cache, &Invalidation::default())
            .await
    }

    /// Bring `previous` up to date with the filesystem.
    ///
    /// `previous` and `cache` are only read until the pass succeeds: the new
    /// graph is returned and the cache is updated in place only on `Ok`.
    pub async fn rebuild(
        &self,
        previous: &ModuleGraph,
        entries: &IndexMap<String, String>,
        cache: &mut BuildCache,
        invalidation: &Invalidation,
    ) -> Result<BuildReport> {
        let span = info_span!("build", entries = entries.len(), previous = previous.len());
        async {
            let mut pass = Pass::new(previous.clone(), cache.clone());
            self.run_pass(&mut pass, entries, invalidation).await?;
            let (report, next_cache) = pass.finish(previous);
            *cache = next_cache;
            Ok::<_, Error>(report)
        }
        .instrument(span)
        .await
    }

    async fn run_pass(
        &self,
        pass: &mut Pass,
        entries: &IndexMap<String, String>,
        invalidation: &Invalidation,
    ) -> Result<()> {
        let mut entry_ids = IndexMap::new();
        for (name, specifier) in entries {
            let id = self
                .ctx
                .resolver
                .resolve(&self.ctx.root, specifier)
                .map_err(|error| Error::Resolution {
                    error,
                    chain: DependencyChain::default(),
                })?;
            entry_ids.insert(name.clone(), id);
        }

        let mut frontier: Vec<Unit> = Vec::new();
        let mut queued: FxHashSet<ModuleId> = FxHashSet::default();
        for id in entry_ids.values() {
            if !pass.graph.contains(id) && queued.insert(id.clone()) {
                frontier.push(Unit {
                    id: id.clone(),
                    kind: UnitKind::Load,
                });
            }
        }
        for path in &invalidation.dirty {
            let Ok(id) = ModuleId::new(path) else {
                continue;
            };
            if pass.graph.contains(&id) && queued.insert(id.clone()) {
                frontier.push(Unit { id, kind: UnitKind::Load });
            }
        }
        if invalidation.reresolve {
            let rest: Vec<ModuleId> = pass
                .graph
                .module_ids()
                .filter(|id| !queued.contains(*id))
                .cloned()
                .collect();
            for id in rest {
                queued.insert(id.clone());
                frontier.push(Unit {
                    id,
                    kind: UnitKind::Reresolve,
                });
            }
        }

        let mut layer = 0usize;
        while !frontier.is_empty() {
            self.cancel.check()?;
            frontier.sort_by(|a, b| a.id.cmp(&b.id));
            debug!(layer, units = frontier.len(), "processing layer");

            let mut results = self
                .run_layer(frontier, &pass.cache, invalidation.reresolve)
                .await?;
            results.sort_by(|a, b| a.0.id.cmp(&b.0.id));

            let mut next = Vec::new();
            for (unit, result) in results {
                let outcome = result.map_err(|failure| pass.fail(&unit.id, failure, &self.ctx))?;
                for (_, target) in outcome.entry.imports.iter() {
                    if !pass.graph.contains(target) && queued.insert(target.clone()) {
                        pass.discovered_by.insert(target.clone(), unit.id.clone());
                        next.push(Unit {
                            id: target.clone(),
                            kind: UnitKind::Load,
                        });
                    }
                }
                pass.apply(unit.id, outcome);
            }
            frontier = next;
            layer += 1;
        }

        self.cancel.check()?;
        pass.link(&entry_ids)
    }

    async fn run_layer(
        &self,
        units: Vec<Unit>,
        cache: &BuildCache,
        force_resolve: bool,
    ) -> Result<Vec<(Unit, std::result::Result<UnitOutcome, UnitFailure>)>> {
        let semaphore = Arc::new(Semaphore::new(self.ctx.parallel_jobs));
        let mut join_set = JoinSet::new();
        let timeout = self.ctx.module_timeout;
        let count = units.len();

        for unit in units {
            let ctx = Arc::clone(&self.ctx);
            let cancel = self.cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            let cached = cache.get(unit.id.as_path()).cloned();

            join_set.spawn(async move {
                let result = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| UnitFailure::Panicked(e.to_string()))?;
                    if cancel.is_cancelled() {
                        return Err(UnitFailure::Cancelled);
                    }
                    let work = {
                        let unit = unit.clone();
                        tokio::task::spawn_blocking(move || {
                            worker::process(&ctx, &unit, cached, force_resolve)
                        })
                    };
                    match tokio::time::timeout(timeout, work).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(join_err)) => Err(UnitFailure::Panicked(join_err.to_string())),
                        Err(_) => Err(UnitFailure::Timeout),
                    }
                }
                .await;
                (unit, result)
            });
        }

        let mut results = Vec::with_capacity(count);
        while let Some(joined) = join_set.join_next().await {
            if self.cancel.is_cancelled() {
                join_set.abort_all();
                return Err(Error::Cancelled);
            }
            match joined {
                Ok(pair) => results.push(pair),
                Err(join_err) => return Err(Error::Worker(join_err.to_string())),
            }
        }
        Ok(results)
    }
}

/// Working copies for one pass. Dropped without a trace on failure.
struct Pass {
    graph: ModuleGraph,
    cache: BuildCache,
    /// Module that first led this pass to each newly loaded module.
    discovered_by: FxHashMap<ModuleId, ModuleId>,
    /// Modules whose import list was (re)computed this pass.
    touched: Vec<ModuleIdx>,
    transformed: Vec<ModuleId>,
}

impl Pass {
    fn new(graph: ModuleGraph, cache: BuildCache) -> Self {
        Self {
            graph,
            cache,
            discovered_by: FxHashMap::default(),
            touched: Vec::new(),
            transformed: Vec::new(),
        }
    }

    fn apply(&mut self, id: ModuleId, outcome: UnitOutcome) {
        let entry = outcome.entry;
        let idx = self.graph.upsert_module(
            id.clone(),
            entry.kind,
            entry.hash,
            Arc::clone(&entry.output),
        );
        if outcome.transformed {
            self.transformed.push(id.clone());
        }
        self.touched.push(idx);
        self.cache.insert(id.into_path(), entry);
    }

    /// Rewire edges of every touched module, then entries.
    fn link(&mut self, entry_ids: &IndexMap<String, ModuleId>) -> Result<()> {
        for idx in std::mem::take(&mut self.touched) {
            let id = self.graph.module(idx).id.clone();
            let Some(entry) = self.cache.get(id.as_path()) else {
                continue;
            };
            let mut edges = Vec::with_capacity(entry.imports.len());
            for (record, target) in entry.imports.iter() {
                let target = self
                    .graph
                    .idx_of(target)
                    .ok_or_else(|| kiln_graph::Error::UnknownModule(target.clone()))?;
                edges.push(ImportEdge {
                    specifier: record.specifier.clone(),
                    kind: record.kind,
                    target,
                });
            }
            self.graph.set_imports(idx, edges)?;
        }

        let mut entries = IndexMap::with_capacity(entry_ids.len());
        for (name, id) in entry_ids {
            let idx = self
                .graph
                .idx_of(id)
                .ok_or_else(|| kiln_graph::Error::UnknownModule(id.clone()))?;
            entries.insert(name.clone(), idx);
        }
        self.graph.set_entries(entries)?;
        Ok(())
    }

    fn finish(mut self, previous: &ModuleGraph) -> (BuildReport, BuildCache) {
        let evicted = self.graph.evict_unreachable();
        let graph = self.graph;
        let live: FxHashSet<&Path> = graph.module_ids().map(|id| id.as_path()).collect();
        self.cache.retain(|path| live.contains(path));

        let cycles = graph.exec_order().cycles;
        for cycle in &cycles {
            warn!("{cycle}");
        }

        let mut added: Vec<ModuleId> = graph
            .module_ids()
            .filter(|id| !previous.contains(id))
            .cloned()
            .collect();
        added.sort();
        let mut transformed = self.transformed;
        transformed.retain(|id| graph.contains(id));
        transformed.sort();

        debug!(
            modules = graph.len(),
            transformed = transformed.len(),
            added = added.len(),
            evicted = evicted.len(),
            "pass complete"
        );

        (
            BuildReport {
                graph,
                transformed,
                added,
                evicted,
                cycles,
            },
            self.cache,
        )
    }

    /// Attach the importer chain to a unit failure.
    fn fail(&self, id: &ModuleId, failure: UnitFailure, ctx: &BuildContext) -> Error {
        let chain = self.chain_to(id);
        let path = id.as_path().to_path_buf();
        match failure {
            UnitFailure::Read(source) => Error::Read {
                path,
                source,
                chain,
            },
            UnitFailure::Transform(error) => Error::Transform { error, chain },
            UnitFailure::Resolution(error) => Error::Resolution { error, chain },
            UnitFailure::Timeout => Error::LoadTimeout {
                path,
                timeout_ms: ctx.module_timeout.as_millis() as u64,
                chain,
            },
            UnitFailure::Cancelled => Error::Cancelled,
            UnitFailure::Panicked(message) => Error::Worker(format!("{}: {message}", path.display())),
        }
    }

    /// Entry to `id`, following this pass's discoveries back to a module the
    /// graph already knew, then the graph's own shortest chain to it.
    fn chain_to(&self, id: &ModuleId) -> DependencyChain {
        let mut tail = vec![id.clone()];
        let mut cursor = id;
        while let Some(parent) = self.discovered_by.get(cursor) {
            tail.push(parent.clone());
            cursor = parent;
        }
        tail.reverse();

        let head = self
            .graph
            .idx_of(&tail[0])
            .and_then(|idx| self.graph.chain_to(idx))
            .map(|chain| chain.path)
            .unwrap_or_default();

        let mut path: Vec<ModuleId> = head;
        if path.last() == tail.first() {
            path.pop();
        }
        path.extend(tail);
        DependencyChain::new(path)
    }
}
