//! One build from entries to manifest.
//!
//! [`Pipeline`] owns everything derived from the configuration and runs the
//! stages in order: graph, chunks, plan, write. The CLI uses it for one-shot
//! builds; the [`Coordinator`](crate::Coordinator) drives it for rebuilds.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use kiln_config::{ConfigError, KilnConfig};
use kiln_graph::{ModuleGraph, ModuleId};
use tracing::info;

use crate::build::{BuildContext, BuildReport, GraphBuilder, Invalidation};
use crate::cache::BuildCache;
use crate::cancel::CancellationToken;
use crate::chunk::{ChunkGraph, SplitPolicy, optimize};
use crate::emit::{EmitOptions, Emitter, Manifest, WriteSummary};
use crate::loader::TransformRegistry;
use crate::Result;

/// Everything one successful pass produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub report: BuildReport,
    pub chunks: ChunkGraph,
    pub manifest: Manifest,
    pub summary: WriteSummary,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    root: PathBuf,
    ctx: Arc<BuildContext>,
    entries: IndexMap<String, String>,
    policy: SplitPolicy,
    emitter: Emitter,
}

impl Pipeline {
    /// Build a pipeline with the built-in transforms.
    pub fn new(config: &KilnConfig, cwd: &Path) -> Result<Self> {
        Self::with_registry(config, cwd, &TransformRegistry::with_builtins())
    }

    pub fn with_registry(
        config: &KilnConfig,
        cwd: &Path,
        registry: &TransformRegistry,
    ) -> Result<Self> {
        if config.entry.is_empty() {
            return Err(ConfigError::NoEntries.into());
        }
        let root = config.root(cwd);
        if !root.is_dir() {
            return Err(ConfigError::ContextNotFound { path: root }.into());
        }
        let root = ModuleId::new(&root)
            .map_err(kiln_graph::Error::from)?
            .into_path();

        let ctx = BuildContext::from_config(config, &root, registry)?;
        let emitter = Emitter::new(EmitOptions::from_config(config, &root)?, root.clone());
        Ok(Self {
            ctx: Arc::new(ctx),
            entries: config.entry.clone(),
            policy: SplitPolicy::from_config(&config.optimization.split_chunks),
            emitter,
            root,
        })
    }

    /// Canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn out_dir(&self) -> &Path {
        &self.emitter.options().out_dir
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn entries(&self) -> &IndexMap<String, String> {
        &self.entries
    }

    /// Full build with an empty cache.
    pub async fn build(&self) -> Result<BuildOutput> {
        let mut cache = BuildCache::new();
        self.run(
            &ModuleGraph::new(),
            &mut cache,
            &Invalidation::default(),
            CancellationToken::new(),
        )
        .await
    }

    /// Rebuild against `previous`. `cache` is replaced only if every stage,
    /// emission included, succeeds.
    pub async fn run(
        &self,
        previous: &ModuleGraph,
        cache: &mut BuildCache,
        invalidation: &Invalidation,
        cancel: CancellationToken,
    ) -> Result<BuildOutput> {
        let started = Instant::now();
        let mut working = cache.clone();

        let builder = GraphBuilder::new(Arc::clone(&self.ctx), cancel.clone());
        let report = builder
            .rebuild(previous, &self.entries, &mut working, invalidation)
            .await?;

        cancel.check()?;
        let chunks = optimize(&report.graph, &self.policy, &self.root)?;
        let plan = self.emitter.plan(&report.graph, &chunks)?;

        // Past this point the output directory changes; finish the pass.
        cancel.check()?;
        let summary = self.emitter.write(&plan)?;
        *cache = working;

        info!(
            modules = report.graph.len(),
            chunks = chunks.len(),
            written = summary.written.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build complete"
        );

        Ok(BuildOutput {
            report,
            chunks,
            manifest: plan.manifest,
            summary,
        })
    }
}
