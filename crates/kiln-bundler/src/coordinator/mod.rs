//! Incremental rebuilds driven by filesystem changes.
//!
//! The coordinator owns the last good graph, cache and manifest of a watch
//! session. Changes accumulate into a pending [`Invalidation`]; a pass takes
//! it, builds against copies of the last good state and publishes only when
//! every stage succeeded. A cancelled or failed pass hands its invalidation
//! back so nothing is lost.
//!
//! ```text
//! Unchanged ──change──▶ Dirty ──pass starts──▶ Rebuilding ──ok──▶ Unchanged
//!                         ▲                        │
//!                         └──cancelled─────────────┤
//!                                                  └──error──▶ Failed
//! ```

mod watcher;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use kiln_config::KilnConfig;
use kiln_graph::{ModuleGraph, ModuleId};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::build::Invalidation;
use crate::cache::BuildCache;
use crate::cancel::CancellationToken;
use crate::emit::{Manifest, ManifestDelta};
use crate::pipeline::{BuildOutput, Pipeline};
use crate::{BuildStage, Error, Result};

pub use watcher::{FileChange, FileWatcher, IgnoreRules};

/// Rebuild state of one tracked module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Unchanged,
    Dirty,
    Rebuilding,
    Failed,
}

/// Published on the coordinator's broadcast channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    BuildStarted,
    Rebuilt {
        delta: ManifestDelta,
        manifest: Manifest,
        duration_ms: u64,
    },
    BuildFailed {
        stage: BuildStage,
        error: String,
        /// Importer chain, project-relative.
        chain: Vec<String>,
    },
    CycleDetected {
        modules: Vec<String>,
    },
}

const EVENT_CAPACITY: usize = 64;

struct Session {
    graph: ModuleGraph,
    cache: BuildCache,
    manifest: Option<Manifest>,
    /// Tracked modules not in the `Unchanged` state.
    states: BTreeMap<PathBuf, ModuleState>,
    pending: Invalidation,
}

impl Session {
    fn requeue(&mut self, taken: Invalidation) {
        self.pending.dirty.extend(taken.dirty);
        self.pending.reresolve |= taken.reresolve;
    }

    fn mark(&mut self, paths: impl IntoIterator<Item = PathBuf>, state: ModuleState) {
        for path in paths {
            self.states.insert(path, state);
        }
    }
}

pub struct Coordinator {
    pipeline: Pipeline,
    debounce: Duration,
    session: Mutex<Session>,
    current: Mutex<Option<CancellationToken>>,
    events: broadcast::Sender<BuildEvent>,
}

impl Coordinator {
    pub fn new(pipeline: Pipeline, debounce: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            pipeline,
            debounce,
            session: Mutex::new(Session {
                graph: ModuleGraph::new(),
                cache: BuildCache::new(),
                manifest: None,
                states: BTreeMap::new(),
                pending: Invalidation::default(),
            }),
            current: Mutex::new(None),
            events,
        }
    }

    pub fn from_config(config: &KilnConfig, cwd: &Path) -> Result<Self> {
        let pipeline = Pipeline::new(config, cwd)?;
        Ok(Self::new(
            pipeline,
            Duration::from_millis(config.dev_server.debounce_ms),
        ))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    /// Manifest of the last successful pass.
    pub fn manifest(&self) -> Option<Manifest> {
        self.session.lock().manifest.clone()
    }

    /// `None` for paths the last good graph does not contain.
    pub fn module_state(&self, path: &Path) -> Option<ModuleState> {
        let id = module_id(path)?;
        let session = self.session.lock();
        match session.states.get(id.as_path()) {
            Some(state) => Some(*state),
            None if session.graph.contains(&id) => Some(ModuleState::Unchanged),
            None => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.session.lock().pending.is_empty()
    }

    /// Watch rules for this session's project.
    pub fn ignore_rules(&self, patterns: Vec<String>) -> IgnoreRules {
        IgnoreRules::new(
            self.pipeline.root(),
            Some(self.pipeline.out_dir().to_path_buf()),
            patterns,
        )
    }

    /// Record a filesystem change. Returns whether it queued any work.
    ///
    /// Edits to paths outside the graph are ignored; creations always count
    /// because a new file can change what an existing specifier resolves to.
    pub fn notify_change(&self, change: FileChange) -> bool {
        let Some(id) = module_id(change.path()) else {
            return false;
        };
        let mut session = self.session.lock();
        let tracked = session.graph.contains(&id);
        let path = id.into_path();
        let built = session.manifest.is_some();

        let queued = match &change {
            FileChange::Modified(_) if tracked => {
                session.pending.dirty.insert(path.clone());
                true
            }
            FileChange::Created(_) => {
                if tracked {
                    session.pending.dirty.insert(path.clone());
                }
                session.pending.reresolve = true;
                true
            }
            FileChange::Removed(_) if tracked => {
                session.pending.reresolve = true;
                true
            }
            // Until a pass succeeds every change is a reason to try again.
            _ if !built => {
                session.pending.reresolve = true;
                true
            }
            _ => false,
        };

        if queued && tracked {
            session.mark([path], ModuleState::Dirty);
        }
        if queued {
            debug!(change = ?change, "queued change");
        }
        queued
    }

    /// Cancel the pass in flight, if any.
    pub fn cancel_current(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(CancellationToken::cancel)
    }

    /// First full build of the session. Runs regardless of pending changes.
    pub async fn initial_build(&self) -> Result<BuildOutput> {
        let taken = std::mem::take(&mut self.session.lock().pending);
        self.execute(taken).await
    }

    /// Run a pass over the pending changes. `None` when there are none.
    pub async fn rebuild(&self) -> Option<Result<BuildOutput>> {
        let taken = {
            let mut session = self.session.lock();
            if session.pending.is_empty() {
                return None;
            }
            std::mem::take(&mut session.pending)
        };
        Some(self.execute(taken).await)
    }

    async fn execute(&self, invalidation: Invalidation) -> Result<BuildOutput> {
        let started = Instant::now();
        let token = CancellationToken::new();
        *self.current.lock() = Some(token.clone());

        let (previous, mut cache) = {
            let mut session = self.session.lock();
            let dirty: Vec<PathBuf> = invalidation.dirty.iter().cloned().collect();
            session.mark(dirty, ModuleState::Rebuilding);
            (session.graph.clone(), session.cache.clone())
        };
        let _ = self.events.send(BuildEvent::BuildStarted);

        let result = self
            .pipeline
            .run(&previous, &mut cache, &invalidation, token)
            .await;
        *self.current.lock() = None;

        match result {
            Ok(output) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.publish(&output, cache, duration_ms);
                Ok(output)
            }
            Err(error) => {
                self.abandon(invalidation, &error);
                Err(error)
            }
        }
    }

    fn publish(&self, output: &BuildOutput, cache: BuildCache, duration_ms: u64) {
        let root = self.pipeline.root();
        let delta = {
            let mut session = self.session.lock();
            let delta = match &session.manifest {
                Some(previous) => output.manifest.diff(previous),
                None => output.manifest.diff(&Manifest::default()),
            };
            session.graph = output.report.graph.clone();
            session.cache = cache;
            session.manifest = Some(output.manifest.clone());
            // Changes queued while this pass ran stay dirty.
            let still_dirty = session.pending.dirty.clone();
            session.states.retain(|path, _| still_dirty.contains(path));
            delta
        };

        for cycle in &output.report.cycles {
            let _ = self.events.send(BuildEvent::CycleDetected {
                modules: cycle.modules.iter().map(|id| id.relative_to(root)).collect(),
            });
        }
        info!(
            changed = delta.changed.len(),
            added = delta.added.len(),
            removed = delta.removed.len(),
            duration_ms,
            "rebuilt"
        );
        let _ = self.events.send(BuildEvent::Rebuilt {
            delta,
            manifest: output.manifest.clone(),
            duration_ms,
        });
    }

    fn abandon(&self, invalidation: Invalidation, error: &Error) {
        let dirty: Vec<PathBuf> = invalidation.dirty.iter().cloned().collect();
        let mut session = self.session.lock();
        session.requeue(invalidation);
        session.mark(dirty, ModuleState::Dirty);

        if error.is_cancelled() {
            debug!("pass cancelled");
            return;
        }
        if let Some(id) = error.failed_path().and_then(module_id) {
            if session.graph.contains(&id) {
                session.mark([id.into_path()], ModuleState::Failed);
            }
        }
        drop(session);

        warn!(stage = %error.stage(), "build failed: {error}");
        let root = self.pipeline.root();
        let _ = self.events.send(BuildEvent::BuildFailed {
            stage: error.stage(),
            error: error.to_string(),
            chain: error
                .chain()
                .map(|c| c.path.iter().map(|id| id.relative_to(root)).collect())
                .unwrap_or_default(),
        });
    }

    /// Drive rebuilds from `changes` until the channel closes.
    ///
    /// Each burst is coalesced over the debounce window. A change that
    /// arrives while a pass runs cancels it and restarts the window.
    pub async fn run(&self, mut changes: mpsc::Receiver<FileChange>) {
        let mut open = true;
        while open {
            match changes.recv().await {
                Some(change) => {
                    self.notify_change(change);
                }
                None => break,
            }

            loop {
                open = self.debounce_burst(&mut changes).await;
                if !self.has_pending() {
                    break;
                }

                let pass = self.rebuild();
                tokio::pin!(pass);
                let interrupted = if open {
                    tokio::select! {
                        _ = &mut pass => None,
                        next = changes.recv() => Some(next),
                    }
                } else {
                    pass.as_mut().await;
                    None
                };

                match interrupted {
                    None => break,
                    Some(next) => {
                        self.cancel_current();
                        pass.await;
                        match next {
                            Some(change) => {
                                self.notify_change(change);
                            }
                            None => open = false,
                        }
                    }
                }
            }
        }
        debug!("change stream closed");
    }

    /// Absorb changes until the window passes without one. Returns `false`
    /// once the channel has closed.
    async fn debounce_burst(&self, changes: &mut mpsc::Receiver<FileChange>) -> bool {
        loop {
            match tokio::time::timeout(self.debounce, changes.recv()).await {
                Err(_) => return true,
                Ok(Some(change)) => {
                    self.notify_change(change);
                }
                Ok(None) => return false,
            }
        }
    }
}

/// Same normalization the graph applies; removed files keep their cleaned path.
fn module_id(path: &Path) -> Option<ModuleId> {
    ModuleId::new(path).ok()
}

#[cfg(test)]
mod tests;
