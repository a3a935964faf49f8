//! One unit of builder work: read, hash, transform and resolve a module.
//!
//! Runs on the blocking pool. Nothing here touches the graph; results are
//! handed back to the coordinating task.

use std::path::Path;
use std::sync::Arc;

use kiln_graph::{ContentHash, ImportRecord, ModuleId};

use crate::cache::CacheEntry;
use crate::loader::TransformError;
use crate::resolve::ResolutionError;

use super::BuildContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitKind {
    /// Read from disk; transform when the content hash moved.
    Load,
    /// Re-resolve cached specifiers without reading or transforming.
    Reresolve,
}

#[derive(Debug, Clone)]
pub(crate) struct Unit {
    pub id: ModuleId,
    pub kind: UnitKind,
}

#[derive(Debug)]
pub(crate) struct UnitOutcome {
    pub entry: CacheEntry,
    /// Output was recomputed by the loader pipeline.
    pub transformed: bool,
}

#[derive(Debug)]
pub(crate) enum UnitFailure {
    Read(std::io::Error),
    Transform(TransformError),
    Resolution(ResolutionError),
    Timeout,
    Cancelled,
    Panicked(String),
}

/// Process one unit against a snapshot of its cache entry.
pub(crate) fn process(
    ctx: &BuildContext,
    unit: &Unit,
    cached: Option<CacheEntry>,
    force_resolve: bool,
) -> Result<UnitOutcome, UnitFailure> {
    let path = unit.id.as_path();

    if let (UnitKind::Reresolve, Some(cached)) = (unit.kind, &cached) {
        let imports = reresolve(ctx, path, &cached.imports)?;
        return Ok(UnitOutcome {
            entry: CacheEntry {
                imports,
                ..cached.clone()
            },
            transformed: false,
        });
    }

    let bytes = std::fs::read(path).map_err(UnitFailure::Read)?;
    let hash = ContentHash::of(&bytes);

    if let Some(cached) = cached.filter(|c| c.hash == hash) {
        let imports = if force_resolve {
            reresolve(ctx, path, &cached.imports)?
        } else {
            cached.imports.clone()
        };
        return Ok(UnitOutcome {
            entry: CacheEntry { imports, ..cached },
            transformed: false,
        });
    }

    let loaded = ctx.loader.run(&bytes, path).map_err(UnitFailure::Transform)?;
    let imports = resolve_all(ctx, path, loaded.imports)?;

    Ok(UnitOutcome {
        entry: CacheEntry {
            hash,
            kind: loaded.kind,
            output: Arc::from(loaded.output),
            imports,
        },
        transformed: true,
    })
}

fn reresolve(
    ctx: &BuildContext,
    path: &Path,
    imports: &[(ImportRecord, ModuleId)],
) -> Result<Arc<[(ImportRecord, ModuleId)]>, UnitFailure> {
    resolve_all(ctx, path, imports.iter().map(|(record, _)| record.clone()))
}

fn resolve_all(
    ctx: &BuildContext,
    path: &Path,
    records: impl IntoIterator<Item = ImportRecord>,
) -> Result<Arc<[(ImportRecord, ModuleId)]>, UnitFailure> {
    let dir = path.parent().unwrap_or(ctx.resolver.root());
    let mut out = Vec::new();
    for record in records {
        let target = ctx
            .resolver
            .resolve(dir, &record.specifier)
            .map_err(|err| match err {
                // Report the importing file rather than its directory.
                ResolutionError::NotFound {
                    specifier, tried, ..
                } => UnitFailure::Resolution(ResolutionError::NotFound {
                    specifier,
                    importer: path.to_path_buf(),
                    tried,
                }),
                other => UnitFailure::Resolution(other),
            })?;
        out.push((record, target));
    }
    Ok(Arc::from(out))
}
