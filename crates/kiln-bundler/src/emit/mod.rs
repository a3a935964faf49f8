//! Asset emission: filenames, media files, compression and the manifest.
//!
//! Emission is split in two. [`Emitter::plan`] is pure: it hashes chunks,
//! renders filenames and builds the [`Manifest`]. [`Emitter::write`] puts a
//! plan on disk, manifest last, so a reader that sees the new manifest can
//! rely on every file it names.

mod manifest;
mod writer;

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use kiln_config::KilnConfig;
use kiln_graph::{ModuleGraph, ModuleIdx};
use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::chunk::{ChunkGraph, ChunkKind};
use crate::hash::{content_hash, serialize_chunk};

pub use manifest::{ChunkManifest, Manifest, ManifestDelta};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("assets {first} and {second} would both be emitted as {file}")]
    AssetCollision {
        file: String,
        first: String,
        second: String,
    },

    #[error("failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl EmitError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            EmitError::Write { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Output settings resolved against the project root.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub out_dir: PathBuf,
    pub public_path: String,
    pub filename: String,
    pub chunk_filename: String,
    pub vendor_filename: String,
    pub hash_length: usize,
    pub media_dir: String,
    pub asset_filename: String,
    pub manifest: PathBuf,
    pub compress: bool,
    pub compress_test: Regex,
}

impl EmitOptions {
    pub fn from_config(config: &KilnConfig, root: &Path) -> crate::Result<Self> {
        let output = &config.output;
        let compress_test = Regex::new(&output.compress_test)
            .map_err(|e| crate::Error::InvalidConfig(format!("output.compress_test: {e}")))?;
        Ok(Self {
            out_dir: root.join(&output.path),
            public_path: output.public_path.clone(),
            filename: output.filename.clone(),
            chunk_filename: output.chunk_filename.clone(),
            vendor_filename: output.vendor_filename.clone(),
            hash_length: output.hash_length,
            media_dir: output.media_dir.clone(),
            asset_filename: output.asset_filename.clone(),
            manifest: output.manifest.clone(),
            compress: config.compression_enabled(),
            compress_test,
        })
    }

    fn pattern_for(&self, kind: ChunkKind) -> &str {
        match kind {
            ChunkKind::Entry => &self.filename,
            ChunkKind::Async | ChunkKind::Shared | ChunkKind::Common => &self.chunk_filename,
            ChunkKind::Vendor => &self.vendor_filename,
        }
    }
}

/// Replace `[name]`, `[contenthash]` and `[ext]` in a filename pattern.
pub fn render_filename(pattern: &str, name: &str, hash: &str, ext: &str) -> String {
    pattern
        .replace("[name]", name)
        .replace("[contenthash]", hash)
        .replace("[ext]", ext)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Chunk,
    Asset,
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    /// Path relative to the output directory, `/`-separated.
    pub file: String,
    pub kind: OutputKind,
    pub contents: Arc<[u8]>,
    /// The filename embeds a hash of `contents`.
    pub hashed: bool,
}

#[derive(Debug, Clone)]
pub struct EmitPlan {
    pub files: Vec<OutputFile>,
    pub manifest: Manifest,
}

/// Files touched by [`Emitter::write`], relative to the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Emitter {
    options: EmitOptions,
    root: PathBuf,
}

impl Emitter {
    pub fn new(options: EmitOptions, root: impl Into<PathBuf>) -> Self {
        Self {
            options,
            root: root.into(),
        }
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.options.out_dir.join(&self.options.manifest)
    }

    /// Hash every chunk, name every file and build the manifest.
    pub fn plan(&self, graph: &ModuleGraph, chunks: &ChunkGraph) -> Result<EmitPlan, EmitError> {
        let opts = &self.options;
        let mut files = Vec::new();
        let mut manifest = Manifest {
            public_path: opts.public_path.clone(),
            ..Manifest::default()
        };

        let mut asset_urls: FxHashMap<ModuleIdx, String> = FxHashMap::default();
        let mut claimed: BTreeMap<String, String> = BTreeMap::new();
        let mut assets: Vec<ModuleIdx> = graph
            .iter()
            .filter(|(_, m)| m.is_asset())
            .map(|(idx, _)| idx)
            .collect();
        assets.sort_by(|a, b| graph.module(*a).id.cmp(&graph.module(*b).id));

        for idx in assets {
            let module = graph.module(idx);
            let relative = module.id.relative_to(&self.root);
            let ext = module
                .id
                .as_path()
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            let hash = content_hash(&module.output, opts.hash_length);
            let name = render_filename(&opts.asset_filename, &module.id.stem(), &hash, &ext);
            let file = join_media(&opts.media_dir, &name);

            if let Some(first) = claimed.insert(file.clone(), relative.clone()) {
                return Err(EmitError::AssetCollision {
                    file,
                    first,
                    second: relative,
                });
            }
            asset_urls.insert(idx, manifest.url(&file));
            manifest.assets.insert(relative, file.clone());
            files.push(OutputFile {
                file,
                kind: OutputKind::Asset,
                contents: Arc::clone(&module.output),
                hashed: opts.asset_filename.contains("[contenthash]"),
            });
        }

        let mut chunk_files = Vec::with_capacity(chunks.len());
        for chunk in chunks.chunks() {
            let bytes = serialize_chunk(chunk, graph, &self.root, &asset_urls);
            let hash = content_hash(&bytes, opts.hash_length);
            let pattern = opts.pattern_for(chunk.kind);
            let file = render_filename(pattern, &chunk.name, &hash, "js");
            chunk_files.push(file.clone());

            files.push(OutputFile {
                file: file.clone(),
                kind: OutputKind::Chunk,
                contents: Arc::from(bytes),
                hashed: pattern.contains("[contenthash]"),
            });
            manifest.chunks.insert(
                chunk.name.clone(),
                ChunkManifest {
                    file,
                    hash,
                    kind: chunk.kind,
                    loads: chunk
                        .loads
                        .iter()
                        .map(|c| chunks.chunk(*c).name.clone())
                        .collect(),
                    modules: chunk
                        .modules
                        .iter()
                        .map(|m| graph.module(*m).id.relative_to(&self.root))
                        .collect(),
                    requires: chunk
                        .requires
                        .iter()
                        .map(|c| chunks.chunk(*c).name.clone())
                        .collect(),
                },
            );
        }

        for (entry, id) in chunks.entry_chunks() {
            let files = chunks
                .load_order(id)
                .into_iter()
                .map(|c| chunk_files[c.index()].clone())
                .collect();
            manifest.entrypoints.insert(entry.to_string(), files);
        }

        Ok(EmitPlan { files, manifest })
    }

    /// Write a plan to the output directory.
    ///
    /// Content-hashed files that already exist are skipped. Compressed
    /// siblings are produced for matching chunks when compression is on.
    pub fn write(&self, plan: &EmitPlan) -> Result<WriteSummary, EmitError> {
        let opts = &self.options;
        let out_dir = &opts.out_dir;
        std::fs::create_dir_all(out_dir).map_err(|source| EmitError::Write {
            path: out_dir.clone(),
            source,
        })?;

        let mut summary = WriteSummary::default();
        let mut pending: Vec<(PathBuf, Arc<[u8]>)> = Vec::new();

        for file in &plan.files {
            let target = writer::validate_output_path(out_dir, &file.file)?;
            if is_current(&target, file) {
                summary.skipped.push(file.file.clone());
            } else {
                pending.push((target.clone(), Arc::clone(&file.contents)));
                summary.written.push(file.file.clone());
            }

            if file.kind == OutputKind::Chunk && opts.compress && opts.compress_test.is_match(&file.file) {
                let gz_name = format!("{}.gz", file.file);
                let gz_target = writer::validate_output_path(out_dir, &gz_name)?;
                if file.hashed && gz_target.exists() {
                    summary.skipped.push(gz_name);
                } else {
                    let compressed = gzip(&file.contents).map_err(|source| EmitError::Write {
                        path: gz_target.clone(),
                        source,
                    })?;
                    pending.push((gz_target, Arc::from(compressed)));
                    summary.written.push(gz_name);
                }
            }
        }

        let operations: Vec<(PathBuf, &[u8])> = pending
            .iter()
            .map(|(path, bytes)| (path.clone(), &bytes[..]))
            .collect();
        writer::write_files_atomic(&operations)?;

        let manifest_path = self.manifest_path();
        let manifest_name = opts.manifest.to_string_lossy().into_owned();
        let manifest_target = writer::validate_output_path(out_dir, &manifest_name)?;
        let json = plan.manifest.to_json()?;
        writer::write_files_atomic(&[(manifest_target, json.as_bytes())])?;

        debug!(
            written = summary.written.len(),
            skipped = summary.skipped.len(),
            manifest = %manifest_path.display(),
            "emitted build output"
        );
        Ok(summary)
    }
}

fn is_current(target: &Path, file: &OutputFile) -> bool {
    if !target.exists() {
        return false;
    }
    file.hashed || std::fs::read(target).is_ok_and(|bytes| bytes[..] == file.contents[..])
}

fn join_media(media_dir: &str, name: &str) -> String {
    let dir = media_dir.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Gzip `bytes` with a zeroed header timestamp so output is reproducible.
pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()
}

#[cfg(test)]
mod tests;
