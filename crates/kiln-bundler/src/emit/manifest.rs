//! The build manifest handed to HTML templating and the dev server.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkKind;

/// Fields are declared in key order so the serialized manifest has sorted
/// keys at every level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Asset module (relative path) to emitted file.
    pub assets: BTreeMap<String, String>,
    pub chunks: BTreeMap<String, ChunkManifest>,
    /// Entry name to the files it needs, in load order.
    pub entrypoints: BTreeMap<String, Vec<String>>,
    pub public_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub file: String,
    pub hash: String,
    pub kind: ChunkKind,
    pub loads: Vec<String>,
    pub modules: Vec<String>,
    pub requires: Vec<String>,
}

/// Chunk files that differ between two manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDelta {
    /// New files of chunks that existed before under another hash.
    pub changed: Vec<String>,
    /// Files of chunks that did not exist before.
    pub added: Vec<String>,
    /// Files of chunks that no longer exist.
    pub removed: Vec<String>,
}

impl ManifestDelta {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

impl Manifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Every emitted file the manifest references, chunks first.
    pub fn files(&self) -> BTreeSet<&str> {
        self.chunks
            .values()
            .map(|c| c.file.as_str())
            .chain(self.assets.values().map(String::as_str))
            .collect()
    }

    /// Compare against the manifest of the previous successful build.
    pub fn diff(&self, previous: &Manifest) -> ManifestDelta {
        let mut delta = ManifestDelta::default();
        for (name, chunk) in &self.chunks {
            match previous.chunks.get(name) {
                Some(old) if old.file == chunk.file => {}
                Some(_) => delta.changed.push(chunk.file.clone()),
                None => delta.added.push(chunk.file.clone()),
            }
        }
        for (name, old) in &previous.chunks {
            if !self.chunks.contains_key(name) {
                delta.removed.push(old.file.clone());
            }
        }
        delta
    }

    pub fn url(&self, file: &str) -> String {
        if self.public_path.is_empty() || self.public_path.ends_with('/') {
            format!("{}{file}", self.public_path)
        } else {
            format!("{}/{file}", self.public_path)
        }
    }

    /// `<script>` tags for an entry, one per line in load order.
    pub fn script_tags(&self, entry: &str) -> Option<String> {
        let files = self.entrypoints.get(entry)?;
        Some(
            files
                .iter()
                .map(|file| format!("<script defer src=\"{}\"></script>", self.url(file)))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}
