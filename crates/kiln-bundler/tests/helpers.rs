//! Shared test utilities for kiln-bundler integration tests
//!
//! Projects are written to a temporary directory so every test exercises
//! the real resolver, loader and writer.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use kiln_bundler::{BuildOutput, Manifest, Pipeline};
use kiln_config::{KilnConfig, Mode};
use tempfile::TempDir;

pub struct Fixture {
    _dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = fs::canonicalize(dir.path()).expect("canonical root");
        let fixture = Self { _dir: dir, root };
        for (path, contents) in files {
            fixture.write(path, contents);
        }
        fixture
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write fixture file");
    }

    pub fn read_output(&self, manifest: &Manifest, chunk: &str) -> String {
        let file = &manifest.chunks[chunk].file;
        fs::read_to_string(self.path("dist").join(file)).expect("read emitted chunk")
    }
}

/// `index` imports `a` and `b`, which both import `util`.
pub fn diamond() -> Fixture {
    Fixture::new(&[
        ("src/index.js", "import './a';\nimport './b';\n"),
        ("src/a.js", "import { x } from './util';\nexport const a = x;\n"),
        ("src/b.js", "import { x } from './util';\nexport const b = x;\n"),
        ("src/util.js", "export const x = 1;\n"),
    ])
}

/// Development config with the given named entries and an uncompressed
/// `dist` output.
pub fn config(entries: &[(&str, &str)]) -> KilnConfig {
    let mut config = KilnConfig::default();
    config.mode = Mode::Development;
    for (name, path) in entries {
        config.entry.insert((*name).into(), (*path).into());
    }
    config
}

pub fn pipeline(fixture: &Fixture, config: &KilnConfig) -> Pipeline {
    Pipeline::new(config, fixture.root()).expect("pipeline")
}

pub async fn build(fixture: &Fixture, config: &KilnConfig) -> BuildOutput {
    pipeline(fixture, config).build().await.expect("build")
}

/// Chunk name to project-relative module paths, in execution order.
pub fn layout(fixture: &Fixture, output: &BuildOutput) -> Vec<(String, Vec<String>)> {
    let graph = &output.report.graph;
    output
        .chunks
        .chunks()
        .iter()
        .map(|chunk| {
            let modules = chunk
                .modules
                .iter()
                .map(|idx| graph.module(*idx).id.relative_to(fixture.root()))
                .collect();
            (chunk.name.clone(), modules)
        })
        .collect()
}
