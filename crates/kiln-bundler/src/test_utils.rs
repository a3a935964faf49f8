//! Fixture projects for unit tests: real files in a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_config::{KilnConfig, Mode};
use tempfile::TempDir;

pub(crate) struct Project {
    _dir: TempDir,
    root: PathBuf,
}

impl Project {
    pub(crate) fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let project = Self { _dir: dir, root };
        for (path, contents) in files {
            project.write(path, contents);
        }
        project
    }

    /// `index` imports `a` and `b`, which both import `util`.
    pub(crate) fn diamond() -> Self {
        Self::new(&[
            ("src/index.js", "import './a';\nimport './b';\n"),
            ("src/a.js", "import { x } from './util';\nexport const a = x;\n"),
            ("src/b.js", "import { x } from './util';\nexport const b = x;\n"),
            ("src/util.js", "export const x = 1;\n"),
        ])
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub(crate) fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    pub(crate) fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).unwrap();
    }

    /// Development-mode config with a single `main` entry.
    pub(crate) fn config(&self, entry: &str) -> KilnConfig {
        let mut config = KilnConfig::default();
        config.mode = Mode::Development;
        config.entry.insert("main".into(), entry.into());
        config.settings.parallel_jobs = Some(2);
        config
    }
}
