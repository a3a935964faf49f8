//! Filesystem watcher feeding the coordinator.
//!
//! Watches the project root recursively and forwards relevant changes as
//! [`FileChange`]s. Debouncing happens in the coordinator, not here.

use std::path::{Component, Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::trace;

/// A change to one path on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    fn from_event(kind: &EventKind, path: &Path) -> Option<Self> {
        let path = path.to_path_buf();
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            // Renames arrive as one event per side; what is left on disk decides.
            EventKind::Modify(ModifyKind::Name(_)) => Some(if path.exists() {
                FileChange::Created(path)
            } else {
                FileChange::Removed(path)
            }),
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            _ => None,
        }
    }
}

/// Paths the watcher never reports.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    out_dir: Option<PathBuf>,
    patterns: Vec<String>,
}

impl IgnoreRules {
    /// `patterns` starting with `*` match a filename suffix (`*.log`); others
    /// match a leading relative path (`dist/cache`) or any path component.
    /// `node_modules` and hidden entries are always ignored.
    pub fn new(root: impl Into<PathBuf>, out_dir: Option<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            root: root.into(),
            out_dir,
            patterns,
        }
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        let Ok(rel_path) = path.strip_prefix(&self.root) else {
            return true;
        };
        if let Some(out) = &self.out_dir {
            if path.starts_with(out) {
                return true;
            }
        }

        let names: Vec<&str> = rel_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .collect();
        if names
            .iter()
            .any(|name| *name == "node_modules" || name.starts_with('.'))
        {
            return true;
        }

        let rel = names.join("/");
        self.patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                rel.ends_with(suffix)
            } else {
                let pattern = pattern.trim_matches('/');
                rel == pattern
                    || rel.starts_with(&format!("{pattern}/"))
                    || names.iter().any(|name| *name == pattern)
            }
        })
    }
}

/// Recursive watcher over the project root.
///
/// Dropping the watcher stops event delivery and closes the channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(rules: IgnoreRules) -> notify::Result<(Self, mpsc::Receiver<FileChange>)> {
        let (tx, rx) = mpsc::channel(256);
        let root = rules.root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if rules.should_ignore(path) {
                    continue;
                }
                let Some(change) = FileChange::from_event(&event.kind, path) else {
                    continue;
                };
                trace!(?change, "filesystem change");
                // The receiver is gone once the coordinator shuts down.
                let _ = tx.blocking_send(change);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(patterns: &[&str]) -> IgnoreRules {
        IgnoreRules::new(
            "/project",
            Some(PathBuf::from("/project/dist")),
            patterns.iter().map(|p| p.to_string()).collect(),
        )
    }

    #[test]
    fn ignores_node_modules_and_output() {
        let r = rules(&[]);
        assert!(r.should_ignore(Path::new("/project/node_modules/react/index.js")));
        assert!(r.should_ignore(Path::new("/project/dist/main.abc.js")));
        assert!(!r.should_ignore(Path::new("/project/src/index.js")));
        assert!(!r.should_ignore(Path::new("/project/distribution/a.js")));
    }

    #[test]
    fn ignores_hidden_entries_and_outside_root() {
        let r = rules(&[]);
        assert!(r.should_ignore(Path::new("/project/.git/config")));
        assert!(r.should_ignore(Path::new("/project/src/.index.js.swp")));
        assert!(r.should_ignore(Path::new("/other/file.js")));
    }

    #[test]
    fn configured_patterns() {
        let r = rules(&["*.log", "coverage", "tmp/cache"]);
        assert!(r.should_ignore(Path::new("/project/debug.log")));
        assert!(r.should_ignore(Path::new("/project/coverage/lcov.info")));
        assert!(r.should_ignore(Path::new("/project/pkg/coverage/x.js")));
        assert!(r.should_ignore(Path::new("/project/tmp/cache/a.js")));
        assert!(!r.should_ignore(Path::new("/project/tmp/keep.js")));
    }

    #[test]
    fn events_map_to_changes() {
        let path = Path::new("/project/src/index.js");
        assert_eq!(
            FileChange::from_event(&EventKind::Create(notify::event::CreateKind::File), path),
            Some(FileChange::Created(path.to_path_buf()))
        );
        assert_eq!(
            FileChange::from_event(
                &EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
                path
            ),
            Some(FileChange::Modified(path.to_path_buf()))
        );
        assert_eq!(
            FileChange::from_event(&EventKind::Remove(notify::event::RemoveKind::File), path)
                .map(|c| c.path().to_path_buf()),
            Some(path.to_path_buf())
        );
        assert_eq!(
            FileChange::from_event(&EventKind::Access(notify::event::AccessKind::Any), path),
            None
        );
    }
}
