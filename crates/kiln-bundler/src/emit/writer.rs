//! Staged file writes into the output directory.
//!
//! Every file is first written to `<name>.tmp` next to its target. Only when
//! all staged writes succeed are they renamed into place; on failure the
//! staged files are removed and already renamed targets are left as they
//! were, which is harmless because chunk names are content-hashed.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::warn;

use super::EmitError;

/// Join `filename` onto `base_dir`, refusing anything that escapes it.
pub(crate) fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf, EmitError> {
    if filename.contains('\0') {
        return Err(EmitError::InvalidOutputPath(format!(
            "'{}' contains a null byte",
            filename.escape_default()
        )));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(EmitError::InvalidOutputPath(format!(
            "'{filename}' resolves outside '{}'",
            base_dir.display()
        )));
    }
    Ok(full_path)
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Write all `(target, bytes)` pairs, staging first and renaming after.
pub(crate) fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<(), EmitError> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(operations.len());

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                cleanup(&staged);
                EmitError::Write {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let temp = staging_path(target);
        fs::write(&temp, content).map_err(|source| {
            cleanup(&staged);
            EmitError::Write {
                path: temp.clone(),
                source,
            }
        })?;
        staged.push((temp, target.clone()));
    }

    for (temp, target) in &staged {
        fs::rename(temp, target).map_err(|source| {
            cleanup(&staged);
            EmitError::Write {
                path: target.clone(),
                source,
            }
        })?;
    }
    Ok(())
}

fn cleanup(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                warn!("failed to remove staged file {}: {e}", temp.display());
            }
        }
    }
}
