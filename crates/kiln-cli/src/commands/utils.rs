use std::path::{Path, PathBuf};

use kiln_config::{ConfigLoader, KilnConfig, Overrides, validate_schema};

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};

/// `--cwd` against the process directory, or the process directory itself.
pub(crate) fn resolve_cwd(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = match explicit {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => std::env::current_dir()?.join(dir),
        None => std::env::current_dir()?,
    };
    if !cwd.is_dir() {
        return Err(CliError::DirectoryNotFound(cwd));
    }
    Ok(cwd)
}

/// Load, layer and validate the project config.
///
/// Returns the config with the working directory it was loaded from.
pub(crate) fn load_config(args: &ProjectArgs) -> Result<(KilnConfig, PathBuf)> {
    let cwd = resolve_cwd(args.cwd.as_deref())?;
    let config = ConfigLoader::new(&cwd)
        .file(args.config.clone())
        .overrides(Overrides {
            mode: args.mode.map(Into::into),
            output_path: args.out_dir.clone(),
            public_path: args.public_path.clone(),
        })
        .load()?;
    validate_schema(&config)?;
    tracing::debug!(
        mode = config.mode.as_str(),
        entries = config.entry.len(),
        "configuration loaded"
    );
    Ok((config, cwd))
}
