//! Error handling for the kiln CLI.
//!
//! Commands return [`CliError`]; `main` turns it into a miette report so
//! build failures show their diagnostic code, dependency chain and hint.

use std::path::PathBuf;

use miette::Report;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Config discovery, parsing or validation failed
    #[error(transparent)]
    Config(#[from] kiln_config::ConfigError),

    /// A build stage failed
    #[error(transparent)]
    Build(#[from] kiln_bundler::Error),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Render a CLI error for the terminal.
///
/// Config errors go through the bundler's diagnostic so both carry the
/// same codes and hints.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        CliError::Config(e) => Report::new(kiln_bundler::Error::Config(e)),
        CliError::DirectoryNotFound(path) => miette::miette!(
            help = "Pass an existing directory to --cwd",
            "Directory not found: {}",
            path.display()
        ),
        other => miette::miette!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::ConfigError;
    use miette::Diagnostic;

    #[test]
    fn config_errors_convert() {
        let err: CliError = ConfigError::NoEntries.into();
        assert!(matches!(err, CliError::Config(ConfigError::NoEntries)));
        assert_eq!(err.to_string(), "no entries specified");
    }

    #[test]
    fn config_report_carries_hint() {
        let report = cli_error_to_miette(ConfigError::NoEntries.into());
        let help = report.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("[entry]"), "got {help}");
    }

    #[test]
    fn build_report_keeps_diagnostic_code() {
        let report = cli_error_to_miette(kiln_bundler::Error::Cancelled.into());
        assert!(report.code().is_some());
    }

    #[test]
    fn missing_directory_names_path() {
        let err = CliError::DirectoryNotFound(PathBuf::from("/nowhere"));
        assert!(err.to_string().contains("/nowhere"));
        let report = cli_error_to_miette(err);
        assert!(report.help().is_some());
    }
}
