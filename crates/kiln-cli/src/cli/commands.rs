use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cli::enums::ModeArg;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one full build
    ///
    /// Resolves every entry, splits the module graph into chunks and writes
    /// the hashed output files and manifest.
    Build(BuildArgs),

    /// Build, then rebuild incrementally on file changes
    ///
    /// Only modules whose content changed are transformed again, and only
    /// chunks whose hash moved are rewritten. Stops on Ctrl+C.
    Watch(WatchArgs),
}

/// Options shared by every command that loads a project.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Config file to use instead of discovering one
    ///
    /// Relative paths are taken from the working directory. Without this
    /// flag kiln looks for kiln.toml, kiln.config.json, then a "kiln" field
    /// in package.json.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Build mode; selects the matching profile and compression default
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Working directory
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Output directory, overriding output.path
    #[arg(short = 'o', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Public URL prefix, overriding output.public_path
    #[arg(long, value_name = "URL")]
    pub public_path: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the manifest as JSON on stdout
    #[arg(long)]
    pub print_manifest: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print build events as JSON lines on stdout
    #[arg(long)]
    pub json: bool,
}
