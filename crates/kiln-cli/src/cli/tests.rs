use std::path::PathBuf;

use clap::Parser;
use kiln_config::Mode;

use super::*;

#[test]
fn build_accepts_project_flags() {
    let cli = Cli::parse_from([
        "kiln",
        "build",
        "--config",
        "conf/kiln.toml",
        "--mode",
        "development",
        "--cwd",
        "/work",
        "-o",
        "out",
    ]);
    let Command::Build(args) = cli.command else {
        panic!("expected build");
    };
    assert_eq!(args.project.config, Some(PathBuf::from("conf/kiln.toml")));
    assert_eq!(args.project.mode, Some(ModeArg::Development));
    assert_eq!(args.project.cwd, Some(PathBuf::from("/work")));
    assert_eq!(args.project.out_dir, Some(PathBuf::from("out")));
    assert!(!args.print_manifest);
}

#[test]
fn global_flags_work_after_subcommand() {
    let cli = Cli::parse_from(["kiln", "watch", "--json", "-v", "--no-color"]);
    assert!(cli.verbose);
    assert!(cli.no_color);
    assert!(matches!(cli.command, Command::Watch(WatchArgs { json: true, .. })));
}

#[test]
fn verbose_and_quiet_conflict() {
    assert!(Cli::try_parse_from(["kiln", "-v", "-q", "build"]).is_err());
}

#[test]
fn unknown_mode_is_rejected() {
    assert!(Cli::try_parse_from(["kiln", "build", "--mode", "staging"]).is_err());
}

#[test]
fn mode_arg_maps_to_config_mode() {
    assert_eq!(Mode::from(ModeArg::None), Mode::None);
    assert_eq!(Mode::from(ModeArg::Production), Mode::Production);
}
