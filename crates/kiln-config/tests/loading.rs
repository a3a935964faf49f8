//! Tests for layered loading: file, environment, CLI overrides and profiles.

use kiln_config::{ChunksMode, ConfigError, ConfigLoader, Mode, Overrides};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CONFIG: &str = r#"
mode = "production"

[entry]
main = "./frontend/index.tsx"
admin = "./frontend/admin.tsx"

[output]
path = "build"
public_path = "/static/"

[profiles.development.output]
public_path = "http://localhost:3000/"
"#;

fn project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("kiln.toml"), CONFIG).expect("write config");
    dir
}

#[test]
#[serial]
fn file_layer_is_loaded_in_declaration_order() {
    let dir = project();
    let config = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_NONE_")
        .load()
        .expect("load");

    let names: Vec<_> = config.entry.keys().map(String::as_str).collect();
    assert_eq!(names, ["main", "admin"]);
    assert_eq!(config.output.path, PathBuf::from("build"));
    assert_eq!(config.context.as_deref(), Some(dir.path()));
}

#[test]
#[serial]
fn env_overrides_file() {
    let dir = project();
    // SAFETY: serialized with other env-touching tests.
    unsafe {
        std::env::set_var("KILN_TEST_ENV_OUTPUT__PUBLIC_PATH", "/cdn/");
        std::env::set_var("KILN_TEST_ENV_OUTPUT__HASH_LENGTH", "12");
    }

    let result = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_ENV_")
        .load();

    unsafe {
        std::env::remove_var("KILN_TEST_ENV_OUTPUT__PUBLIC_PATH");
        std::env::remove_var("KILN_TEST_ENV_OUTPUT__HASH_LENGTH");
    }

    let config = result.expect("load");
    assert_eq!(config.output.public_path, "/cdn/");
    assert_eq!(config.output.hash_length, 12);
    assert_eq!(config.output.path, PathBuf::from("build"));
}

#[test]
#[serial]
fn cli_mode_selects_profile() {
    let dir = project();
    let config = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_NONE_")
        .overrides(Overrides {
            mode: Some(Mode::Development),
            ..Default::default()
        })
        .load()
        .expect("load");

    assert_eq!(config.mode, Mode::Development);
    assert_eq!(config.output.public_path, "http://localhost:3000/");
}

#[test]
#[serial]
fn cli_output_path_wins() {
    let dir = project();
    let config = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_NONE_")
        .overrides(Overrides {
            output_path: Some(PathBuf::from("out")),
            ..Default::default()
        })
        .load()
        .expect("load");

    assert_eq!(config.output.path, PathBuf::from("out"));
    assert_eq!(config.output.public_path, "/static/");
}

#[test]
#[serial]
fn explicit_relative_file_is_joined_to_root() {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir_all(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config/site.json"),
        r#"{ "entry": { "site": "./site.ts" } }"#,
    )
    .unwrap();

    let config = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_NONE_")
        .file(Some(PathBuf::from("config/site.json")))
        .load()
        .expect("load");
    assert_eq!(config.entry["site"], "./site.ts");
    assert_eq!(config.context, Some(dir.path().join("config")));
}

#[test]
#[serial]
fn missing_file_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = ConfigLoader::new(dir.path()).load().unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

const WEBPACK_STYLE: &str = r#"{
  "entry": { "main": "./frontend/index.tsx" },
  "output": { "publicPath": "/cdn/", "hashDigestLength": 12, "chunkFilename": "[name].chunk.js" },
  "optimization": { "splitChunks": { "chunks": "async", "minReuseCount": 3 } },
  "devServer": { "historyApiFallback": false },
  "resolve": { "mainFields": ["module", "main"] }
}"#;

#[test]
#[serial]
fn camel_case_keys_are_honoured() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("kiln.config.json"), WEBPACK_STYLE).unwrap();

    let config = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_NONE_")
        .load()
        .expect("load");

    assert_eq!(config.output.public_path, "/cdn/");
    assert_eq!(config.output.hash_length, 12);
    assert_eq!(config.output.chunk_filename, "[name].chunk.js");
    assert_eq!(config.optimization.split_chunks.chunks, ChunksMode::Async);
    assert_eq!(config.optimization.split_chunks.min_reuse_count, 3);
    assert!(!config.dev_server.history_api_fallback);
    assert_eq!(config.resolve.main_fields, ["module", "main"]);
}

#[test]
#[serial]
fn env_overrides_camel_case_file_keys() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("kiln.config.json"), WEBPACK_STYLE).unwrap();
    // SAFETY: serialized with other env-touching tests.
    unsafe {
        std::env::set_var("KILN_TEST_MIX_OUTPUT__PUBLIC_PATH", "/edge/");
        std::env::set_var("KILN_TEST_MIX_HOME", "/home/kiln");
    }

    let result = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_MIX_")
        .load();

    unsafe {
        std::env::remove_var("KILN_TEST_MIX_OUTPUT__PUBLIC_PATH");
        std::env::remove_var("KILN_TEST_MIX_HOME");
    }

    let config = result.expect("load");
    assert_eq!(config.output.public_path, "/edge/");
    assert_eq!(config.output.hash_length, 12);
}

#[test]
#[serial]
fn misspelled_key_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("kiln.toml"),
        "[entry]\nmain = \"./a.ts\"\n\n[output]\npublic_pth = \"/cdn/\"\n",
    )
    .unwrap();

    let err = ConfigLoader::new(dir.path())
        .env_prefix("KILN_TEST_NONE_")
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
    assert!(err.to_string().contains("public_pth"), "got {err}");
}
