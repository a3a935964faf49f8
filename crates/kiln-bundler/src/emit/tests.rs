use std::path::Path;
use std::sync::Arc;

use kiln_config::KilnConfig;
use kiln_graph::{ContentHash, ImportEdge, ImportKind, ModuleGraph, ModuleId, ModuleKind};
use tempfile::TempDir;

use super::*;
use crate::chunk::{SplitPolicy, optimize};

fn module(graph: &mut ModuleGraph, path: &str, kind: ModuleKind, output: &str) -> ModuleIdx {
    graph.upsert_module(
        ModuleId::new(path).unwrap(),
        kind,
        ContentHash::of(output.as_bytes()),
        Arc::from(output.as_bytes()),
    )
}

fn edge(graph: &ModuleGraph, target: ModuleIdx, kind: ImportKind) -> ImportEdge {
    ImportEdge {
        specifier: format!("./{}", graph.module(target).id.stem()),
        kind,
        target,
    }
}

/// `index` imports `a` and `b` which share `util`, lazily loads `page`,
/// and pulls in `logo.png`.
fn fixture() -> ModuleGraph {
    let mut g = ModuleGraph::new();
    let index = module(&mut g, "/proj/src/index.js", ModuleKind::Script, "index");
    let a = module(&mut g, "/proj/src/a.js", ModuleKind::Script, "a");
    let b = module(&mut g, "/proj/src/b.js", ModuleKind::Script, "b");
    let util = module(&mut g, "/proj/src/util.js", ModuleKind::Script, "util");
    let page = module(&mut g, "/proj/src/page.js", ModuleKind::Script, "page");
    let logo = module(&mut g, "/proj/src/logo.png", ModuleKind::Asset, "\u{89}PNG");

    let index_edges = vec![
        edge(&g, a, ImportKind::Static),
        edge(&g, b, ImportKind::Static),
        edge(&g, page, ImportKind::Dynamic),
        edge(&g, logo, ImportKind::Static),
    ];
    g.set_imports(index, index_edges).unwrap();
    let to_util = vec![edge(&g, util, ImportKind::Static)];
    g.set_imports(a, to_util.clone()).unwrap();
    g.set_imports(b, to_util).unwrap();
    g.add_entry("main", index).unwrap();
    g
}

fn emitter(out: &Path, tweak: impl FnOnce(&mut KilnConfig)) -> Emitter {
    let mut config = KilnConfig::default();
    config.output.public_path = "/static/".into();
    config.output.compress = Some(false);
    tweak(&mut config);
    let mut options = EmitOptions::from_config(&config, Path::new("/proj")).unwrap();
    options.out_dir = out.to_path_buf();
    Emitter::new(options, "/proj")
}

fn plan(emitter: &Emitter, graph: &ModuleGraph) -> EmitPlan {
    let chunks = optimize(graph, &SplitPolicy::default(), Path::new("/proj")).unwrap();
    emitter.plan(graph, &chunks).unwrap()
}

#[test]
fn plan_names_files_by_kind_and_hash() {
    let g = fixture();
    let plan = plan(&emitter(Path::new("/out"), |_| {}), &g);
    let m = &plan.manifest;

    let main = &m.chunks["main"];
    assert_eq!(main.kind, ChunkKind::Entry);
    assert_eq!(main.hash.len(), 8);
    assert_eq!(main.file, format!("main.{}.js", main.hash));
    assert_eq!(main.requires, vec!["shared-1"]);
    assert_eq!(main.loads, vec!["page"]);

    let shared = &m.chunks["shared-1"];
    assert_eq!(shared.file, format!("shared-1.{}.chunk.js", shared.hash));
    assert_eq!(shared.modules, vec!["src/util.js"]);
    assert_eq!(m.chunks["page"].kind, ChunkKind::Async);

    assert_eq!(m.entrypoints["main"], vec![shared.file.clone(), main.file.clone()]);
    assert_eq!(m.assets["src/logo.png"], "media/logo.png");
}

#[test]
fn asset_modules_export_their_url() {
    let g = fixture();
    let plan = plan(&emitter(Path::new("/out"), |_| {}), &g);
    let main = plan
        .files
        .iter()
        .find(|f| f.file == plan.manifest.chunks["main"].file)
        .unwrap();
    let text = String::from_utf8(main.contents.to_vec()).unwrap();
    assert!(text.contains("//# module src/logo.png\nexport default \"/static/media/logo.png\";\n"));
}

#[test]
fn editing_one_module_moves_only_its_chunk_hash() {
    let g = fixture();
    let e = emitter(Path::new("/out"), |_| {});
    let before = plan(&e, &g).manifest;

    let mut edited = g.clone();
    module(&mut edited, "/proj/src/util.js", ModuleKind::Script, "util v2");
    let after = plan(&e, &edited).manifest;

    assert_ne!(before.chunks["shared-1"].hash, after.chunks["shared-1"].hash);
    assert_eq!(before.chunks["main"].hash, after.chunks["main"].hash);
    assert_eq!(before.chunks["page"].hash, after.chunks["page"].hash);
    let delta = after.diff(&before);
    assert_eq!(delta.changed, vec![after.chunks["shared-1"].file.clone()]);
}

#[test]
fn colliding_asset_names_are_rejected() {
    let mut g = ModuleGraph::new();
    let index = module(&mut g, "/proj/index.js", ModuleKind::Script, "index");
    let one = module(&mut g, "/proj/a/logo.png", ModuleKind::Asset, "one");
    let two = module(&mut g, "/proj/b/logo.png", ModuleKind::Asset, "two");
    let edges = vec![edge(&g, one, ImportKind::Static), edge(&g, two, ImportKind::Static)];
    g.set_imports(index, edges).unwrap();
    g.add_entry("main", index).unwrap();

    let e = emitter(Path::new("/out"), |_| {});
    let chunks = optimize(&g, &SplitPolicy::default(), Path::new("/proj")).unwrap();
    match e.plan(&g, &chunks) {
        Err(EmitError::AssetCollision { file, first, second }) => {
            assert_eq!(file, "media/logo.png");
            assert_eq!(first, "a/logo.png");
            assert_eq!(second, "b/logo.png");
        }
        other => panic!("expected collision, got {other:?}"),
    }

    let hashed = emitter(Path::new("/out"), |c| {
        c.output.asset_filename = "[name].[contenthash].[ext]".into();
    });
    assert!(hashed.plan(&g, &chunks).is_ok());
}

#[test]
fn write_skips_unchanged_hashed_files() {
    let dir = TempDir::new().unwrap();
    let g = fixture();
    let e = emitter(dir.path(), |_| {});
    let plan = plan(&e, &g);

    let first = e.write(&plan).unwrap();
    assert_eq!(first.written.len(), plan.files.len());
    assert!(first.skipped.is_empty());
    for file in plan.manifest.files() {
        assert!(dir.path().join(file).is_file(), "{file} missing");
    }
    let manifest = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    assert_eq!(Manifest::from_json(&manifest).unwrap(), plan.manifest);

    let second = e.write(&plan).unwrap();
    assert!(second.written.is_empty());
    assert_eq!(second.skipped.len(), plan.files.len());
}

#[test]
fn compression_writes_gz_siblings_for_matching_chunks() {
    let dir = TempDir::new().unwrap();
    let g = fixture();
    let e = emitter(dir.path(), |c| c.output.compress = Some(true));
    let plan = plan(&e, &g);
    e.write(&plan).unwrap();

    let main = &plan.manifest.chunks["main"].file;
    let gz = std::fs::read(dir.path().join(format!("{main}.gz"))).unwrap();
    let mut decoder = flate2::read::GzDecoder::new(&gz[..]);
    let mut text = String::new();
    std::io::Read::read_to_string(&mut decoder, &mut text).unwrap();
    assert_eq!(text.as_bytes(), &std::fs::read(dir.path().join(main)).unwrap()[..]);

    assert!(!dir.path().join("media/logo.png.gz").exists());
    assert_eq!(gzip(b"same").unwrap(), gzip(b"same").unwrap());
}

#[test]
fn invalid_compress_pattern_is_a_config_error() {
    let mut config = KilnConfig::default();
    config.output.compress_test = "(".into();
    assert!(matches!(
        EmitOptions::from_config(&config, Path::new("/proj")),
        Err(crate::Error::InvalidConfig(_))
    ));
}

#[test]
fn render_filename_fills_placeholders() {
    assert_eq!(
        render_filename("[name].[contenthash].[ext]", "logo", "abcd", "svg"),
        "logo.abcd.svg"
    );
    assert_eq!(render_filename("static/[name].js", "main", "x", "js"), "static/main.js");
}
