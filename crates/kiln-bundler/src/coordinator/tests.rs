use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kiln_config::{KilnConfig, RuleConfig, RuleKind};
use tokio::sync::broadcast::error::TryRecvError;

use super::*;
use crate::loader::{FnTransform, TransformRegistry};
use crate::test_utils::Project;

fn coordinator(project: &Project, config: &KilnConfig) -> Coordinator {
    let pipeline = Pipeline::new(config, project.root()).unwrap();
    Coordinator::new(pipeline, Duration::from_millis(30))
}

fn drain(rx: &mut broadcast::Receiver<BuildEvent>) -> Vec<BuildEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

fn shared_file(manifest: &Manifest) -> String {
    manifest.chunks["shared-1"].file.clone()
}

#[tokio::test]
async fn rebuild_without_changes_is_a_noop() {
    let project = Project::diamond();
    let c = coordinator(&project, &project.config("./src/index.js"));
    c.initial_build().await.unwrap();
    let mut rx = c.subscribe();
    let before = c.manifest().unwrap();

    assert!(c.rebuild().await.is_none());
    assert!(drain(&mut rx).is_empty());
    assert_eq!(c.manifest().unwrap(), before);
}

#[tokio::test]
async fn edit_publishes_delta_for_the_moved_chunk() {
    let project = Project::diamond();
    let c = coordinator(&project, &project.config("./src/index.js"));
    let first = c.initial_build().await.unwrap().manifest;
    let mut rx = c.subscribe();

    project.write("src/util.js", "export const x = 42;\n");
    assert!(c.notify_change(FileChange::Modified(project.path("src/util.js"))));
    assert_eq!(
        c.module_state(&project.path("src/util.js")),
        Some(ModuleState::Dirty)
    );
    let second = c.rebuild().await.unwrap().unwrap().manifest;

    assert_ne!(shared_file(&first), shared_file(&second));
    assert_eq!(first.chunks["main"].file, second.chunks["main"].file);

    let events = drain(&mut rx);
    assert!(matches!(events[0], BuildEvent::BuildStarted));
    match events.last() {
        Some(BuildEvent::Rebuilt { delta, manifest, .. }) => {
            assert_eq!(delta.changed, vec![shared_file(&second)]);
            assert!(delta.added.is_empty() && delta.removed.is_empty());
            assert_eq!(manifest, &second);
        }
        other => panic!("expected rebuilt event, got {other:?}"),
    }
    assert_eq!(
        c.module_state(&project.path("src/util.js")),
        Some(ModuleState::Unchanged)
    );
}

#[tokio::test]
async fn failure_keeps_last_good_manifest() {
    let project = Project::diamond();
    let c = coordinator(&project, &project.config("./src/index.js"));
    let good = c.initial_build().await.unwrap().manifest;
    let mut rx = c.subscribe();

    project.write("src/a.js", "import './gone';\n");
    c.notify_change(FileChange::Modified(project.path("src/a.js")));
    let err = c.rebuild().await.unwrap().unwrap_err();

    assert_eq!(err.stage(), BuildStage::Resolve);
    assert_eq!(c.manifest().unwrap(), good);
    assert_eq!(
        c.module_state(&project.path("src/a.js")),
        Some(ModuleState::Failed)
    );
    assert!(c.has_pending(), "failed changes stay queued");
    let events = drain(&mut rx);
    match events.last() {
        Some(BuildEvent::BuildFailed { stage, error, chain }) => {
            assert_eq!(*stage, BuildStage::Resolve);
            assert!(error.contains("./gone"));
            assert_eq!(chain, &vec!["src/index.js".to_string(), "src/a.js".to_string()]);
        }
        other => panic!("expected failure event, got {other:?}"),
    }

    project.write("src/a.js", "export const a = 1;\n");
    c.notify_change(FileChange::Modified(project.path("src/a.js")));
    let fixed = c.rebuild().await.unwrap().unwrap().manifest;
    assert_ne!(fixed, good);
    assert_eq!(c.manifest().unwrap(), fixed);
    assert!(!c.has_pending());
}

#[tokio::test]
async fn untracked_edits_are_ignored_but_creations_queue() {
    let project = Project::diamond();
    let c = coordinator(&project, &project.config("./src/index.js"));
    c.initial_build().await.unwrap();

    project.write("notes.md", "hello");
    assert!(!c.notify_change(FileChange::Modified(project.path("notes.md"))));
    assert!(!c.has_pending());
    assert_eq!(c.module_state(&project.path("notes.md")), None);

    assert!(c.notify_change(FileChange::Created(project.path("notes.md"))));
    assert!(c.has_pending());
    let output = c.rebuild().await.unwrap().unwrap();
    assert!(output.report.transformed.is_empty());
    assert!(output.summary.written.is_empty(), "nothing moved, nothing written");
}

#[tokio::test]
async fn removing_an_orphaned_file_evicts_it() {
    let project = Project::diamond();
    let c = coordinator(&project, &project.config("./src/index.js"));
    c.initial_build().await.unwrap();

    project.write("src/index.js", "import './a';\n");
    project.remove("src/b.js");
    c.notify_change(FileChange::Modified(project.path("src/index.js")));
    c.notify_change(FileChange::Removed(project.path("src/b.js")));
    let output = c.rebuild().await.unwrap().unwrap();

    let evicted: Vec<_> = output
        .report
        .evicted
        .iter()
        .map(|id| id.relative_to(project.root()))
        .collect();
    assert_eq!(evicted, vec!["src/b.js"]);
    assert_eq!(c.module_state(&project.path("src/b.js")), None);
    // `util` now has a single importer and folds back into the entry chunk.
    assert!(!output.manifest.chunks.contains_key("shared-1"));
}

#[tokio::test]
async fn cancelled_pass_requeues_and_publishes_nothing() {
    let project = Project::new(&[("src/index.js", "export default 1;\n")]);
    let mut config = project.config("./src/index.js");
    config.module.rules = vec![RuleConfig {
        test: r"\.js$".into(),
        exclude: None,
        uses: vec!["slow".into()],
        kind: RuleKind::Script,
    }];
    let mut registry = TransformRegistry::with_builtins();
    registry.register(FnTransform::new("slow", |src: &[u8], _: &Path| {
        std::thread::sleep(Duration::from_millis(150));
        Ok(src.to_vec())
    }));
    let pipeline = Pipeline::with_registry(&config, project.root(), &registry).unwrap();
    let c = Coordinator::new(pipeline, Duration::from_millis(10));
    let good = c.initial_build().await.unwrap().manifest;

    project.write("src/index.js", "export default 2;\n");
    c.notify_change(FileChange::Modified(project.path("src/index.js")));
    let (result, cancelled) = tokio::join!(c.rebuild(), async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        c.cancel_current()
    });

    assert!(cancelled);
    assert!(result.unwrap().unwrap_err().is_cancelled());
    assert_eq!(c.manifest().unwrap(), good);
    assert!(c.has_pending());
    assert_eq!(
        c.module_state(&project.path("src/index.js")),
        Some(ModuleState::Dirty)
    );
}

#[tokio::test]
async fn run_coalesces_a_burst_into_one_pass() {
    let project = Project::diamond();
    let c = Arc::new(coordinator(&project, &project.config("./src/index.js")));
    c.initial_build().await.unwrap();
    let mut rx = c.subscribe();

    let (tx, changes) = mpsc::channel(16);
    let runner = tokio::spawn({
        let c = Arc::clone(&c);
        async move { c.run(changes).await }
    });

    for n in 0..3 {
        project.write("src/util.js", &format!("export const x = {n};\n"));
        tx.send(FileChange::Modified(project.path("src/util.js")))
            .await
            .unwrap();
    }

    let mut started = 0;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no rebuild within 5s")
            .unwrap();
        match event {
            BuildEvent::BuildStarted => started += 1,
            BuildEvent::Rebuilt { .. } => break,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(started, 1);

    drop(tx);
    runner.await.unwrap();
    assert!(!c.has_pending());
    let util = &c.manifest().unwrap().chunks["shared-1"];
    let written = std::fs::read_to_string(c.pipeline().out_dir().join(&util.file)).unwrap();
    assert!(written.contains("export const x = 2;"));
}

#[tokio::test]
async fn first_failure_retries_on_any_change() {
    let project = Project::new(&[("src/index.js", "import './later';\n")]);
    let c = coordinator(&project, &project.config("./src/index.js"));
    assert!(c.initial_build().await.is_err());
    assert!(c.manifest().is_none());

    project.write("src/later.js", "export default 1;\n");
    assert!(c.notify_change(FileChange::Modified(project.path("src/later.js"))));
    let output = c.rebuild().await.unwrap().unwrap();
    assert_eq!(output.report.graph.len(), 2);
    assert!(c.manifest().is_some());
}
