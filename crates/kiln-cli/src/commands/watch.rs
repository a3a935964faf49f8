//! `kiln watch`: initial build, then incremental rebuilds until Ctrl+C.

use std::sync::Arc;

use kiln_bundler::{BuildEvent, Coordinator, FileWatcher};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::cli::WatchArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Run a watch session.
///
/// An initial build that fails does not end the session: the next change
/// to any file retries it.
pub async fn execute(args: WatchArgs) -> Result<()> {
    let (config, cwd) = utils::load_config(&args.project)?;
    let coordinator = Arc::new(Coordinator::from_config(&config, &cwd)?);

    let reporter = tokio::spawn(report_events(coordinator.subscribe(), args.json));

    if coordinator.initial_build().await.is_err() {
        ui::warning("Initial build failed; waiting for changes");
    }

    let rules = coordinator.ignore_rules(config.dev_server.watch_ignore.clone());
    let (watcher, changes) = FileWatcher::new(rules)?;
    ui::info(&format!("Watching {}", watcher.root().display()));
    ui::info("Press Ctrl+C to stop");

    let mut runner = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run(changes).await }
    });

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            ui::info("Stopping...");
            coordinator.cancel_current();
            // Closing the change channel ends the run loop.
            drop(watcher);
            let _ = runner.await;
        }
        _ = &mut runner => {
            ui::warning("Change stream closed unexpectedly");
        }
    }

    reporter.abort();
    ui::success("Watch session ended");
    Ok(())
}

async fn report_events(mut events: broadcast::Receiver<BuildEvent>, json: bool) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if json {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!("unserializable event: {e}"),
                    }
                } else {
                    print_event(&event);
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event reporter fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &BuildEvent) {
    match event {
        BuildEvent::BuildStarted => tracing::debug!("build started"),
        BuildEvent::Rebuilt {
            delta, duration_ms, ..
        } => {
            if delta.is_empty() {
                ui::success(&format!("Rebuilt in {duration_ms}ms, output unchanged"));
            } else {
                ui::success(&format!(
                    "Rebuilt in {duration_ms}ms: {} changed, {} added, {} removed",
                    delta.changed.len(),
                    delta.added.len(),
                    delta.removed.len()
                ));
            }
        }
        BuildEvent::BuildFailed {
            stage,
            error,
            chain,
        } => {
            ui::error(&format!("{stage} failed: {error}"));
            if chain.len() > 1 {
                ui::info(&format!("Imported via {}", chain.join(" -> ")));
            }
        }
        BuildEvent::CycleDetected { modules } => {
            ui::warning(&format!("Circular dependency: {}", modules.join(" -> ")));
        }
    }
}
