//! Watch mode - rebuild on file changes
//!
//! Every relevant change submits a fresh snapshot; the scheduler coalesces
//! bursts, so no debouncing happens here.

use super::build::{load_task, BuildArgs};
use anyhow::{Context, Result};
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc::unbounded_channel;
use vista_build::Scheduler;

/// Watch the project directory until interrupted
pub async fn run(args: &BuildArgs, scheduler: &Scheduler) -> Result<()> {
    let (tx, mut rx) = unbounded_channel::<notify::Result<Event>>();

    let mut watcher = notify::recommended_watcher(move |event| {
        let _ = tx.send(event);
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(&args.project_dir, RecursiveMode::Recursive)
        .context("Failed to start watching project directory")?;

    tracing::info!("Watching {} for changes", args.project_dir.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch mode");
                break;
            }
            event = rx.recv() => match event {
                Some(Ok(event)) => {
                    if !event.paths.iter().any(|p| is_relevant_change(p)) {
                        continue;
                    }
                    match load_task(args) {
                        Ok(task) => scheduler.submit(task),
                        Err(e) => tracing::warn!("Could not read project: {:#}", e),
                    }
                }
                Some(Err(e)) => tracing::warn!("Watch error: {}", e),
                None => break,
            },
        }
    }

    scheduler.wait_idle().await;
    Ok(())
}

/// Changes inside dependency and VCS directories never trigger a build
fn is_relevant_change(path: &Path) -> bool {
    !path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("node_modules") | Some(".git")
        )
    })
}
