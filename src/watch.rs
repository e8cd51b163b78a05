//! Filesystem watcher driving continuous sync.
//!
//! This is the external collaborator around the orchestrator: it owns the
//! debounced watch loop and re-enters `sync_all_tasks()` while the
//! orchestrator's continuous-mode flag is set. The orchestrator itself
//! holds no file-watching logic.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use tracing::{debug, warn};

use crate::sync::{SyncError, SyncOrchestrator};

const DEBOUNCE: Duration = Duration::from_millis(750);
const POLL: Duration = Duration::from_millis(500);

/// Watches `specs_dir` and re-syncs on debounced task-file changes until
/// the orchestrator's watcher flag is cleared (or the process is killed).
///
/// # Errors
///
/// Returns an error string when the watcher cannot be started.
pub fn run(
    orchestrator: &SyncOrchestrator,
    runtime: &tokio::runtime::Runtime,
    specs_dir: &Path,
) -> Result<(), String> {
    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(DEBOUNCE, tx)
        .map_err(|err| format!("Failed to start file watcher: {err}"))?;
    debouncer
        .watcher()
        .watch(specs_dir, RecursiveMode::Recursive)
        .map_err(|err| format!("Failed to watch {}: {err}", specs_dir.display()))?;
    println!("Watching {} for changes (Ctrl-C to stop)...", specs_dir.display());

    while orchestrator.is_watching() {
        match rx.recv_timeout(POLL) {
            Ok(Ok(events)) => {
                if !events.iter().any(|event| is_task_file(&event.path)) {
                    continue;
                }
                debug!(events = events.len(), "task files changed, re-syncing");
                match runtime.block_on(orchestrator.sync_all_tasks()) {
                    Ok(report) => println!("{}", report.format()),
                    Err(SyncError::RunInProgress) => {
                        debug!("change ignored, a sync pass is already running");
                    }
                    Err(err) => warn!(error = %err, "sync pass failed"),
                }
            }
            Ok(Err(err)) => warn!(error = %err, "file watcher error"),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

fn is_task_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == "tasks.md")
}
