//! `tasksync sync` command.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::remote::GitHubClient;
use crate::state::SyncStateStore;
use crate::sync::SyncOrchestrator;
use crate::watch;

/// Execute the `sync` command: one pass, or continuous with `--watch`.
///
/// # Errors
///
/// Returns an error string when configuration is incomplete, the state
/// store fails, or the pass hits a fatal error. Per-task remote failures
/// are reported in the summary instead.
pub fn run(watch: bool) -> Result<(), String> {
    let config = SyncConfig::from_env().map_err(|err| err.to_string())?;
    let runtime = super::runtime()?;

    let mut store = SyncStateStore::new(config.state_path.clone());
    store.load().map_err(|err| err.to_string())?;
    let tracker = GitHubClient::new(&config).map_err(|err| err.to_string())?;
    let orchestrator = SyncOrchestrator::new(config.clone(), store, Arc::new(tracker));

    let report =
        runtime.block_on(orchestrator.sync_all_tasks()).map_err(|err| err.to_string())?;
    println!("{}", report.format());

    if watch {
        orchestrator.start_watcher();
        watch::run(&orchestrator, &runtime, &config.specs_dir)?;
    }
    Ok(())
}
