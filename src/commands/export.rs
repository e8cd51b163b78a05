//! `tasksync export` command.

use std::path::Path;

use crate::config::SyncConfig;
use crate::state::SyncStateStore;

/// Execute the `export` command: back up the sync state to `path`.
///
/// # Errors
///
/// Returns an error string when the state file cannot be loaded or the
/// backup cannot be written.
pub fn run(path: &Path) -> Result<(), String> {
    let mut store = SyncStateStore::new(SyncConfig::state_path_from_env());
    store.load().map_err(|err| err.to_string())?;
    store.export(path).map_err(|err| err.to_string())?;
    let count = store.len().map_err(|err| err.to_string())?;
    println!("Exported {count} record(s) to {}", path.display());
    Ok(())
}
