//! `tasksync import` command.

use std::path::Path;

use crate::config::SyncConfig;
use crate::state::SyncStateStore;

/// Execute the `import` command: replace the sync state from a backup.
/// Malformed records reject the whole import, nothing is dropped silently.
///
/// # Errors
///
/// Returns an error string when the backup cannot be read, fails
/// validation, or the state file cannot be written.
pub fn run(path: &Path) -> Result<(), String> {
    let state_path = SyncConfig::state_path_from_env();
    let mut store = SyncStateStore::new(state_path.clone());
    let count = store.import(path).map_err(|err| err.to_string())?;
    store.save().map_err(|err| err.to_string())?;
    println!("Imported {count} record(s) into {}", state_path.display());
    Ok(())
}
