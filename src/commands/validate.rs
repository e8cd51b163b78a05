//! `tasksync validate` command.

use std::path::Path;

use crate::config::SyncConfig;
use crate::parser;
use crate::sync::discover_task_files;

/// Execute the `validate` command: report parser quality problems for
/// every task file under `path` without touching the network.
///
/// # Errors
///
/// Returns an error string when the directory cannot be scanned, a file
/// cannot be read, or any quality problems were found (so CI fails).
pub fn run(path: Option<&Path>) -> Result<(), String> {
    let dir = path.map_or_else(SyncConfig::specs_dir_from_env, Path::to_path_buf);
    let files = discover_task_files(&dir)
        .map_err(|err| format!("Failed to scan {}: {err}", dir.display()))?;
    if files.is_empty() {
        println!("No task files found under {}.", dir.display());
        return Ok(());
    }

    let mut total = 0;
    for file in &files {
        let content = std::fs::read_to_string(file)
            .map_err(|err| format!("Failed to read {}: {err}", file.display()))?;
        for problem in parser::validate(&content, file) {
            println!("{problem}");
            total += 1;
        }
    }

    if total == 0 {
        println!("{} task file(s) OK.", files.len());
        Ok(())
    } else {
        Err(format!("{total} problem(s) found"))
    }
}
