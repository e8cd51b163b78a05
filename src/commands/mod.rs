//! Command dispatch and handlers.

pub mod doctor;
pub mod export;
pub mod import;
pub mod sync;
pub mod validate;

use crate::cli::Command;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    match command {
        Command::Sync { watch } => sync::run(*watch),
        Command::Validate { path } => validate::run(path.as_deref()),
        Command::Doctor => doctor::run(),
        Command::Export { path } => export::run(path),
        Command::Import { path } => import::run(path),
    }
}

/// Current-thread runtime for the async sync engine; the whole pass is
/// cooperative and single-threaded.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to start async runtime: {err}"))
}
