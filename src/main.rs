//! Binary entrypoint for the `tasksync` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // Logging is opt-in: TASKSYNC_LOG takes an env-filter directive,
    // e.g. `tasksync=debug`.
    if let Ok(filter) = std::env::var("TASKSYNC_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter.as_str())
            .with_writer(std::io::stderr)
            .init();
    }

    match tasksync::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
