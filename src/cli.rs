//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `tasksync`.
#[derive(Debug, Parser)]
#[command(name = "tasksync", version, about = "Sync markdown task lists to an issue tracker")]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one sync pass against the issue tracker.
    Sync {
        /// Keep running, re-syncing whenever task files change.
        #[arg(long)]
        watch: bool,
    },
    /// Check task files for quality problems (no network access).
    Validate {
        /// Directory to scan; defaults to the configured specs dir.
        path: Option<PathBuf>,
    },
    /// Verify authentication and repository access.
    Doctor,
    /// Write the sync state to a backup file.
    Export {
        /// Destination path.
        path: PathBuf,
    },
    /// Replace the sync state from a backup file.
    Import {
        /// Source path.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_sync_subcommand() {
        let cli = Cli::parse_from(["tasksync", "sync"]);
        assert!(matches!(cli.command, Command::Sync { watch: false }));
    }

    #[test]
    fn parses_sync_with_watch_flag() {
        let cli = Cli::parse_from(["tasksync", "sync", "--watch"]);
        assert!(matches!(cli.command, Command::Sync { watch: true }));
    }

    #[test]
    fn parses_validate_with_path() {
        let cli = Cli::parse_from(["tasksync", "validate", "docs/specs"]);
        match cli.command {
            Command::Validate { path } => {
                assert_eq!(path.unwrap().to_string_lossy(), "docs/specs");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_doctor_subcommand() {
        let cli = Cli::parse_from(["tasksync", "doctor"]);
        assert!(matches!(cli.command, Command::Doctor));
    }
}
