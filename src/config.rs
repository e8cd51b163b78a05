//! Environment-backed configuration.
//!
//! The sync engine consumes configuration, it does not own it: everything
//! comes from environment variables (with `.env` support), defaulting to
//! values that work for a repo with a `specs/` tree at its root.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default API base URL; override for enterprise hosts.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const DEFAULT_SPECS_DIR: &str = "specs";
const DEFAULT_STATE_FILE: &str = ".tasksync-state.json";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_RATE_LIMIT_BUFFER: u32 = 100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// A configuration value that is missing or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// An environment variable is set to an unusable value.
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Everything the sync engine needs to reach the tracker and the spec tree.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Repository owner (the `owner` in `owner/repo`).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Bearer token for the tracker API.
    pub token: String,
    /// API base URL, without a trailing slash.
    pub api_base_url: String,
    /// Root directory scanned for `tasks.md` files.
    pub specs_dir: PathBuf,
    /// Path of the persisted sync state file.
    pub state_path: PathBuf,
    /// Retry budget per remote call (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub retry_delay_ms: u64,
    /// Remaining-call count at or below which the client waits for the
    /// rate-limit window to reset.
    pub rate_limit_buffer: u32,
    /// Per-request transport timeout.
    pub request_timeout_secs: u64,
}

impl SyncConfig {
    /// Loads configuration from the environment (and `.env`, if present).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the repository or token is missing, the
    /// repository is not of the form `owner/repo`, or a numeric variable
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let slug = env::var("TASKSYNC_REPO")
            .or_else(|_| env::var("GITHUB_REPOSITORY"))
            .map_err(|_| ConfigError::Missing("TASKSYNC_REPO"))?;
        let (owner, repo) = parse_repo_slug(&slug)
            .ok_or(ConfigError::Invalid { name: "TASKSYNC_REPO", value: slug.clone() })?;

        let token = env::var("GITHUB_TOKEN").map_err(|_| ConfigError::Missing("GITHUB_TOKEN"))?;

        let api_base_url = env::var("TASKSYNC_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let specs_dir = Self::specs_dir_from_env();
        let state_path = Self::state_path_from_env();

        Ok(Self {
            owner,
            repo,
            token,
            api_base_url,
            specs_dir,
            state_path,
            max_retries: env_parse("TASKSYNC_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_delay_ms: env_parse("TASKSYNC_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)?,
            rate_limit_buffer: env_parse("TASKSYNC_RATE_LIMIT_BUFFER", DEFAULT_RATE_LIMIT_BUFFER)?,
            request_timeout_secs: env_parse(
                "TASKSYNC_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }

    /// Specs directory from the environment, for commands that need no
    /// tracker access.
    #[must_use]
    pub fn specs_dir_from_env() -> PathBuf {
        env::var("TASKSYNC_SPECS_DIR")
            .map_or_else(|_| PathBuf::from(DEFAULT_SPECS_DIR), PathBuf::from)
    }

    /// State file path from the environment. Defaults to a file colocated
    /// with the spec tree.
    #[must_use]
    pub fn state_path_from_env() -> PathBuf {
        env::var("TASKSYNC_STATE_FILE")
            .map_or_else(|_| Self::specs_dir_from_env().join(DEFAULT_STATE_FILE), PathBuf::from)
    }

    /// Base backoff delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Splits `owner/repo`, rejecting empty halves and extra slashes.
fn parse_repo_slug(slug: &str) -> Option<(String, String)> {
    let (owner, repo) = slug.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => {
            value.trim().parse().map_err(|_| ConfigError::Invalid { name, value })
        }
        Err(_) => Ok(default),
    }
}
