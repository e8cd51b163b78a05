//! Remote issue tracker client.
//!
//! The [`IssueTracker`] trait is the seam between the sync engine and the
//! network: the orchestrator only sees the trait, tests substitute an
//! in-memory double, and [`GitHubClient`] is the live implementation with
//! rate-limit gating, retry, and error classification wrapped around every
//! call.

pub mod error;
mod github;

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

pub use error::RemoteError;
pub use github::{ConnectionCheck, GitHubClient};

/// Boxed future alias keeping [`IssueTracker`] dyn-compatible.
pub type IssueFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// An issue as seen by the sync engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteIssue {
    /// Issue number in the tracker.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Issue body.
    pub body: String,
    /// Tracker state, `"open"` or `"closed"`.
    pub state: String,
    /// Label names attached to the issue.
    pub labels: Vec<String>,
}

/// Rate-limit budget snapshot, refreshed at most once per five minutes
/// unless the remaining budget is already near the safety buffer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimit {
    /// Total requests allowed in the window.
    pub limit: u32,
    /// Requests remaining in the window.
    pub remaining: u32,
    /// Epoch seconds at which the window resets.
    pub reset: i64,
    /// Requests consumed in the window.
    pub used: u32,
}

/// Issue operations the sync engine needs. All four are idempotent in
/// intent; retries happen below this seam.
pub trait IssueTracker: Send + Sync {
    /// Creates an issue and returns it with its assigned number.
    fn create_issue<'a>(
        &'a self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> IssueFuture<'a, RemoteIssue>;

    /// Rewrites an existing issue's title and body.
    fn update_issue<'a>(
        &'a self,
        number: u64,
        title: &str,
        body: &str,
    ) -> IssueFuture<'a, RemoteIssue>;

    /// Closes an issue.
    fn close_issue(&self, number: u64) -> IssueFuture<'_, RemoteIssue>;

    /// Finds an issue (open or closed) carrying the given label. Used to
    /// relocate issues when local state was lost.
    fn find_issue_by_label<'a>(&'a self, label: &str) -> IssueFuture<'a, Option<RemoteIssue>>;
}
