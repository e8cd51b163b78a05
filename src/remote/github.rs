//! Live GitHub REST adapter for the [`IssueTracker`] trait.
//!
//! Every issue call goes through the same wrapper: refresh the rate-limit
//! snapshot when stale, wait for the window reset when the remaining budget
//! is at or below the safety buffer, then attempt the request with
//! exponential backoff on retryable failures.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::error::{classify, RemoteError};
use super::{IssueFuture, IssueTracker, RateLimit, RemoteIssue};
use crate::config::SyncConfig;

/// Sent with every request; GitHub rejects requests without a user agent.
const APP_USER_AGENT: &str = concat!("tasksync/", env!("CARGO_PKG_VERSION"));

/// Snapshots older than this are refreshed before the next call.
const RATE_LIMIT_REFRESH: Duration = Duration::from_secs(5 * 60);

/// Margin added past the advertised reset instant.
const RESET_MARGIN_SECS: i64 = 1;

#[derive(Default)]
struct RateLimitCache {
    snapshot: Option<RateLimit>,
    fetched_at: Option<Instant>,
}

/// One step of the connectivity self-test.
#[derive(Debug, Clone)]
pub struct ConnectionCheck {
    /// What was checked.
    pub name: &'static str,
    /// Whether the check passed.
    pub passed: bool,
    /// Failure detail, or `"ok"`.
    pub detail: String,
}

/// GitHub REST client. Works against github.com or any enterprise host via
/// the configured base URL.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
    token: String,
    max_retries: u32,
    retry_delay: Duration,
    rate_limit_buffer: u32,
    rate_limit: Mutex<RateLimitCache>,
}

impl GitHubClient {
    /// Builds a client from the sync configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &SyncConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| RemoteError::Transport {
                operation: "client_init",
                message: err.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token: config.token.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            rate_limit_buffer: config.rate_limit_buffer,
            rate_limit: Mutex::new(RateLimitCache::default()),
        })
    }

    /// Verifies, in order: authentication, read access to the repository,
    /// and read access to its issues. Stops at the first failure.
    pub async fn check_connection(&self) -> Vec<ConnectionCheck> {
        let steps = [
            ("authentication", format!("{}/user", self.base_url)),
            (
                "repository access",
                format!("{}/repos/{}/{}", self.base_url, self.owner, self.repo),
            ),
            (
                "issue access",
                format!("{}/repos/{}/{}/issues?per_page=1", self.base_url, self.owner, self.repo),
            ),
        ];
        let mut checks = Vec::new();
        for (name, url) in steps {
            match self
                .send_json::<serde_json::Value>("check_connection", Method::GET, &url, None)
                .await
            {
                Ok(_) => checks.push(ConnectionCheck { name, passed: true, detail: "ok".into() }),
                Err(err) => {
                    checks.push(ConnectionCheck { name, passed: false, detail: err.to_string() });
                    break;
                }
            }
        }
        checks
    }

    fn issues_url(&self) -> String {
        format!("{}/repos/{}/{}/issues", self.base_url, self.owner, self.repo)
    }

    /// Single request attempt: send, classify non-success statuses, decode.
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, RemoteError> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, APP_USER_AGENT);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| RemoteError::Transport {
            operation,
            message: err.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(|err| RemoteError::Api {
                operation,
                status: status.as_u16(),
                message: format!("failed to decode response body: {err}"),
            })
        } else {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.message)
                .unwrap_or(text);
            Err(classify(operation, status.as_u16(), message))
        }
    }

    /// Runs `call` up to `max_retries + 1` times, sleeping
    /// `retry_delay * 2^(attempt-1)` between retryable failures.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "remote call failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if attempt > 1 {
                        debug!(operation, attempts = attempt, "retry budget exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Rate-limit gate run before every issue call. Holding the cache lock
    /// across the wait serializes callers — this is cooperative inline
    /// backpressure, not a queue.
    async fn ensure_quota(&self, operation: &'static str) -> Result<(), RemoteError> {
        let mut cache = self.rate_limit.lock().await;
        let stale = cache.fetched_at.map_or(true, |at| at.elapsed() >= RATE_LIMIT_REFRESH);
        let near_buffer =
            cache.snapshot.is_some_and(|s| s.remaining <= self.rate_limit_buffer);
        if stale || near_buffer {
            cache.snapshot = Some(self.fetch_rate_limit().await?);
            cache.fetched_at = Some(Instant::now());
        }

        if let Some(snapshot) = cache.snapshot {
            if snapshot.remaining <= self.rate_limit_buffer {
                if let Some(wait) = quota_wait(snapshot, Utc::now().timestamp()) {
                    warn!(
                        operation,
                        remaining = snapshot.remaining,
                        reset = snapshot.reset,
                        wait_secs = wait.as_secs(),
                        "rate limit budget low, waiting for window reset"
                    );
                    tokio::time::sleep(wait).await;
                }
                cache.snapshot = Some(self.fetch_rate_limit().await?);
                cache.fetched_at = Some(Instant::now());
            }
        }
        Ok(())
    }

    async fn fetch_rate_limit(&self) -> Result<RateLimit, RemoteError> {
        let url = format!("{}/rate_limit", self.base_url);
        let response: RateLimitResponse =
            self.send_json("rate_limit", Method::GET, &url, None).await?;
        debug!(
            remaining = response.resources.core.remaining,
            limit = response.resources.core.limit,
            used = response.resources.core.used,
            "refreshed rate limit snapshot"
        );
        Ok(response.resources.core)
    }
}

impl IssueTracker for GitHubClient {
    fn create_issue<'a>(
        &'a self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> IssueFuture<'a, RemoteIssue> {
        let payload = serde_json::json!({ "title": title, "body": body, "labels": labels });
        Box::pin(async move {
            self.ensure_quota("create_issue").await?;
            let url = self.issues_url();
            let issue: IssueResponse = self
                .with_retry("create_issue", || {
                    self.send_json("create_issue", Method::POST, &url, Some(&payload))
                })
                .await?;
            Ok(issue.into())
        })
    }

    fn update_issue<'a>(
        &'a self,
        number: u64,
        title: &str,
        body: &str,
    ) -> IssueFuture<'a, RemoteIssue> {
        let payload = serde_json::json!({ "title": title, "body": body });
        Box::pin(async move {
            self.ensure_quota("update_issue").await?;
            let url = format!("{}/{number}", self.issues_url());
            let issue: IssueResponse = self
                .with_retry("update_issue", || {
                    self.send_json("update_issue", Method::PATCH, &url, Some(&payload))
                })
                .await?;
            Ok(issue.into())
        })
    }

    fn close_issue(&self, number: u64) -> IssueFuture<'_, RemoteIssue> {
        let payload = serde_json::json!({ "state": "closed" });
        Box::pin(async move {
            self.ensure_quota("close_issue").await?;
            let url = format!("{}/{number}", self.issues_url());
            let issue: IssueResponse = self
                .with_retry("close_issue", || {
                    self.send_json("close_issue", Method::PATCH, &url, Some(&payload))
                })
                .await?;
            Ok(issue.into())
        })
    }

    fn find_issue_by_label<'a>(&'a self, label: &str) -> IssueFuture<'a, Option<RemoteIssue>> {
        let label = label.to_string();
        Box::pin(async move {
            self.ensure_quota("find_issue_by_label").await?;
            let url = format!("{}?labels={label}&state=all&per_page=20", self.issues_url());
            let issues: Vec<IssueResponse> = self
                .with_retry("find_issue_by_label", || {
                    self.send_json("find_issue_by_label", Method::GET, &url, None)
                })
                .await?;
            Ok(first_real_issue(issues))
        })
    }
}

/// The issues listing endpoint also returns pull requests; skip them.
fn first_real_issue(issues: Vec<IssueResponse>) -> Option<RemoteIssue> {
    issues.into_iter().find(|issue| issue.pull_request.is_none()).map(Into::into)
}

/// Wait until the advertised reset instant, plus a one second margin.
/// `None` when the window has already reset.
fn quota_wait(snapshot: RateLimit, now_epoch: i64) -> Option<Duration> {
    let delta = snapshot.reset.saturating_sub(now_epoch).saturating_add(RESET_MARGIN_SECS);
    u64::try_from(delta).ok().filter(|secs| *secs > 0).map(Duration::from_secs)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimit,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<LabelResponse>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    name: String,
}

impl From<IssueResponse> for RemoteIssue {
    fn from(issue: IssueResponse) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            state: issue.state,
            labels: issue.labels.into_iter().map(|label| label.name).collect(),
        }
    }
}
