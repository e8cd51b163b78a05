//! Sync orchestrator.
//!
//! Composes the parser, the state store, and the issue tracker into one
//! reconciliation pass: parse every task file, decide create/update/skip
//! per task, close issues for tasks that disappeared, and persist state
//! after each mutating call. Idempotent: a second pass over unchanged
//! sources performs no remote mutations.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::parser::{self, Task};
use crate::remote::{IssueTracker, RemoteError};
use crate::state::{StateError, SyncState, SyncStateStore};

/// Fatal failures of a sync run. Per-task remote errors are not here —
/// they are collected in the [`SyncReport`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another run currently holds the run token.
    #[error("a sync run is already in progress")]
    RunInProgress,
    /// The state store failed; stopping beats silently diverging state.
    #[error(transparent)]
    State(#[from] StateError),
    /// The specs directory could not be scanned at all.
    #[error("failed to scan specs directory {}: {source}", path.display())]
    SpecsDir {
        /// Directory that failed to scan.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Lifecycle of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No pass has run yet.
    Idle,
    /// Reading and parsing task files.
    Parsing,
    /// Deciding and executing per-task actions.
    Reconciling,
    /// Last pass completed (possibly with per-task errors).
    Done,
    /// Last pass hit a fatal error.
    Failed,
}

/// A per-task or per-file problem that did not abort the run.
#[derive(Debug)]
pub struct SyncProblem {
    /// Task id or file path the problem belongs to.
    pub subject: String,
    /// What went wrong.
    pub message: String,
}

/// Outcome of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Issues created.
    pub created: usize,
    /// Issues updated (including adopted ones).
    pub updated: usize,
    /// Issues closed for orphaned tasks.
    pub closed: usize,
    /// Tasks that required no remote call.
    pub unchanged: usize,
    /// Problems encountered along the way.
    pub errors: Vec<SyncProblem>,
}

impl SyncReport {
    /// True when the pass finished without any per-task problems.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable summary.
    #[must_use]
    pub fn format(&self) -> String {
        let mut out = format!(
            "Sync complete: {} created, {} updated, {} closed, {} unchanged",
            self.created, self.updated, self.closed, self.unchanged
        );
        if !self.errors.is_empty() {
            let _ = write!(out, "\nErrors ({}):", self.errors.len());
            for problem in &self.errors {
                let _ = write!(out, "\n  {}: {}", problem.subject, problem.message);
            }
        }
        out
    }
}

struct PushOutcome {
    state: SyncState,
    created: bool,
}

/// Drives full reconciliation passes over the spec tree.
///
/// Built from explicitly-constructed parts (dependency injection); holds
/// the only handle to the state store for the lifetime of the process.
pub struct SyncOrchestrator {
    config: SyncConfig,
    tracker: Arc<dyn IssueTracker>,
    /// The guard on this mutex is the run token: holding it for the whole
    /// pass keeps a watcher-triggered run from overlapping a manual one.
    store: Mutex<SyncStateStore>,
    run_state: StdMutex<RunState>,
    watching: AtomicBool,
}

impl SyncOrchestrator {
    /// Wires the orchestrator from its three collaborators. The store must
    /// already be loaded.
    #[must_use]
    pub fn new(
        config: SyncConfig,
        store: SyncStateStore,
        tracker: Arc<dyn IssueTracker>,
    ) -> Self {
        Self {
            config,
            tracker,
            store: Mutex::new(store),
            run_state: StdMutex::new(RunState::Idle),
            watching: AtomicBool::new(false),
        }
    }

    /// State of the current (or last) pass.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        *self.run_state.lock().expect("run state lock poisoned")
    }

    fn set_state(&self, state: RunState) {
        *self.run_state.lock().expect("run state lock poisoned") = state;
    }

    /// Enables continuous mode. The filesystem watcher is an external
    /// collaborator; this only flips the flag it consults.
    pub fn start_watcher(&self) {
        self.watching.store(true, Ordering::SeqCst);
    }

    /// Disables continuous mode.
    pub fn stop_watcher(&self) {
        self.watching.store(false, Ordering::SeqCst);
    }

    /// Whether continuous mode is on.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    /// Runs one full reconciliation pass.
    ///
    /// Tasks are processed in parse order and state is persisted after each
    /// mutating remote call, so a crash leaves at most the in-flight task
    /// out of sync. One task's failure never aborts the rest.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RunInProgress`] when another pass holds the run
    /// token, and fatal state-store or directory-scan errors. Per-task
    /// remote failures land in the report instead.
    pub async fn sync_all_tasks(&self) -> Result<SyncReport, SyncError> {
        let Ok(mut store) = self.store.try_lock() else {
            return Err(SyncError::RunInProgress);
        };
        let result = self.run(&mut store).await;
        match &result {
            Ok(report) => {
                self.set_state(RunState::Done);
                info!(
                    created = report.created,
                    updated = report.updated,
                    closed = report.closed,
                    unchanged = report.unchanged,
                    errors = report.errors.len(),
                    "sync pass finished"
                );
            }
            Err(err) => {
                self.set_state(RunState::Failed);
                warn!(error = %err, "sync pass failed");
            }
        }
        result
    }

    async fn run(&self, store: &mut SyncStateStore) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        self.set_state(RunState::Parsing);
        let files = discover_task_files(&self.config.specs_dir).map_err(|source| {
            SyncError::SpecsDir { path: self.config.specs_dir.clone(), source }
        })?;
        let mut tasks = Vec::new();
        let mut failed_files = HashSet::new();
        for file in files {
            match std::fs::read_to_string(&file) {
                Ok(content) => tasks.extend(parser::parse(&content, &file)),
                Err(err) => {
                    let path = file.display().to_string();
                    report.errors.push(SyncProblem {
                        subject: path.clone(),
                        message: format!("failed to read task file: {err}"),
                    });
                    failed_files.insert(path);
                }
            }
        }
        debug!(tasks = tasks.len(), "parsed task files");

        self.set_state(RunState::Reconciling);
        let mut current_ids: HashSet<String> = HashSet::new();
        for task in &tasks {
            if !current_ids.insert(task.id.clone()) {
                // Same id in two files; syncing both would ping-pong the
                // remote issue. Keep the first, flag the rest.
                report.errors.push(SyncProblem {
                    subject: task.id.clone(),
                    message: format!("duplicate task id across files ({}), skipped", task.file_path),
                });
                continue;
            }
            let hash = task.fingerprint();
            if !store.needs_sync(task, &hash)? {
                report.unchanged += 1;
                continue;
            }
            let existing = store.get(&task.id)?.cloned();
            match self.push_task(task, &hash, existing.as_ref()).await {
                Ok(outcome) => {
                    store.upsert(outcome.state)?;
                    store.save()?;
                    if outcome.created {
                        report.created += 1;
                    } else {
                        report.updated += 1;
                    }
                }
                Err(err) => report.errors.push(SyncProblem {
                    subject: task.id.clone(),
                    message: err.to_string(),
                }),
            }
        }

        let orphans = store.cleanup_orphaned_states(&current_ids)?;
        for state in orphans {
            if failed_files.contains(&state.file_path) {
                // The source file did not read this run; its tasks are not
                // gone, just unseen. Keep the state, close nothing.
                debug!(task_id = %state.task_id, "orphan skipped, source file unreadable");
                store.upsert(state)?;
                continue;
            }
            match self.tracker.close_issue(state.remote_issue_number).await {
                Ok(_) => {
                    debug!(task_id = %state.task_id, issue = state.remote_issue_number, "closed orphaned issue");
                    report.closed += 1;
                    store.save()?;
                }
                Err(err) => {
                    report.errors.push(SyncProblem {
                        subject: state.task_id.clone(),
                        message: err.to_string(),
                    });
                    // Restore the record so the close is retried next run.
                    store.upsert(state)?;
                    store.save()?;
                }
            }
        }
        store.save()?;
        Ok(report)
    }

    async fn push_task(
        &self,
        task: &Task,
        hash: &str,
        existing: Option<&SyncState>,
    ) -> Result<PushOutcome, RemoteError> {
        let title = issue_title(task);
        let body = issue_body(task, Utc::now());
        if let Some(state) = existing {
            let issue =
                self.tracker.update_issue(state.remote_issue_number, &title, &body).await?;
            debug!(task_id = %task.id, issue = issue.number, "updated issue");
            Ok(PushOutcome { state: new_state(task, hash, issue.number), created: false })
        } else if let Some(found) = self.tracker.find_issue_by_label(&task.id).await? {
            // No local state, but the tracker already has this task —
            // typically after a lost state file. Adopt instead of duplicating.
            let issue = self.tracker.update_issue(found.number, &title, &body).await?;
            debug!(task_id = %task.id, issue = issue.number, "adopted existing issue");
            Ok(PushOutcome { state: new_state(task, hash, issue.number), created: false })
        } else {
            let labels = vec![task.id.clone(), "tasksync".to_string()];
            let issue = self.tracker.create_issue(&title, &body, &labels).await?;
            debug!(task_id = %task.id, issue = issue.number, "created issue");
            Ok(PushOutcome { state: new_state(task, hash, issue.number), created: true })
        }
    }
}

/// Recursively collects `tasks.md` files under `root`, sorted for a stable
/// processing order.
///
/// # Errors
///
/// Returns the first I/O error hit while scanning.
pub fn discover_task_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_task_files(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_task_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_task_files(&path, files)?;
        } else if path.file_name().is_some_and(|name| name == "tasks.md") {
            files.push(path);
        }
    }
    Ok(())
}

fn new_state(task: &Task, hash: &str, issue_number: u64) -> SyncState {
    SyncState {
        task_id: task.id.clone(),
        remote_issue_number: issue_number,
        last_synced: Utc::now(),
        last_hash: hash.to_string(),
        file_path: task.file_path.clone(),
    }
}

/// Issue title: `[<id>] <title>`, greppable by task id.
fn issue_title(task: &Task) -> String {
    format!("[{}] {}", task.id, task.title)
}

/// Issue body: task description plus a provenance block pointing back at
/// the source line.
fn issue_body(task: &Task, synced_at: DateTime<Utc>) -> String {
    let mut body = String::new();
    if let Some(description) = &task.description {
        body.push_str(description);
        body.push_str("\n\n");
    }
    body.push_str("---\n");
    let _ = writeln!(body, "**Task:** {}", task.id);
    let _ = writeln!(body, "**Spec:** {}", task.spec_name);
    let _ = writeln!(body, "**Status:** {}", task.status.as_str());
    let _ = writeln!(body, "**Source:** {}:{}", task.file_path, task.line_number);
    if !task.requirements.is_empty() {
        let _ = writeln!(body, "**Requirements:** {}", task.requirements.join(", "));
    }
    let _ = write!(
        body,
        "\n_Last synced: {}_",
        synced_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    body
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    use tokio::sync::Notify;

    use super::*;
    use crate::parser::TaskStatus;
    use crate::remote::{IssueFuture, RemoteIssue};

    /// In-memory tracker double that records every mutating call.
    struct MockTracker {
        issues: StdMutex<HashMap<u64, RemoteIssue>>,
        calls: StdMutex<Vec<String>>,
        next_number: AtomicU64,
        fail_title_containing: Option<String>,
        create_gate: Option<Arc<Notify>>,
    }

    impl MockTracker {
        fn new() -> Self {
            Self {
                issues: StdMutex::new(HashMap::new()),
                calls: StdMutex::new(Vec::new()),
                next_number: AtomicU64::new(1),
                fail_title_containing: None,
                create_gate: None,
            }
        }

        fn failing_creates_containing(substring: &str) -> Self {
            Self { fail_title_containing: Some(substring.to_string()), ..Self::new() }
        }

        fn with_create_gate(gate: Arc<Notify>) -> Self {
            Self { create_gate: Some(gate), ..Self::new() }
        }

        fn seed(&self, issue: RemoteIssue) {
            self.issues.lock().unwrap().insert(issue.number, issue);
        }

        fn issue(&self, number: u64) -> RemoteIssue {
            self.issues.lock().unwrap().get(&number).cloned().expect("issue exists")
        }

        fn take_calls(&self) -> Vec<String> {
            std::mem::take(&mut self.calls.lock().unwrap())
        }

        fn mutation_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|call| !call.starts_with("find"))
                .count()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl IssueTracker for MockTracker {
        fn create_issue<'a>(
            &'a self,
            title: &str,
            body: &str,
            labels: &[String],
        ) -> IssueFuture<'a, RemoteIssue> {
            let title = title.to_string();
            let body = body.to_string();
            let labels = labels.to_vec();
            Box::pin(async move {
                if let Some(gate) = &self.create_gate {
                    gate.notified().await;
                }
                self.record(format!("create:{title}"));
                if let Some(substring) = &self.fail_title_containing {
                    if title.contains(substring.as_str()) {
                        return Err(RemoteError::Api {
                            operation: "create_issue",
                            status: 500,
                            message: "simulated failure".to_string(),
                        });
                    }
                }
                let number = self.next_number.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let issue =
                    RemoteIssue { number, title, body, state: "open".to_string(), labels };
                self.issues.lock().unwrap().insert(number, issue.clone());
                Ok(issue)
            })
        }

        fn update_issue<'a>(
            &'a self,
            number: u64,
            title: &str,
            body: &str,
        ) -> IssueFuture<'a, RemoteIssue> {
            let title = title.to_string();
            let body = body.to_string();
            Box::pin(async move {
                self.record(format!("update:{number}"));
                let mut issues = self.issues.lock().unwrap();
                let issue = issues
                    .get_mut(&number)
                    .ok_or(RemoteError::NotFound { operation: "update_issue" })?;
                issue.title = title;
                issue.body = body;
                Ok(issue.clone())
            })
        }

        fn close_issue(&self, number: u64) -> IssueFuture<'_, RemoteIssue> {
            Box::pin(async move {
                self.record(format!("close:{number}"));
                let mut issues = self.issues.lock().unwrap();
                let issue = issues
                    .get_mut(&number)
                    .ok_or(RemoteError::NotFound { operation: "close_issue" })?;
                issue.state = "closed".to_string();
                Ok(issue.clone())
            })
        }

        fn find_issue_by_label<'a>(&'a self, label: &str) -> IssueFuture<'a, Option<RemoteIssue>> {
            let label = label.to_string();
            Box::pin(async move {
                self.record(format!("find:{label}"));
                let issues = self.issues.lock().unwrap();
                Ok(issues.values().find(|issue| issue.labels.contains(&label)).cloned())
            })
        }
    }

    fn test_config(root: &Path) -> SyncConfig {
        SyncConfig {
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            token: "test-token".to_string(),
            api_base_url: "https://api.github.example".to_string(),
            specs_dir: root.join("specs"),
            state_path: root.join("state.json"),
            max_retries: 1,
            retry_delay_ms: 1,
            rate_limit_buffer: 100,
            request_timeout_secs: 5,
        }
    }

    fn write_tasks(root: &Path, spec: &str, content: &str) {
        let dir = root.join("specs").join(spec);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tasks.md"), content).unwrap();
    }

    fn orchestrator(root: &Path, tracker: Arc<dyn IssueTracker>) -> SyncOrchestrator {
        let config = test_config(root);
        let mut store = SyncStateStore::new(config.state_path.clone());
        store.load().unwrap();
        SyncOrchestrator::new(config, store, tracker)
    }

    fn sample_task() -> Task {
        Task {
            id: "1.1".to_string(),
            title: "Set up repo".to_string(),
            status: TaskStatus::InProgress,
            description: Some("Some notes".to_string()),
            requirements: vec!["R1".to_string(), "R2".to_string()],
            file_path: "specs/demo/tasks.md".to_string(),
            line_number: 3,
            spec_name: "demo".to_string(),
        }
    }

    #[test]
    fn issue_title_embeds_task_id() {
        assert_eq!(issue_title(&sample_task()), "[1.1] Set up repo");
    }

    #[test]
    fn issue_body_includes_provenance_block() {
        let body = issue_body(&sample_task(), Utc::now());
        assert!(body.starts_with("Some notes\n"));
        assert!(body.contains("**Task:** 1.1"));
        assert!(body.contains("**Spec:** demo"));
        assert!(body.contains("**Status:** in_progress"));
        assert!(body.contains("**Source:** specs/demo/tasks.md:3"));
        assert!(body.contains("**Requirements:** R1, R2"));
        assert!(body.contains("_Last synced: "));
    }

    #[tokio::test]
    async fn first_run_creates_issues_and_records_state() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n- [x] 1.2 Second task\n");
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);

        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 0);
        assert!(report.is_clean());
        assert_eq!(orch.run_state(), RunState::Done);

        // State was persisted for both tasks.
        let mut store = SyncStateStore::new(dir.path().join("state.json"));
        store.load().unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert!(store.get("1.1").unwrap().is_some());
        assert!(store.get("1.2").unwrap().is_some());
    }

    #[tokio::test]
    async fn second_run_over_unchanged_sources_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n- [x] 1.2 Second task\n");
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);

        orch.sync_all_tasks().await.unwrap();
        mock.take_calls();

        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.unchanged, 2);
        assert_eq!(report.created + report.updated + report.closed, 0);
        assert_eq!(mock.mutation_count(), 0);
        assert!(mock.take_calls().is_empty());
    }

    #[tokio::test]
    async fn changed_task_updates_its_issue() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n");
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);
        orch.sync_all_tasks().await.unwrap();

        write_tasks(dir.path(), "demo", "- [x] 1.1 First task\n");
        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);
        assert!(mock.issue(1).body.contains("**Status:** completed"));
    }

    #[tokio::test]
    async fn relocated_task_updates_without_closing() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n");
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);
        orch.sync_all_tasks().await.unwrap();

        // Same content, different file.
        std::fs::remove_dir_all(dir.path().join("specs").join("demo")).unwrap();
        write_tasks(dir.path(), "renamed", "- [ ] 1.1 First task\n");
        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.closed, 0);
        assert!(mock.issue(1).body.contains("specs/renamed/tasks.md"));
    }

    #[tokio::test]
    async fn orphaned_task_closes_its_issue_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n- [ ] 1.2 Second task\n");
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);
        orch.sync_all_tasks().await.unwrap();

        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n");
        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.closed, 1);
        assert_eq!(mock.issue(2).state, "closed");

        mock.take_calls();
        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.closed, 0);
        assert_eq!(mock.mutation_count(), 0);
    }

    #[tokio::test]
    async fn adopts_existing_issue_when_state_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n");
        let mock = Arc::new(MockTracker::new());
        mock.seed(RemoteIssue {
            number: 77,
            title: "[1.1] First task".to_string(),
            body: "stale body".to_string(),
            state: "open".to_string(),
            labels: vec!["1.1".to_string(), "tasksync".to_string()],
        });
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);

        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 1);
        assert!(mock.issue(77).body.contains("**Task:** 1.1"));

        let mut store = SyncStateStore::new(dir.path().join("state.json"));
        store.load().unwrap();
        assert_eq!(store.get("1.1").unwrap().unwrap().remote_issue_number, 77);
    }

    #[tokio::test]
    async fn one_failing_task_does_not_abort_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 Doomed task\n- [ ] 1.2 Fine task\n");
        let mock = Arc::new(MockTracker::failing_creates_containing("Doomed"));
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);

        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].subject, "1.1");
        assert_eq!(orch.run_state(), RunState::Done);
    }

    #[tokio::test]
    async fn overlapping_runs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "demo", "- [ ] 1.1 First task\n");
        let gate = Arc::new(Notify::new());
        let mock = Arc::new(MockTracker::with_create_gate(Arc::clone(&gate)));
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);

        let (first, second) = tokio::join!(orch.sync_all_tasks(), async {
            tokio::task::yield_now().await;
            let result = orch.sync_all_tasks().await;
            gate.notify_one();
            result
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(SyncError::RunInProgress)));
    }

    #[tokio::test]
    async fn missing_specs_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);

        let result = orch.sync_all_tasks().await;
        assert!(matches!(result, Err(SyncError::SpecsDir { .. })));
        assert_eq!(orch.run_state(), RunState::Failed);
    }

    #[tokio::test]
    async fn duplicate_id_across_files_is_flagged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "alpha", "- [ ] 1.1 From alpha\n");
        write_tasks(dir.path(), "beta", "- [ ] 1.1 From beta\n");
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), Arc::clone(&mock) as Arc<dyn IssueTracker>);

        let report = orch.sync_all_tasks().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("duplicate task id"));
    }

    #[test]
    fn watcher_flag_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTracker::new());
        let orch = orchestrator(dir.path(), mock);
        assert!(!orch.is_watching());
        orch.start_watcher();
        assert!(orch.is_watching());
        orch.stop_watcher();
        assert!(!orch.is_watching());
    }

    #[test]
    fn discovery_finds_nested_task_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_tasks(dir.path(), "zeta", "- [ ] 1 Task\n");
        write_tasks(dir.path(), "alpha", "- [ ] 2 Task\n");
        std::fs::write(dir.path().join("specs").join("notes.md"), "not a task file").unwrap();

        let files = discover_task_files(&dir.path().join("specs")).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("alpha/tasks.md"));
        assert!(files[1].ends_with("zeta/tasks.md"));
    }
}
