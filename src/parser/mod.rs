//! Markdown task list parser.
//!
//! Scans spec documents for checkbox items (`- [ ] 1.2 Title`) and turns
//! them into [`Task`] records. Parsing is a pure function of its input:
//! two scans of identical content yield structurally equal output.

mod task;

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

pub use task::{title_hash, Task, TaskStatus};

/// A checkbox list item: `- [<marker>] <rest>`.
static TASK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*\[([^\]]*)\]\s*(.*)$").expect("valid task line regex"));

/// Dotted numeric id followed by the title, e.g. `1.2 Add parser`.
static ID_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+(\S.*)$").expect("valid id regex"));

/// Dotted numeric id with a trailing period, e.g. `1. Add parser`.
static ID_DOT_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.\s+(\S.*)$").expect("valid id regex"));

/// `_Requirements: a, b, c_` marker line (italics optional).
static REQUIREMENTS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*_?\s*[Rr]equirements:\s*(.*?)_?\s*$").expect("valid requirements regex")
});

/// Horizontal rule, which terminates the current task block.
static HORIZONTAL_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").expect("valid rule regex"));

/// A line that starts like a checkbox item but never closes the bracket.
static BROKEN_CHECKBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*\[[^\]]*$").expect("valid broken checkbox regex"));

/// Task under construction during the line scan.
struct Draft {
    id: String,
    title: String,
    status: TaskStatus,
    description: Vec<String>,
    requirements: Vec<String>,
    line_number: usize,
}

/// Parses markdown content into tasks, in document order.
///
/// Lines that do not belong to any task block are ignored, never fatal.
/// Duplicate ids within the file keep the first occurrence; later ones are
/// dropped with a warning (use [`validate`] to surface them to the user).
#[must_use]
pub fn parse(content: &str, file_path: &Path) -> Vec<Task> {
    let spec_name = spec_name_for(file_path);
    let file_path = file_path.display().to_string();

    let mut tasks = Vec::new();
    let mut seen = HashSet::new();
    for draft in scan(content) {
        if !seen.insert(draft.id.clone()) {
            warn!(
                id = %draft.id,
                file = %file_path,
                line = draft.line_number,
                "duplicate task id, keeping the first occurrence"
            );
            continue;
        }
        let description = draft.description.join("\n").trim().to_string();
        tasks.push(Task {
            id: draft.id,
            title: draft.title,
            status: draft.status,
            description: (!description.is_empty()).then_some(description),
            requirements: draft.requirements,
            file_path: file_path.clone(),
            line_number: draft.line_number,
            spec_name: spec_name.clone(),
        });
    }
    tasks
}

/// Reports quality problems without aborting: duplicate ids, checkbox-looking
/// lines that fail to parse, and checkbox items with no title.
#[must_use]
pub fn validate(content: &str, file_path: &Path) -> Vec<String> {
    let file = file_path.display().to_string();
    let mut problems = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        if let Some(caps) = TASK_LINE.captures(line) {
            if caps[2].trim().is_empty() {
                problems.push(format!("{file}:{line_number}: checkbox item has no title"));
            }
        } else if BROKEN_CHECKBOX.is_match(line) {
            problems.push(format!(
                "{file}:{line_number}: line looks like a checkbox item but does not parse"
            ));
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    for draft in scan(content) {
        if !seen.insert(draft.id.clone()) {
            problems.push(format!(
                "{file}:{}: duplicate task id \"{}\"",
                draft.line_number, draft.id
            ));
        }
    }

    problems
}

/// Single forward scan maintaining a current-task accumulator.
fn scan(content: &str) -> Vec<Draft> {
    let mut drafts = Vec::new();
    let mut current: Option<Draft> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;

        if let Some(caps) = TASK_LINE.captures(line) {
            if let Some(draft) = current.take() {
                drafts.push(draft);
            }
            let rest = caps[2].trim();
            if rest.is_empty() {
                // Checkbox with no title; not a task, reported by validate().
                continue;
            }
            let (id, title) = split_id_title(rest);
            current = Some(Draft {
                id,
                title,
                status: status_for(&caps[1]),
                description: Vec::new(),
                requirements: Vec::new(),
                line_number,
            });
            continue;
        }

        if is_header(line) || HORIZONTAL_RULE.is_match(line) {
            if let Some(draft) = current.take() {
                drafts.push(draft);
            }
            continue;
        }

        let Some(draft) = current.as_mut() else { continue };

        if let Some(caps) = REQUIREMENTS_LINE.captures(line) {
            draft.requirements = caps[1]
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(String::from)
                .collect();
            continue;
        }

        if is_description_line(line) {
            draft.description.push(line.trim().to_string());
        }
    }

    if let Some(draft) = current.take() {
        drafts.push(draft);
    }
    drafts
}

/// Status from the bracket contents, checked in precedence order:
/// completed, then in-progress, then not-started. Malformed markers are
/// common in hand-edited docs, so the ordering matters.
fn status_for(marker: &str) -> TaskStatus {
    if marker.trim().eq_ignore_ascii_case("x") {
        TaskStatus::Completed
    } else if marker == "-" {
        // `[ - ]` with extra spacing is deliberately NOT in-progress.
        TaskStatus::InProgress
    } else {
        TaskStatus::NotStarted
    }
}

/// Splits the remainder of a task line into id and title.
///
/// Tries a dotted numeric id, then the same with a trailing period, then
/// falls back to hashing the whole remainder as the title. First match wins.
fn split_id_title(rest: &str) -> (String, String) {
    if let Some(caps) = ID_TITLE.captures(rest) {
        (caps[1].to_string(), caps[2].trim().to_string())
    } else if let Some(caps) = ID_DOT_TITLE.captures(rest) {
        (caps[1].to_string(), caps[2].trim().to_string())
    } else {
        (title_hash(rest), rest.to_string())
    }
}

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Description content: bulleted or indented continuation lines.
fn is_description_line(line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    let trimmed = line.trim_start();
    line.starts_with(' ') || line.starts_with('\t') || trimmed.starts_with('-') || trimmed.starts_with('*')
}

/// Spec name for a task file: the path segment following a `specs`
/// directory, or the parent directory name as fallback.
fn spec_name_for(path: &Path) -> String {
    let components: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(pos) = components.iter().position(|c| c == "specs") {
        // The segment after `specs` must be a directory, not the file itself.
        if pos + 2 < components.len() {
            return components[pos + 1].clone();
        }
    }
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
