//! Core task record type.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Completion state of a checkbox item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// `[ ]` (or any unrecognized marker).
    NotStarted,
    /// `[-]`.
    InProgress,
    /// `[x]` / `[X]`.
    Completed,
}

impl TaskStatus {
    /// Canonical lowercase name, used in fingerprints and issue bodies.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// One checkbox task extracted from a markdown spec document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Dotted numeric identifier (e.g. "1.2"), or a hash of the title when
    /// the line carries no numeric id. Unique within a file.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Status derived from the checkbox glyph.
    pub status: TaskStatus,
    /// Free text captured from the lines following the task line.
    #[serde(default)]
    pub description: Option<String>,
    /// Requirement tags from a `_Requirements: ..._` marker line.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Source file the task was parsed from.
    pub file_path: String,
    /// 1-based line number of the task line.
    pub line_number: usize,
    /// Name of the spec the file belongs to.
    pub spec_name: String,
}

impl Task {
    /// Content fingerprint over `{title, description, status, requirements}`.
    ///
    /// Provenance fields are deliberately excluded: two tasks with the same
    /// fingerprint are content-equivalent regardless of where they live.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0x1f]);
        if let Some(description) = &self.description {
            hasher.update(description.as_bytes());
        }
        hasher.update([0x1f]);
        hasher.update(self.status.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.requirements.join(",").as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Derives a short stable id from a title, for task lines with no numeric id.
#[must_use]
pub fn title_hash(title: &str) -> String {
    let digest = Sha256::digest(title.as_bytes());
    format!("{digest:x}")[..8].to_string()
}
