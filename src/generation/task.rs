//! Generation task records, progress events and outcomes.

use crate::generation::model::ImageData;
use crate::metadata::Artifact;
use crate::preset::PresetSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque parameter bag handed to the model (prompt, seed, size, ...).
///
/// Keys are ordered so the bag serializes the same way every time.
pub type GenerationParameters = BTreeMap<String, Value>;

/// Task identifier, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocate the next task ID
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TaskId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Snapshot of a task as seen by callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    pub task_id: TaskId,
    pub parameters: GenerationParameters,
    /// Preset content resolved at submit time
    pub preset: Option<PresetSnapshot>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preparing,
    Sampling,
    Finalizing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub phase: Phase,
    /// Always within `[0, 1]`
    pub fraction_complete: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ImageData>,
}

impl ProgressEvent {
    pub fn new(task_id: TaskId, phase: Phase, fraction: f32, preview: Option<ImageData>) -> Self {
        let fraction_complete = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        Self {
            task_id,
            phase,
            fraction_complete,
            preview,
        }
    }
}

/// Terminal result of a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Succeeded(Artifact),
    Failed { error: String },
    Cancelled,
}

impl TaskOutcome {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Succeeded(_) => TaskStatus::Succeeded,
            TaskOutcome::Failed { .. } => TaskStatus::Failed,
            TaskOutcome::Cancelled => TaskStatus::Cancelled,
        }
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            TaskOutcome::Succeeded(artifact) => Some(artifact),
            _ => None,
        }
    }
}

/// Item yielded when observing a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    Progress(ProgressEvent),
    Finished(TaskOutcome),
}
