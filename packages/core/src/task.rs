//! Task domain types for units of import work held by the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ImportLogId;

/// Unique identifier for a queued task, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Create a new unique task ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a task ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority level for task dispatch order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    /// Scheduled imports.
    #[default]
    Normal = 1,
    /// Manually triggered imports.
    High = 2,
    Critical = 3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Payload of an import task: which feed to pull and which log to report into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTask {
    pub source_url: String,
    pub import_log_id: ImportLogId,
    #[serde(default)]
    pub priority: Priority,
}

impl ImportTask {
    pub fn new(source_url: impl Into<String>, import_log_id: ImportLogId) -> Self {
        Self {
            source_url: source_url.into(),
            import_log_id,
            priority: Priority::default(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Where a task currently sits in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Ready to be picked up by a worker.
    #[default]
    Waiting,
    /// Currently executing on a worker.
    Active,
    /// Failed an attempt and waiting out its backoff.
    Delayed,
    Completed,
    /// Exhausted its attempts.
    Failed,
}

impl TaskStatus {
    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Get a simple status string for display and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Active => "active",
            TaskStatus::Delayed => "delayed",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse a status string as produced by [`TaskStatus::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(TaskStatus::Waiting),
            "active" => Some(TaskStatus::Active),
            "delayed" => Some(TaskStatus::Delayed),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successfully handled task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Human-readable summary of the result.
    pub summary: String,
    /// Optional structured output data as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

impl TaskOutcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            output: None,
        }
    }
}

/// Name every import task is queued under.
pub const IMPORT_TASK_NAME: &str = "import-jobs";

/// The queue's record of one import task across all of its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTask {
    /// Queue-assigned identifier.
    pub id: TaskId,
    /// Task name used for logging.
    pub name: String,
    /// The import to run.
    pub data: ImportTask,
    /// Dispatch priority.
    pub priority: Priority,
    pub status: TaskStatus,
    /// Number of attempts started so far.
    #[serde(default)]
    pub attempts_made: u32,
    /// Attempts allowed before the task is terminally failed.
    pub max_attempts: u32,
    /// Error message of the most recent failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    /// Outcome of the successful attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<TaskOutcome>,
    /// When a delayed task becomes eligible again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// When the latest attempt started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_on: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_on: Option<DateTime<Utc>>,
}

impl QueuedTask {
    /// Create a new waiting task for an import.
    pub fn new(data: ImportTask) -> Self {
        Self {
            id: TaskId::new(),
            name: IMPORT_TASK_NAME.to_string(),
            priority: data.priority,
            data,
            status: TaskStatus::Waiting,
            attempts_made: 0,
            max_attempts: 3,
            failed_reason: None,
            return_value: None,
            retry_at: None,
            created_at: Utc::now(),
            processed_on: None,
            finished_on: None,
        }
    }

    /// Set the max attempts for this task.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Whether another attempt is allowed after the current one failed.
    pub fn can_retry(&self) -> bool {
        self.attempts_made < self.max_attempts
    }
}
