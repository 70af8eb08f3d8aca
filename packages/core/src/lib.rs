//! Core domain types for the job feed importer.
//!
//! This crate contains shared types used across all packages:
//! - Job and JobCandidate for postings and their validation
//! - ImportLog and RunStats for the audit trail of each import run
//! - ImportTask and QueuedTask for units of queued work
//! - Queue settings, stats and health

mod import_log;
mod job;
mod page;
mod queue;
mod task;

pub use import_log::{
    ErrorContext, ErrorDetail, ImportLog, ImportLogFilter, ImportLogId, ImportLogSortField,
    ImportLogSummary, ImportStats, ImportStatus, ImportTotals, MAX_ERROR_DETAILS, NO_JOBS_FOUND,
    RunStats, SourceImportStats,
};
pub use job::{
    DESCRIPTION_MAX_CHARS, Job, JobCandidate, JobFilter, JobId, JobSortField, JobStats, KeyCount,
    SourceStats, ValidationError,
};
pub use page::{MAX_PAGE_SIZE, Page, PageRequest, Pagination, SortOrder};
pub use queue::{HealthStatus, QueueHealth, QueueSettings, QueueState, QueueStats};
pub use task::{
    IMPORT_TASK_NAME, ImportTask, Priority, QueuedTask, TaskId, TaskOutcome, TaskStatus,
};
