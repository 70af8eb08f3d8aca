//! Import log domain types: the audit record of one import run per source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::JobCandidate;

/// Unique identifier for an import log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportLogId(pub Ulid);

impl ImportLogId {
    /// Create a new unique import log ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse an import log ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for ImportLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImportLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an import log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    #[default]
    InProgress,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::InProgress => "in_progress",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(ImportStatus::InProgress),
            "completed" => Some(ImportStatus::Completed),
            "failed" => Some(ImportStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error samples kept per import log.
pub const MAX_ERROR_DETAILS: usize = 10;

/// Message recorded when a feed produced nothing to import.
pub const NO_JOBS_FOUND: &str = "No jobs found in feed";

/// Identifying fields of the candidate an error entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub source: String,
    /// 1-based position in the feed.
    pub index: usize,
}

/// One bounded error sample on an import log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorDetail {
    /// A run-level entry with no candidate attached.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            timestamp: Utc::now(),
        }
    }

    /// An entry for the candidate at `index` (0-based) in the batch.
    pub fn for_candidate(message: impl Into<String>, candidate: &JobCandidate, index: usize) -> Self {
        fn or_missing(value: &str) -> String {
            if value.trim().is_empty() {
                "missing".to_string()
            } else {
                value.to_string()
            }
        }

        Self {
            message: message.into(),
            context: Some(ErrorContext {
                external_id: or_missing(&candidate.external_id),
                title: or_missing(&candidate.title),
                company: or_missing(&candidate.company),
                source: or_missing(&candidate.source),
                index: index + 1,
            }),
            timestamp: Utc::now(),
        }
    }
}

/// Running counters of one import run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    /// Raw items found in the feed.
    pub total_fetched: u64,
    /// Always `new_jobs + updated_jobs`.
    pub total_imported: u64,
    pub new_jobs: u64,
    pub updated_jobs: u64,
    /// Candidates whose persistence failed.
    pub failed_jobs: u64,
    /// Items dropped by candidate validation.
    pub skipped_jobs: u64,
    /// Oldest-first, at most [`MAX_ERROR_DETAILS`].
    pub error_details: Vec<ErrorDetail>,
}

impl RunStats {
    pub fn new(total_fetched: u64) -> Self {
        Self {
            total_fetched,
            ..Default::default()
        }
    }

    pub fn record_created(&mut self) {
        self.new_jobs += 1;
        self.total_imported += 1;
    }

    pub fn record_updated(&mut self) {
        self.updated_jobs += 1;
        self.total_imported += 1;
    }

    /// Count a persistence failure; the sample is kept only while below the cap.
    pub fn record_failure(&mut self, detail: ErrorDetail) {
        self.failed_jobs += 1;
        self.push_error(detail);
    }

    /// Keep an error sample without touching counters.
    pub fn push_error(&mut self, detail: ErrorDetail) {
        if self.error_details.len() < MAX_ERROR_DETAILS {
            self.error_details.push(detail);
        }
    }

    /// Candidates that reached the reconciler.
    pub fn processed(&self) -> u64 {
        self.total_imported + self.failed_jobs
    }

    /// Imported share of reconciled candidates, as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let processed = self.processed();
        if processed == 0 {
            None
        } else {
            Some(self.total_imported as f64 / processed as f64 * 100.0)
        }
    }
}

/// Audit record for one (trigger, source) import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLog {
    pub id: ImportLogId,
    /// The source URL.
    pub file_name: String,
    /// Feed host name, `www.` stripped.
    pub source: String,
    pub status: ImportStatus,
    pub total_fetched: u64,
    pub total_imported: u64,
    pub new_jobs: u64,
    pub updated_jobs: u64,
    pub failed_jobs: u64,
    pub skipped_jobs: u64,
    pub error_details: Vec<ErrorDetail>,
    /// Wall time of the run in milliseconds, set on finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    pub import_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportLog {
    /// Create a new in-progress log for a source URL.
    pub fn new(source_url: impl Into<String>, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ImportLogId::new(),
            file_name: source_url.into(),
            source: source.into(),
            status: ImportStatus::InProgress,
            total_fetched: 0,
            total_imported: 0,
            new_jobs: 0,
            updated_jobs: 0,
            failed_jobs: 0,
            skipped_jobs: 0,
            error_details: Vec::new(),
            processing_time_ms: None,
            import_date_time: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy run counters onto this log.
    pub fn apply_stats(&mut self, stats: &RunStats) {
        self.total_fetched = stats.total_fetched;
        self.total_imported = stats.total_imported;
        self.new_jobs = stats.new_jobs;
        self.updated_jobs = stats.updated_jobs;
        self.failed_jobs = stats.failed_jobs;
        self.skipped_jobs = stats.skipped_jobs;
        self.error_details = stats
            .error_details
            .iter()
            .take(MAX_ERROR_DETAILS)
            .cloned()
            .collect();
    }

    /// Counters of this log as run statistics.
    pub fn stats(&self) -> RunStats {
        RunStats {
            total_fetched: self.total_fetched,
            total_imported: self.total_imported,
            new_jobs: self.new_jobs,
            updated_jobs: self.updated_jobs,
            failed_jobs: self.failed_jobs,
            skipped_jobs: self.skipped_jobs,
            error_details: self.error_details.clone(),
        }
    }
}

/// Compact listing view of an import log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLogSummary {
    pub id: ImportLogId,
    pub file_name: String,
    pub source: String,
    pub status: ImportStatus,
    pub total_fetched: u64,
    pub total_imported: u64,
    pub new_jobs: u64,
    pub updated_jobs: u64,
    pub failed_jobs: u64,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    pub import_date_time: DateTime<Utc>,
}

impl From<&ImportLog> for ImportLogSummary {
    fn from(log: &ImportLog) -> Self {
        Self {
            id: log.id,
            file_name: log.file_name.clone(),
            source: log.source.clone(),
            status: log.status,
            total_fetched: log.total_fetched,
            total_imported: log.total_imported,
            new_jobs: log.new_jobs,
            updated_jobs: log.updated_jobs,
            failed_jobs: log.failed_jobs,
            error_count: log.error_details.len(),
            processing_time_ms: log.processing_time_ms,
            import_date_time: log.import_date_time,
        }
    }
}

/// Filter options for listing import logs.
#[derive(Debug, Default, Clone)]
pub struct ImportLogFilter {
    pub status: Option<ImportStatus>,
    pub source: Option<String>,
}

/// Sortable import log fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportLogSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    ImportDateTime,
    TotalImported,
}

impl ImportLogSortField {
    /// Stored field name.
    pub fn as_field(&self) -> &'static str {
        match self {
            ImportLogSortField::CreatedAt => "created_at",
            ImportLogSortField::UpdatedAt => "updated_at",
            ImportLogSortField::ImportDateTime => "import_date_time",
            ImportLogSortField::TotalImported => "total_imported",
        }
    }
}

/// Totals across every import log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportTotals {
    pub total_imports: u64,
    pub successful_imports: u64,
    pub failed_imports: u64,
    pub total_jobs_imported: u64,
    pub total_new_jobs: u64,
    pub total_updated_jobs: u64,
    pub total_failed_jobs: u64,
    pub avg_processing_time_ms: Option<f64>,
}

/// Import activity of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceImportStats {
    pub source: String,
    pub import_count: u64,
    pub total_jobs: u64,
    /// Completed share of this source's imports, between 0 and 1.
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_processing_time_ms: Option<f64>,
}

/// Aggregate view over import logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub overall: ImportTotals,
    /// Sorted by total jobs, largest first.
    pub source_stats: Vec<SourceImportStats>,
}
