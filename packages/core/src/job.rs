//! Job domain types: persisted postings and the candidates normalization produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Unique identifier for a persisted job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum length of a stored description, in characters (marker excluded).
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// A job posting as persisted in the store.
///
/// Identity is the `(external_id, source)` pair; re-importing the same identity
/// updates this record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Identifier assigned by the upstream feed.
    pub external_id: String,
    /// Feed host name, `www.` stripped.
    pub source: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    /// Canonical job type token, e.g. `full-time`.
    pub job_type: String,
    pub category: String,
    pub salary: String,
    /// Link to the posting.
    pub url: String,
    pub published_date: DateTime<Utc>,
    /// Feed URL the posting was imported from.
    pub source_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// The identity key used for upserts.
    pub fn identity(&self) -> (&str, &str) {
        (&self.external_id, &self.source)
    }
}

/// A normalized feed item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCandidate {
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub job_type: String,
    pub category: String,
    pub salary: String,
    pub url: String,
    pub published_date: DateTime<Utc>,
    pub source: String,
    pub source_url: String,
}

/// Why a candidate was dropped before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing {0}")]
    MissingField(&'static str),
    #[error("Title too short (min 3 characters)")]
    TitleTooShort,
    #[error("Company name too short (min 2 characters)")]
    CompanyTooShort,
}

impl JobCandidate {
    /// Identity key this candidate reconciles against.
    pub fn identity(&self) -> (&str, &str) {
        (&self.external_id, &self.source)
    }

    /// Check the fields the pipeline depends on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.validation_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every rule this candidate breaks, in check order.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let required = [
            ("externalId", &self.external_id),
            ("title", &self.title),
            ("company", &self.company),
            ("source", &self.source),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                errors.push(ValidationError::MissingField(name));
            }
        }

        let title = self.title.trim();
        if !title.is_empty() && title.chars().count() < 3 {
            errors.push(ValidationError::TitleTooShort);
        }

        let company = self.company.trim();
        if !company.is_empty() && company.chars().count() < 2 {
            errors.push(ValidationError::CompanyTooShort);
        }

        errors
    }
}

/// Per-source breakdown of active jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source: String,
    pub count: u64,
    /// Distinct categories seen for this source, sorted.
    pub categories: Vec<String>,
    /// Distinct job types seen for this source, sorted.
    pub job_types: Vec<String>,
}

/// A value with the number of active jobs carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCount {
    pub key: String,
    pub count: u64,
}

/// Aggregate view over the job store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub total_jobs: u64,
    /// Jobs created in the last 24 hours.
    pub recent_jobs: u64,
    /// Sorted by count, largest first.
    pub source_stats: Vec<SourceStats>,
    /// Top categories, largest first.
    pub category_stats: Vec<KeyCount>,
    pub job_type_stats: Vec<KeyCount>,
}

/// Filter options for listing jobs.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub category: Option<String>,
    pub job_type: Option<String>,
    pub source: Option<String>,
    /// Case-insensitive match on title, company, description or location.
    pub search: Option<String>,
}

/// Sortable job fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Company,
    PublishedDate,
}

impl JobSortField {
    /// Stored field name.
    pub fn as_field(&self) -> &'static str {
        match self {
            JobSortField::CreatedAt => "created_at",
            JobSortField::UpdatedAt => "updated_at",
            JobSortField::Title => "title",
            JobSortField::Company => "company",
            JobSortField::PublishedDate => "published_date",
        }
    }
}
