//! Job repository: identity lookups, upserts, listing and stats.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use jobfeed_core::{
    Job, JobCandidate, JobFilter, JobId, JobSortField, JobStats, KeyCount, Page, PageRequest,
    SortOrder, SourceStats,
};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime as SurrealDatetime, Thing};

use crate::{Database, DbError};

const TABLE: &str = "job";

/// Categories reported in [`JobStats::category_stats`].
const TOP_CATEGORIES: usize = 10;

/// Result of reconciling one candidate against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// No job had this identity; a new one was created.
    Created(Job),
    /// An existing job was overwritten in place.
    Updated(Job),
}

impl UpsertOutcome {
    pub fn job(&self) -> &Job {
        match self {
            UpsertOutcome::Created(job) | UpsertOutcome::Updated(job) => job,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct JobRecord {
    id: Thing,
    external_id: String,
    source: String,
    title: String,
    company: String,
    location: String,
    description: String,
    job_type: String,
    category: String,
    salary: String,
    url: String,
    published_date: SurrealDatetime,
    source_url: String,
    is_active: bool,
    created_at: SurrealDatetime,
    updated_at: SurrealDatetime,
}

impl JobRecord {
    fn into_job(self) -> Result<Job, DbError> {
        let raw = self.id.id.to_raw();
        let id = JobId::parse(&raw).map_err(|_| DbError::InvalidId(raw))?;
        Ok(Job {
            id,
            external_id: self.external_id,
            source: self.source,
            title: self.title,
            company: self.company,
            location: self.location,
            description: self.description,
            job_type: self.job_type,
            category: self.category,
            salary: self.salary,
            url: self.url,
            published_date: self.published_date.0,
            source_url: self.source_url,
            is_active: self.is_active,
            created_at: self.created_at.0,
            updated_at: self.updated_at.0,
        })
    }
}

/// Struct for creating jobs.
#[derive(Debug, Serialize)]
struct JobCreate {
    external_id: String,
    source: String,
    title: String,
    company: String,
    location: String,
    description: String,
    job_type: String,
    category: String,
    salary: String,
    url: String,
    published_date: SurrealDatetime,
    source_url: String,
    is_active: bool,
    created_at: SurrealDatetime,
    updated_at: SurrealDatetime,
}

impl JobCreate {
    fn new(candidate: &JobCandidate, changes: JobChanges) -> Self {
        Self {
            external_id: candidate.external_id.clone(),
            source: candidate.source.clone(),
            created_at: changes.updated_at.clone(),
            title: changes.title,
            company: changes.company,
            location: changes.location,
            description: changes.description,
            job_type: changes.job_type,
            category: changes.category,
            salary: changes.salary,
            url: changes.url,
            published_date: changes.published_date,
            source_url: changes.source_url,
            is_active: changes.is_active,
            updated_at: changes.updated_at,
        }
    }
}

/// Mutable fields overwritten when an identity is re-imported.
#[derive(Debug, Serialize)]
struct JobChanges {
    title: String,
    company: String,
    location: String,
    description: String,
    job_type: String,
    category: String,
    salary: String,
    url: String,
    published_date: SurrealDatetime,
    source_url: String,
    is_active: bool,
    updated_at: SurrealDatetime,
}

impl JobChanges {
    fn from_candidate(candidate: &JobCandidate, now: DateTime<Utc>) -> Self {
        Self {
            title: candidate.title.clone(),
            company: candidate.company.clone(),
            location: candidate.location.clone(),
            description: candidate.description.clone(),
            job_type: candidate.job_type.clone(),
            category: candidate.category.clone(),
            salary: candidate.salary.clone(),
            url: candidate.url.clone(),
            published_date: SurrealDatetime::from(candidate.published_date),
            source_url: candidate.source_url.clone(),
            is_active: true,
            updated_at: SurrealDatetime::from(now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

fn first_count(rows: Vec<CountRow>) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

/// Repository for job persistence operations.
#[derive(Debug, Clone)]
pub struct JobRepository {
    db: Database,
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up a job by its `(external_id, source)` identity.
    pub async fn find_by_identity(
        &self,
        external_id: &str,
        source: &str,
    ) -> Result<Option<Job>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM job WHERE external_id = $external_id AND source = $source LIMIT 1")
            .bind(("external_id", external_id.to_string()))
            .bind(("source", source.to_string()))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;

        records.into_iter().next().map(JobRecord::into_job).transpose()
    }

    /// Create or overwrite the job with the candidate's identity.
    ///
    /// `created_at` of an existing job is preserved and `updated_at` bumped.
    pub async fn upsert(&self, candidate: &JobCandidate) -> Result<UpsertOutcome, DbError> {
        let now = Utc::now();
        let changes = JobChanges::from_candidate(candidate, now);

        match self
            .find_by_identity(&candidate.external_id, &candidate.source)
            .await?
        {
            Some(existing) => {
                let record: Option<JobRecord> = self
                    .db
                    .update((TABLE, existing.id.to_string()))
                    .merge(changes)
                    .await?;

                let job = record
                    .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", existing.id)))?
                    .into_job()?;
                Ok(UpsertOutcome::Updated(job))
            }
            None => {
                let id = JobId::new();
                let create = JobCreate::new(candidate, changes);

                let record: Option<JobRecord> =
                    self.db.create((TABLE, id.to_string())).content(create).await?;

                let job = record
                    .ok_or_else(|| DbError::Query("Failed to create job".into()))?
                    .into_job()?;
                Ok(UpsertOutcome::Created(job))
            }
        }
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Job, DbError> {
        let record: Option<JobRecord> = self.db.select((TABLE, id.to_string())).await?;

        record
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))?
            .into_job()
    }

    /// List active jobs with filtering, sorting and pagination.
    pub async fn list(
        &self,
        filter: &JobFilter,
        sort: JobSortField,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<Job>, DbError> {
        let mut conditions = vec!["is_active = true"];
        let mut bindings: Vec<(&str, serde_json::Value)> = Vec::new();

        if let Some(category) = &filter.category {
            conditions.push("category = $category");
            bindings.push(("category", serde_json::json!(category)));
        }

        if let Some(job_type) = &filter.job_type {
            conditions.push("job_type = $job_type");
            bindings.push(("job_type", serde_json::json!(job_type)));
        }

        if let Some(source) = &filter.source {
            conditions.push("source = $source");
            bindings.push(("source", serde_json::json!(source)));
        }

        if let Some(search) = filter.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            conditions.push(
                "(string::lowercase(title) CONTAINS $search \
                 OR string::lowercase(company) CONTAINS $search \
                 OR string::lowercase(description) CONTAINS $search \
                 OR string::lowercase(location) CONTAINS $search)",
            );
            bindings.push(("search", serde_json::json!(search.to_lowercase())));
        }

        let where_clause = conditions.join(" AND ");
        let query = format!(
            "SELECT count() AS total FROM job WHERE {where_clause} GROUP ALL; \
             SELECT * FROM job WHERE {where_clause} ORDER BY {} {} LIMIT $limit START $start;",
            sort.as_field(),
            order.as_keyword(),
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("limit", page.limit as i64))
            .bind(("start", page.offset() as i64));

        for (name, value) in bindings {
            result = result.bind((name, value));
        }

        let mut response = result.await?;
        let counts: Vec<CountRow> = response.take(0)?;
        let records: Vec<JobRecord> = response.take(1)?;

        let jobs = records
            .into_iter()
            .map(JobRecord::into_job)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(jobs, page, first_count(counts)))
    }

    /// Count all stored jobs, active or not.
    pub async fn count(&self) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM job GROUP ALL")
            .await?;

        let counts: Vec<CountRow> = result.take(0)?;

        Ok(first_count(counts))
    }

    /// Aggregate counts over active jobs.
    pub async fn stats(&self) -> Result<JobStats, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT count() AS total FROM job WHERE is_active = true GROUP ALL;
                SELECT count() AS total FROM job
                    WHERE is_active = true AND created_at > time::now() - 1d
                    GROUP ALL;
                SELECT source, category, job_type, count() AS count
                    FROM job
                    WHERE is_active = true
                    GROUP BY source, category, job_type;
                "#,
            )
            .await?;

        #[derive(Deserialize)]
        struct GroupCount {
            source: String,
            category: String,
            job_type: String,
            count: u64,
        }

        let total: Vec<CountRow> = result.take(0)?;
        let recent: Vec<CountRow> = result.take(1)?;
        let groups: Vec<GroupCount> = result.take(2)?;

        #[derive(Default)]
        struct SourceAcc {
            count: u64,
            categories: BTreeSet<String>,
            job_types: BTreeSet<String>,
        }

        let mut sources: BTreeMap<String, SourceAcc> = BTreeMap::new();
        let mut categories: BTreeMap<String, u64> = BTreeMap::new();
        let mut job_types: BTreeMap<String, u64> = BTreeMap::new();

        for group in groups {
            let acc = sources.entry(group.source).or_default();
            acc.count += group.count;
            acc.categories.insert(group.category.clone());
            acc.job_types.insert(group.job_type.clone());

            *categories.entry(group.category).or_default() += group.count;
            *job_types.entry(group.job_type).or_default() += group.count;
        }

        let mut source_stats: Vec<SourceStats> = sources
            .into_iter()
            .map(|(source, acc)| SourceStats {
                source,
                count: acc.count,
                categories: acc.categories.into_iter().collect(),
                job_types: acc.job_types.into_iter().collect(),
            })
            .collect();
        source_stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));

        let mut category_stats = ranked(categories);
        category_stats.truncate(TOP_CATEGORIES);

        Ok(JobStats {
            total_jobs: first_count(total),
            recent_jobs: first_count(recent),
            source_stats,
            category_stats,
            job_type_stats: ranked(job_types),
        })
    }
}

/// Counts sorted largest first, ties by key.
fn ranked(counts: BTreeMap<String, u64>) -> Vec<KeyCount> {
    let mut out: Vec<KeyCount> = counts
        .into_iter()
        .map(|(key, count)| KeyCount { key, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    out
}
