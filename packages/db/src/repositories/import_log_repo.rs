//! Import log repository: creation, checkpoints, finalization and history queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use jobfeed_core::{
    ErrorDetail, ImportLog, ImportLogFilter, ImportLogId, ImportLogSortField, ImportLogSummary,
    ImportStats, ImportStatus, ImportTotals, MAX_ERROR_DETAILS, Page, PageRequest, RunStats,
    SortOrder, SourceImportStats,
};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime as SurrealDatetime, Thing};

use crate::{Database, DbError};

const TABLE: &str = "import_log";

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct ImportLogRecord {
    id: Thing,
    file_name: String,
    source: String,
    status: ImportStatus,
    #[serde(default)]
    total_fetched: u64,
    #[serde(default)]
    total_imported: u64,
    #[serde(default)]
    new_jobs: u64,
    #[serde(default)]
    updated_jobs: u64,
    #[serde(default)]
    failed_jobs: u64,
    #[serde(default)]
    skipped_jobs: u64,
    #[serde(default)]
    error_details: Vec<ErrorDetail>,
    processing_time_ms: Option<u64>,
    import_date_time: SurrealDatetime,
    completed_at: Option<SurrealDatetime>,
    created_at: SurrealDatetime,
    updated_at: SurrealDatetime,
}

impl ImportLogRecord {
    fn into_log(self) -> Result<ImportLog, DbError> {
        let raw = self.id.id.to_raw();
        let id = ImportLogId::parse(&raw).map_err(|_| DbError::InvalidId(raw))?;
        Ok(ImportLog {
            id,
            file_name: self.file_name,
            source: self.source,
            status: self.status,
            total_fetched: self.total_fetched,
            total_imported: self.total_imported,
            new_jobs: self.new_jobs,
            updated_jobs: self.updated_jobs,
            failed_jobs: self.failed_jobs,
            skipped_jobs: self.skipped_jobs,
            error_details: self.error_details,
            processing_time_ms: self.processing_time_ms,
            import_date_time: self.import_date_time.0,
            completed_at: self.completed_at.map(|d| d.0),
            created_at: self.created_at.0,
            updated_at: self.updated_at.0,
        })
    }
}

/// Struct for creating logs.
#[derive(Debug, Serialize)]
struct ImportLogCreate {
    file_name: String,
    source: String,
    status: ImportStatus,
    total_fetched: u64,
    total_imported: u64,
    new_jobs: u64,
    updated_jobs: u64,
    failed_jobs: u64,
    skipped_jobs: u64,
    error_details: Vec<ErrorDetail>,
    import_date_time: SurrealDatetime,
    created_at: SurrealDatetime,
    updated_at: SurrealDatetime,
}

/// Counter update written by checkpoints and finalization.
#[derive(Debug, Serialize)]
struct ProgressUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<ImportStatus>,
    total_fetched: u64,
    total_imported: u64,
    new_jobs: u64,
    updated_jobs: u64,
    failed_jobs: u64,
    skipped_jobs: u64,
    error_details: Vec<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<SurrealDatetime>,
    updated_at: SurrealDatetime,
}

impl ProgressUpdate {
    fn from_stats(stats: &RunStats) -> Self {
        Self {
            status: None,
            total_fetched: stats.total_fetched,
            total_imported: stats.total_imported,
            new_jobs: stats.new_jobs,
            updated_jobs: stats.updated_jobs,
            failed_jobs: stats.failed_jobs,
            skipped_jobs: stats.skipped_jobs,
            error_details: stats
                .error_details
                .iter()
                .take(MAX_ERROR_DETAILS)
                .cloned()
                .collect(),
            processing_time_ms: None,
            completed_at: None,
            updated_at: SurrealDatetime::from(Utc::now()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

/// Repository for import log persistence operations.
#[derive(Debug, Clone)]
pub struct ImportLogRepository {
    db: Database,
}

impl ImportLogRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new log.
    pub async fn create(&self, log: &ImportLog) -> Result<ImportLog, DbError> {
        let create = ImportLogCreate {
            file_name: log.file_name.clone(),
            source: log.source.clone(),
            status: log.status,
            total_fetched: log.total_fetched,
            total_imported: log.total_imported,
            new_jobs: log.new_jobs,
            updated_jobs: log.updated_jobs,
            failed_jobs: log.failed_jobs,
            skipped_jobs: log.skipped_jobs,
            error_details: log.error_details.clone(),
            import_date_time: SurrealDatetime::from(log.import_date_time),
            created_at: SurrealDatetime::from(log.created_at),
            updated_at: SurrealDatetime::from(log.updated_at),
        };

        let record: Option<ImportLogRecord> = self
            .db
            .create((TABLE, log.id.to_string()))
            .content(create)
            .await?;

        record
            .ok_or_else(|| DbError::Query("Failed to create import log".into()))?
            .into_log()
    }

    /// Get a log by ID.
    pub async fn get(&self, id: ImportLogId) -> Result<ImportLog, DbError> {
        let record: Option<ImportLogRecord> = self.db.select((TABLE, id.to_string())).await?;

        record
            .ok_or_else(|| DbError::NotFound(format!("Import log not found: {}", id)))?
            .into_log()
    }

    /// Write running counters without changing status.
    pub async fn checkpoint(&self, id: ImportLogId, stats: &RunStats) -> Result<(), DbError> {
        let record: Option<ImportLogRecord> = self
            .db
            .update((TABLE, id.to_string()))
            .merge(ProgressUpdate::from_stats(stats))
            .await?;

        record
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("Import log not found: {}", id)))
    }

    /// Move a log to a terminal status with its final counters.
    pub async fn finalize(
        &self,
        id: ImportLogId,
        status: ImportStatus,
        stats: &RunStats,
        processing_time_ms: u64,
    ) -> Result<ImportLog, DbError> {
        if !status.is_terminal() {
            return Err(DbError::Query(format!(
                "Cannot finalize import log with status {status}"
            )));
        }

        let mut update = ProgressUpdate::from_stats(stats);
        update.status = Some(status);
        update.processing_time_ms = Some(processing_time_ms);
        update.completed_at = Some(update.updated_at.clone());

        let record: Option<ImportLogRecord> = self
            .db
            .update((TABLE, id.to_string()))
            .merge(update)
            .await?;

        record
            .ok_or_else(|| DbError::NotFound(format!("Import log not found: {}", id)))?
            .into_log()
    }

    /// Put a log back to in_progress for another attempt, clearing the previous result.
    pub async fn reopen(&self, id: ImportLogId) -> Result<ImportLog, DbError> {
        let mut result = self
            .db
            .query(
                "UPDATE type::thing('import_log', $id) SET status = 'in_progress', \
                 total_fetched = 0, total_imported = 0, new_jobs = 0, updated_jobs = 0, \
                 failed_jobs = 0, skipped_jobs = 0, error_details = [], \
                 processing_time_ms = NONE, completed_at = NONE, updated_at = time::now() \
                 RETURN AFTER",
            )
            .bind(("id", id.to_string()))
            .await?;

        let records: Vec<ImportLogRecord> = result.take(0)?;

        records
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("Import log not found: {}", id)))?
            .into_log()
    }

    /// List log summaries with filtering, sorting and pagination.
    pub async fn list(
        &self,
        filter: &ImportLogFilter,
        sort: ImportLogSortField,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<ImportLogSummary>, DbError> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<(&str, serde_json::Value)> = Vec::new();

        if let Some(status) = &filter.status {
            conditions.push("status = $status");
            bindings.push(("status", serde_json::json!(status.as_str())));
        }

        if let Some(source) = &filter.source {
            conditions.push("source = $source");
            bindings.push(("source", serde_json::json!(source)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT count() AS total FROM import_log {where_clause} GROUP ALL; \
             SELECT * FROM import_log {where_clause} ORDER BY {} {} LIMIT $limit START $start;",
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
        let records: Vec<ImportLogRecord> = response.take(1)?;

        let summaries = records
            .into_iter()
            .map(|r| r.into_log().map(|log| ImportLogSummary::from(&log)))
            .collect::<Result<Vec<_>, _>>()?;

        let total = counts.first().map(|c| c.total).unwrap_or(0);
        Ok(Page::new(summaries, page, total))
    }

    /// Delete a log.
    pub async fn delete(&self, id: ImportLogId) -> Result<(), DbError> {
        let record: Option<ImportLogRecord> = self.db.delete((TABLE, id.to_string())).await?;

        record
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("Import log not found: {}", id)))
    }

    /// Delete terminal logs created before `cutoff`; in-progress logs are kept.
    ///
    /// Returns the number of deleted logs.
    pub async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                "DELETE import_log WHERE created_at < $cutoff AND status != 'in_progress' \
                 RETURN BEFORE",
            )
            .bind(("cutoff", SurrealDatetime::from(cutoff)))
            .await?;

        let deleted: Vec<ImportLogRecord> = result.take(0)?;

        Ok(deleted.len() as u64)
    }

    /// Aggregate import activity overall and per source.
    pub async fn stats(&self) -> Result<ImportStats, DbError> {
        #[derive(Deserialize)]
        struct Row {
            source: String,
            status: ImportStatus,
            #[serde(default)]
            total_imported: u64,
            #[serde(default)]
            new_jobs: u64,
            #[serde(default)]
            updated_jobs: u64,
            #[serde(default)]
            failed_jobs: u64,
            processing_time_ms: Option<u64>,
        }

        let mut result = self
            .db
            .query(
                "SELECT source, status, total_imported, new_jobs, updated_jobs, failed_jobs, \
                 processing_time_ms FROM import_log",
            )
            .await?;

        let rows: Vec<Row> = result.take(0)?;

        #[derive(Default)]
        struct Acc {
            imports: u64,
            completed: u64,
            jobs: u64,
            time_total: u64,
            time_count: u64,
        }

        impl Acc {
            fn avg_time(&self) -> Option<f64> {
                (self.time_count > 0).then(|| self.time_total as f64 / self.time_count as f64)
            }
        }

        let mut overall = ImportTotals::default();
        let mut overall_time = Acc::default();
        let mut per_source: BTreeMap<String, Acc> = BTreeMap::new();

        for row in rows {
            overall.total_imports += 1;
            match row.status {
                ImportStatus::Completed => overall.successful_imports += 1,
                ImportStatus::Failed => overall.failed_imports += 1,
                ImportStatus::InProgress => {}
            }
            overall.total_jobs_imported += row.total_imported;
            overall.total_new_jobs += row.new_jobs;
            overall.total_updated_jobs += row.updated_jobs;
            overall.total_failed_jobs += row.failed_jobs;

            let acc = per_source.entry(row.source).or_default();
            acc.imports += 1;
            acc.jobs += row.total_imported;
            if row.status == ImportStatus::Completed {
                acc.completed += 1;
            }
            if let Some(ms) = row.processing_time_ms {
                acc.time_total += ms;
                acc.time_count += 1;
                overall_time.time_total += ms;
                overall_time.time_count += 1;
            }
        }
        overall.avg_processing_time_ms = overall_time.avg_time();

        let mut source_stats: Vec<SourceImportStats> = per_source
            .into_iter()
            .map(|(source, acc)| SourceImportStats {
                source,
                import_count: acc.imports,
                total_jobs: acc.jobs,
                success_rate: acc.completed as f64 / acc.imports as f64,
                avg_processing_time_ms: acc.avg_time(),
            })
            .collect();
        source_stats.sort_by(|a, b| {
            b.total_jobs
                .cmp(&a.total_jobs)
                .then_with(|| a.source.cmp(&b.source))
        });

        Ok(ImportStats {
            overall,
            source_stats,
        })
    }
}
