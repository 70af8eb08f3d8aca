//! One import attempt end to end: fetch, parse, normalize, reconcile, finalize.

use std::time::Instant;

use actors::{HandlerFuture, TaskHandler};
use db::Database;
use db::repositories::ImportLogRepository;
use feed::FeedFetcher;
use jobfeed_core::{
    ErrorDetail, ImportLog, ImportLogId, ImportStatus, NO_JOBS_FOUND, QueuedTask, RunStats,
    TaskOutcome,
};
use serde::Serialize;

use crate::error::TaskExecutionError;
use crate::reconciler::Reconciler;

/// Result of a successful import attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRun {
    pub import_log_id: ImportLogId,
    pub status: ImportStatus,
    pub stats: RunStats,
    pub processing_time_ms: u64,
}

/// The work a worker does for one import task.
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    fetcher: FeedFetcher,
    logs: ImportLogRepository,
    reconciler: Reconciler,
}

impl ImportPipeline {
    pub fn new(db: Database, fetcher: FeedFetcher) -> Self {
        Self {
            fetcher,
            logs: ImportLogRepository::new(db.clone()),
            reconciler: Reconciler::new(db),
        }
    }

    /// Run one attempt of `task`.
    ///
    /// A fetch failure finalizes the import log as failed and is returned so the
    /// queue can retry. A feed without items completes with an informational entry.
    #[tracing::instrument(
        name = "import",
        skip_all,
        fields(task_id = %task.id, source_url = %task.data.source_url)
    )]
    pub async fn run(&self, task: &QueuedTask) -> Result<ImportRun, TaskExecutionError> {
        let started = Instant::now();
        let log_id = task.data.import_log_id;
        let source_url = task.data.source_url.as_str();

        self.prepare_log(log_id, task.attempts_made).await;
        tracing::info!("Processing job import for: {}", source_url);

        let bytes = match self.fetcher.fetch(source_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = TaskExecutionError::from(e);
                tracing::error!("Job processing failed for {}: {}", source_url, err);
                self.record_failure(log_id, &err, started).await;
                return Err(err);
            }
        };

        let items = feed::parse(&bytes);
        if items.is_empty() {
            tracing::warn!("No jobs found from {}", source_url);
            let mut stats = RunStats::new(0);
            stats.push_error(ErrorDetail::new(NO_JOBS_FOUND));
            return self.finish(log_id, stats, started).await;
        }

        let normalized = feed::normalize_all(&items, source_url);
        let mut stats = RunStats::new(items.len() as u64);
        stats.skipped_jobs = normalized.dropped.len() as u64;

        let stats = self
            .reconciler
            .reconcile_with(stats, &normalized.candidates, source_url, log_id)
            .await;

        self.finish(log_id, stats, started).await
    }

    /// Make sure the log describes this attempt, not an earlier one.
    async fn prepare_log(&self, log_id: ImportLogId, attempt: u32) {
        let stale = match self.logs.get(log_id).await {
            Ok(log) => attempt > 1 || log.status.is_terminal(),
            Err(e) => {
                tracing::warn!("Import log {} unavailable: {}", log_id, e);
                return;
            }
        };

        if stale {
            tracing::info!("Reopening import log {} for attempt {}", log_id, attempt);
            if let Err(e) = self.logs.reopen(log_id).await {
                tracing::warn!("Failed to reopen import log {}: {}", log_id, e);
            }
        }
    }

    async fn finish(
        &self,
        log_id: ImportLogId,
        stats: RunStats,
        started: Instant,
    ) -> Result<ImportRun, TaskExecutionError> {
        let processing_time_ms = elapsed_ms(started);
        let log: ImportLog = self
            .logs
            .finalize(log_id, ImportStatus::Completed, &stats, processing_time_ms)
            .await?;

        tracing::info!(
            "Updated import log {} with status: {}",
            log.id,
            log.status
        );

        Ok(ImportRun {
            import_log_id: log.id,
            status: log.status,
            stats,
            processing_time_ms,
        })
    }

    async fn record_failure(&self, log_id: ImportLogId, err: &TaskExecutionError, started: Instant) {
        let mut stats = RunStats::default();
        stats.push_error(ErrorDetail::new(err.to_string()));

        if let Err(e) = self
            .logs
            .finalize(log_id, ImportStatus::Failed, &stats, elapsed_ms(started))
            .await
        {
            tracing::warn!("Failed to mark import log {} failed: {}", log_id, e);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl TaskHandler for ImportPipeline {
    fn handle(&self, task: &QueuedTask) -> HandlerFuture {
        let pipeline = self.clone();
        let task = task.clone();
        Box::pin(async move {
            let run = pipeline.run(&task).await.map_err(|e| e.to_string())?;
            let summary = format!(
                "Imported {} of {} jobs ({} new, {} updated, {} failed)",
                run.stats.total_imported,
                run.stats.total_fetched,
                run.stats.new_jobs,
                run.stats.updated_jobs,
                run.stats.failed_jobs
            );
            Ok(TaskOutcome {
                summary,
                output: serde_json::to_value(&run).ok(),
            })
        })
    }
}
