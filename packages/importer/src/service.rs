//! Facade over the import system: triggering, queue administration and read models.

use std::sync::Arc;

use actors::{TaskQueue, WorkerPool};
use chrono::{Duration, Utc};
use db::Database;
use db::repositories::{ImportLogRepository, JobRepository};
use feed::FeedFetcher;
use jobfeed_core::{
    ErrorDetail, ImportLog, ImportLogFilter, ImportLogId, ImportLogSortField, ImportLogSummary,
    ImportStats, ImportStatus, ImportTask, Job, JobFilter, JobId, JobSortField, JobStats, Page,
    PageRequest, Priority, QueueHealth, QueueStats, QueuedTask, RunStats, SortOrder, TaskId,
    TaskStatus,
};
use serde::Serialize;
use url::Url;

use crate::config::AppConfig;
use crate::error::{ServiceError, TaskExecutionError};
use crate::pipeline::{ImportPipeline, ImportRun};

/// Age in days after which finished import logs are cleaned up by default.
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 30;

/// What a trigger queued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredImport {
    pub task_ids: Vec<TaskId>,
    pub import_log_ids: Vec<ImportLogId>,
    /// Valid URLs the trigger considered.
    pub urls: Vec<String>,
}

/// The running import system.
///
/// Owns the task queue and worker pool; both stop on [`ImportService::shutdown`].
pub struct ImportService {
    sources: Vec<String>,
    queue: TaskQueue,
    pool: WorkerPool,
    pipeline: ImportPipeline,
    jobs: JobRepository,
    logs: ImportLogRepository,
}

impl ImportService {
    /// Start the queue and the worker pool over `db`.
    pub async fn start(db: Database, config: &AppConfig) -> Result<Self, ServiceError> {
        let fetcher = FeedFetcher::new(&config.fetcher)?;
        let pipeline = ImportPipeline::new(db.clone(), fetcher);

        let queue = TaskQueue::start(db.clone(), config.queue.clone()).await?;
        let pool = WorkerPool::start(&queue, Arc::new(pipeline.clone()), config.pool.clone()).await?;

        tracing::info!(
            workers = config.pool.concurrency,
            sources = config.sources.len(),
            "Import service started"
        );

        Ok(Self {
            sources: config.sources.clone(),
            queue,
            pool,
            pipeline,
            jobs: JobRepository::new(db.clone()),
            logs: ImportLogRepository::new(db),
        })
    }

    /// Create an in-progress import log for a source URL.
    pub async fn create_import_log(&self, source_url: &str) -> Result<ImportLog, ServiceError> {
        tracing::info!("Creating import log for: {}", source_url);
        let log = ImportLog::new(source_url, feed::source_name(source_url));
        Ok(self.logs.create(&log).await?)
    }

    pub async fn enqueue_import_task(&self, task: ImportTask) -> Result<QueuedTask, ServiceError> {
        Ok(self.queue.enqueue(task).await?)
    }

    /// Run one attempt of a task in the caller's context, outside the worker pool.
    pub async fn run_import_task(&self, task: &QueuedTask) -> Result<ImportRun, TaskExecutionError> {
        self.pipeline.run(task).await
    }

    /// Create a log and queue a task for each valid http(s) URL.
    ///
    /// `None` or an empty list imports the configured sources. Invalid URLs
    /// are skipped and a failure on one URL does not stop the others.
    pub async fn trigger_import(
        &self,
        urls: Option<Vec<String>>,
        priority: Priority,
    ) -> Result<TriggeredImport, ServiceError> {
        let urls = match urls {
            Some(urls) if !urls.is_empty() => urls,
            _ => self.sources.clone(),
        };

        let valid: Vec<String> = urls
            .into_iter()
            .filter(|url| {
                let ok = is_http_url(url);
                if !ok {
                    tracing::warn!("Skipping invalid source URL: {}", url);
                }
                ok
            })
            .collect();

        if valid.is_empty() {
            return Err(ServiceError::InvalidInput("No valid URLs provided".into()));
        }

        let mut triggered = TriggeredImport {
            task_ids: Vec::new(),
            import_log_ids: Vec::new(),
            urls: valid.clone(),
        };

        for url in valid {
            let log = match self.create_import_log(&url).await {
                Ok(log) => log,
                Err(e) => {
                    tracing::error!("Failed to queue import for {}: {}", url, e);
                    continue;
                }
            };
            triggered.import_log_ids.push(log.id);

            let task = ImportTask::new(url.as_str(), log.id).with_priority(priority);
            match self.queue.enqueue(task).await {
                Ok(queued) => triggered.task_ids.push(queued.id),
                Err(e) => {
                    tracing::error!("Failed to queue import for {}: {}", url, e);
                    self.abandon_log(log.id, &e.to_string()).await;
                }
            }
        }

        tracing::info!("Queued {} import jobs", triggered.task_ids.len());
        Ok(triggered)
    }

    /// Fail a log whose task never made it into the queue.
    async fn abandon_log(&self, id: ImportLogId, reason: &str) {
        let mut stats = RunStats::default();
        stats.push_error(ErrorDetail::new(reason));
        if let Err(e) = self.logs.finalize(id, ImportStatus::Failed, &stats, 0).await {
            tracing::warn!("Failed to mark import log {} failed: {}", id, e);
        }
    }

    pub async fn queue_stats(&self) -> Result<QueueStats, ServiceError> {
        Ok(self.queue.stats().await?)
    }

    pub async fn queue_health(&self) -> Result<QueueHealth, ServiceError> {
        Ok(self.queue.health().await?)
    }

    /// Discard every queued task and its history. Operator recovery only.
    pub async fn clear_queue(&self) -> Result<u64, ServiceError> {
        Ok(self.queue.clear().await?)
    }

    pub async fn retry_failed_tasks(&self) -> Result<u64, ServiceError> {
        Ok(self.queue.retry_failed().await?)
    }

    pub fn pause_queue(&self) -> Result<(), ServiceError> {
        Ok(self.queue.pause()?)
    }

    pub fn resume_queue(&self) -> Result<(), ServiceError> {
        Ok(self.queue.resume()?)
    }

    pub async fn get_task(&self, id: TaskId) -> Result<QueuedTask, ServiceError> {
        self.queue
            .get_task(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Task not found: {}", id)))
    }

    /// Terminally failed tasks, newest first.
    pub async fn list_failed_tasks(&self, limit: usize) -> Result<Vec<QueuedTask>, ServiceError> {
        Ok(self.queue.list_tasks(TaskStatus::Failed, limit).await?)
    }

    pub async fn list_import_logs(
        &self,
        filter: &ImportLogFilter,
        sort: ImportLogSortField,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<ImportLogSummary>, ServiceError> {
        Ok(self.logs.list(filter, sort, order, page).await?)
    }

    pub async fn get_import_log(&self, id: ImportLogId) -> Result<ImportLog, ServiceError> {
        Ok(self.logs.get(id).await?)
    }

    pub async fn delete_import_log(&self, id: ImportLogId) -> Result<(), ServiceError> {
        self.logs.delete(id).await?;
        tracing::info!("Deleted import log {}", id);
        Ok(())
    }

    pub async fn import_stats(&self) -> Result<ImportStats, ServiceError> {
        Ok(self.logs.stats().await?)
    }

    /// Delete finished logs older than `days_to_keep` days (default 30).
    pub async fn cleanup_import_logs(&self, days_to_keep: Option<u32>) -> Result<u64, ServiceError> {
        let days = days_to_keep.unwrap_or(DEFAULT_LOG_RETENTION_DAYS);
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        let deleted = self.logs.cleanup_older_than(cutoff).await?;
        tracing::info!("Cleaned up {} import logs older than {} days", deleted, days);
        Ok(deleted)
    }

    /// Active jobs matching `filter`.
    pub async fn list_jobs(
        &self,
        filter: &JobFilter,
        sort: JobSortField,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<Job>, ServiceError> {
        Ok(self.jobs.list(filter, sort, order, page).await?)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job, ServiceError> {
        Ok(self.jobs.get(id).await?)
    }

    pub async fn job_stats(&self) -> Result<JobStats, ServiceError> {
        Ok(self.jobs.stats().await?)
    }

    /// Stop taking work, let in-flight imports finish, then stop the queue.
    pub async fn shutdown(self) -> Result<(), ServiceError> {
        tracing::info!("Shutting down import service");
        self.queue.drain()?;
        self.pool.shutdown().await?;
        self.queue.shutdown().await?;
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}
