#![allow(clippy::disallowed_methods)]

mod common;

use chrono::{Duration, Utc};
use jobfeed_core::{
    ErrorDetail, ImportLog, ImportLogFilter, ImportLogId, ImportLogSortField, ImportStatus,
    ImportTask, JobFilter, JobSortField, PageRequest, Priority, QueuedTask, RunStats, SortOrder,
    TaskOutcome, TaskStatus,
};
use std::error::Error;

use db::DbError;
use db::repositories::{ImportLogRepository, JobRepository, TaskRepository, UpsertOutcome};

#[tokio::test]
async fn test_upsert_creates_then_updates_by_identity() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = JobRepository::new(db);

    let first = common::candidate("123", "Senior Designer", "jobicy.com");
    let created = jobs.upsert(&first).await?;
    assert!(created.is_created());

    let mut second = first.clone();
    second.location = "Berlin".to_string();
    let updated = jobs.upsert(&second).await?;
    let UpsertOutcome::Updated(job) = updated else {
        panic!("expected update, got {updated:?}");
    };

    assert_eq!(job.id, created.job().id);
    assert_eq!(job.location, "Berlin");
    assert_eq!(job.created_at, created.job().created_at);
    assert!(job.updated_at >= created.job().updated_at);
    assert_eq!(jobs.count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_same_external_id_from_other_source_is_a_new_job() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = JobRepository::new(db);

    jobs.upsert(&common::candidate("123", "Senior Designer", "jobicy.com"))
        .await?;
    let other = jobs
        .upsert(&common::candidate("123", "Senior Designer", "higheredjobs.com"))
        .await?;

    assert!(other.is_created());
    assert_eq!(jobs.count().await?, 2);

    Ok(())
}

#[tokio::test]
async fn test_store_rejects_oversized_title() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = JobRepository::new(db);

    let long_title = "x".repeat(201);
    let result = jobs
        .upsert(&common::candidate("9", &long_title, "jobicy.com"))
        .await;

    assert!(matches!(result, Err(DbError::Surreal(_))));
    assert_eq!(jobs.count().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_job_listing_and_stats() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = JobRepository::new(db);

    for i in 0..3 {
        jobs.upsert(&common::candidate(&i.to_string(), "Senior Designer", "jobicy.com"))
            .await?;
    }
    let mut dev = common::candidate("50", "Rust Developer", "weworkremotely.com");
    dev.category = "development".to_string();
    dev.job_type = "contract".to_string();
    jobs.upsert(&dev).await?;

    let page = jobs
        .list(
            &JobFilter {
                search: Some("rust".to_string()),
                ..Default::default()
            },
            JobSortField::CreatedAt,
            SortOrder::Desc,
            PageRequest::default(),
        )
        .await?;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "Rust Developer");
    assert_eq!(page.pagination.total_items, 1);

    let page = jobs
        .list(
            &JobFilter {
                source: Some("jobicy.com".to_string()),
                ..Default::default()
            },
            JobSortField::Title,
            SortOrder::Asc,
            PageRequest::new(2, 2),
        )
        .await?;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.pagination.total_pages, 2);
    assert!(page.pagination.has_prev);
    assert!(!page.pagination.has_next);

    let stats = jobs.stats().await?;
    assert_eq!(stats.total_jobs, 4);
    assert_eq!(stats.recent_jobs, 4);
    assert_eq!(stats.source_stats[0].source, "jobicy.com");
    assert_eq!(stats.source_stats[0].count, 3);
    assert_eq!(stats.source_stats[0].categories, vec!["design".to_string()]);
    assert_eq!(stats.source_stats[1].job_types, vec!["contract".to_string()]);
    assert_eq!(stats.category_stats[0].key, "design");
    assert_eq!(stats.job_type_stats.len(), 2);

    let missing = jobs.get(jobfeed_core::JobId::new()).await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_import_log_lifecycle() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let logs = ImportLogRepository::new(db);

    let log = ImportLog::new("https://jobicy.com/?feed=job_feed", "jobicy.com");
    let created = logs.create(&log).await?;
    assert_eq!(created.id, log.id);
    assert_eq!(created.status, ImportStatus::InProgress);

    let mut stats = RunStats::new(7);
    for _ in 0..5 {
        stats.record_created();
    }
    logs.checkpoint(log.id, &stats).await?;
    let checkpointed = logs.get(log.id).await?;
    assert_eq!(checkpointed.new_jobs, 5);
    assert_eq!(checkpointed.status, ImportStatus::InProgress);

    stats.record_updated();
    stats.record_failure(ErrorDetail::new("title too long"));
    let done = logs
        .finalize(log.id, ImportStatus::Completed, &stats, 1200)
        .await?;
    assert_eq!(done.status, ImportStatus::Completed);
    assert_eq!(done.total_imported, 6);
    assert_eq!(done.failed_jobs, 1);
    assert_eq!(done.error_details.len(), 1);
    assert_eq!(done.error_details[0].message, "title too long");
    assert_eq!(done.processing_time_ms, Some(1200));
    assert!(done.completed_at.is_some());

    let reopened = logs.reopen(log.id).await?;
    assert_eq!(reopened.status, ImportStatus::InProgress);
    assert_eq!(reopened.total_imported, 0);
    assert!(reopened.completed_at.is_none());
    assert!(reopened.error_details.is_empty());

    let bad = logs
        .finalize(log.id, ImportStatus::InProgress, &stats, 0)
        .await;
    assert!(matches!(bad, Err(DbError::Query(_))));

    logs.delete(log.id).await?;
    let missing = logs.get(log.id).await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));
    let missing_delete = logs.delete(ImportLogId::new()).await;
    assert!(matches!(missing_delete, Err(DbError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_import_log_listing_stats_and_cleanup() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let logs = ImportLogRepository::new(db);

    let mut old_done = ImportLog::new("https://jobicy.com/?feed=job_feed", "jobicy.com");
    old_done.created_at = Utc::now() - Duration::days(40);
    let mut old_running = ImportLog::new("https://jobicy.com/?feed=job_feed", "jobicy.com");
    old_running.created_at = Utc::now() - Duration::days(40);
    let fresh = ImportLog::new("https://higheredjobs.com/rss", "higheredjobs.com");

    for log in [&old_done, &old_running, &fresh] {
        logs.create(log).await?;
    }

    let mut stats = RunStats::new(3);
    stats.record_created();
    stats.record_created();
    stats.record_updated();
    logs.finalize(old_done.id, ImportStatus::Completed, &stats, 100)
        .await?;
    logs.finalize(fresh.id, ImportStatus::Failed, &RunStats::default(), 300)
        .await?;

    let completed = logs
        .list(
            &ImportLogFilter {
                status: Some(ImportStatus::Completed),
                ..Default::default()
            },
            ImportLogSortField::CreatedAt,
            SortOrder::Desc,
            PageRequest::default(),
        )
        .await?;
    assert_eq!(completed.items.len(), 1);
    assert_eq!(completed.items[0].id, old_done.id);
    assert_eq!(completed.items[0].total_imported, 3);

    let by_source = logs
        .list(
            &ImportLogFilter {
                source: Some("jobicy.com".to_string()),
                ..Default::default()
            },
            ImportLogSortField::TotalImported,
            SortOrder::Desc,
            PageRequest::default(),
        )
        .await?;
    assert_eq!(by_source.pagination.total_items, 2);
    assert_eq!(by_source.items[0].id, old_done.id);

    let import_stats = logs.stats().await?;
    assert_eq!(import_stats.overall.total_imports, 3);
    assert_eq!(import_stats.overall.successful_imports, 1);
    assert_eq!(import_stats.overall.failed_imports, 1);
    assert_eq!(import_stats.overall.total_jobs_imported, 3);
    assert_eq!(import_stats.overall.avg_processing_time_ms, Some(200.0));
    assert_eq!(import_stats.source_stats[0].source, "jobicy.com");
    assert_eq!(import_stats.source_stats[0].success_rate, 0.5);

    let deleted = logs.cleanup_older_than(Utc::now() - Duration::days(30)).await?;
    assert_eq!(deleted, 1);
    assert!(logs.get(old_running.id).await.is_ok());
    assert!(logs.get(fresh.id).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_task_repository() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let tasks = TaskRepository::new(db);

    let mut task = QueuedTask::new(
        ImportTask::new("https://jobicy.com/?feed=job_feed", ImportLogId::new())
            .with_priority(Priority::High),
    );
    tasks.save(&task).await?;

    let loaded = tasks.get(task.id).await?.ok_or("task missing")?;
    assert_eq!(loaded.data, task.data);
    assert_eq!(loaded.priority, Priority::High);
    assert_eq!(loaded.status, TaskStatus::Waiting);

    task.status = TaskStatus::Completed;
    task.attempts_made = 1;
    task.finished_on = Some(Utc::now());
    task.return_value = Some(TaskOutcome::new("imported 3 jobs"));
    tasks.save(&task).await?;

    let completed = tasks.list_by_status(TaskStatus::Completed, 10).await?;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].attempts_made, 1);
    assert_eq!(
        completed[0].return_value.as_ref().map(|o| o.summary.as_str()),
        Some("imported 3 jobs")
    );
    assert!(tasks.list_by_status(TaskStatus::Waiting, 10).await?.is_empty());

    let other = QueuedTask::new(ImportTask::new("https://a.test/feed", ImportLogId::new()));
    tasks.save(&other).await?;
    assert_eq!(tasks.list_all().await?.len(), 2);

    tasks.delete(task.id).await?;
    assert!(tasks.get(task.id).await?.is_none());

    tasks.clear().await?;
    assert!(tasks.list_all().await?.is_empty());

    Ok(())
}
