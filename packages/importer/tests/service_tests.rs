mod common;

use std::error::Error;
use std::time::Duration;

use importer::{ImportService, ServiceError};
use jobfeed_core::{
    ImportLogFilter, ImportLogSortField, ImportStatus, ImportTask, JobFilter, JobSortField,
    PageRequest, Priority, QueueStats, QueuedTask, SortOrder, TaskStatus,
};

/// Poll queue stats until `done` holds or five seconds pass.
async fn wait_for(
    service: &ImportService,
    done: impl Fn(&QueueStats) -> bool,
) -> Result<QueueStats, Box<dyn Error>> {
    for _ in 0..500 {
        let stats = service.queue_stats().await?;
        if done(&stats) {
            return Ok(stats);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Err(format!("timed out, last stats: {:?}", service.queue_stats().await?).into())
}

#[tokio::test]
async fn test_triggered_import_lands_in_the_store() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/feed")
        .with_status(200)
        .with_body(common::rss_feed(&[
            ("201", "Senior Designer", "Acme"),
            ("202", "Data Scientist", "Globex"),
        ]))
        .create_async()
        .await;

    let mut config = common::fast_config();
    config.sources = vec![format!("{}/feed", server.url())];
    let service = ImportService::start(db, &config).await?;

    let triggered = service.trigger_import(None, Priority::High).await?;
    assert_eq!(triggered.urls, config.sources);
    assert_eq!(triggered.task_ids.len(), 1);
    assert_eq!(triggered.import_log_ids.len(), 1);

    wait_for(&service, |s| s.completed == 1).await?;

    let task = service.get_task(triggered.task_ids[0]).await?;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.priority, Priority::High);

    let log = service.get_import_log(triggered.import_log_ids[0]).await?;
    assert_eq!(log.status, ImportStatus::Completed);
    assert_eq!(log.new_jobs, 2);

    let page = service
        .list_import_logs(
            &ImportLogFilter {
                status: Some(ImportStatus::Completed),
                ..Default::default()
            },
            ImportLogSortField::CreatedAt,
            SortOrder::Desc,
            PageRequest::default(),
        )
        .await?;
    assert_eq!(page.pagination.total_items, 1);
    assert_eq!(page.items[0].id, log.id);

    let jobs = service
        .list_jobs(
            &JobFilter {
                search: Some("scientist".into()),
                ..Default::default()
            },
            JobSortField::CreatedAt,
            SortOrder::Desc,
            PageRequest::new(1, 10),
        )
        .await?;
    assert_eq!(jobs.items.len(), 1);
    let job = service.get_job(jobs.items[0].id).await?;
    assert_eq!(job.company, "Globex");

    let job_stats = service.job_stats().await?;
    assert_eq!(job_stats.total_jobs, 2);
    assert_eq!(job_stats.source_stats.len(), 1);
    assert_eq!(job_stats.source_stats[0].count, 2);

    let import_stats = service.import_stats().await?;
    assert_eq!(import_stats.overall.total_imports, 1);
    assert_eq!(import_stats.overall.successful_imports, 1);
    assert_eq!(import_stats.overall.total_new_jobs, 2);

    assert_eq!(service.cleanup_import_logs(None).await?, 0);
    service.delete_import_log(log.id).await?;
    assert!(matches!(
        service.get_import_log(log.id).await,
        Err(ServiceError::NotFound(_))
    ));

    service.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_fetch_failing_on_every_attempt_ends_failed() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/feed")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let service = ImportService::start(db, &common::fast_config()).await?;
    let url = format!("{}/feed", server.url());
    let triggered = service
        .trigger_import(Some(vec![url]), Priority::Normal)
        .await?;

    wait_for(&service, |s| s.failed == 1).await?;
    mock.assert_async().await;

    let failed = service.list_failed_tasks(10).await?;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempts_made, 3);

    let log = service.get_import_log(triggered.import_log_ids[0]).await?;
    assert_eq!(log.status, ImportStatus::Failed);
    assert_eq!(log.error_details.len(), 1);
    assert!(log.error_details[0].message.contains("500"));
    assert_eq!(
        failed[0].failed_reason.as_deref(),
        Some(log.error_details[0].message.as_str())
    );

    service.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_trigger_skips_invalid_urls() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let service = ImportService::start(db, &common::fast_config()).await?;
    service.pause_queue()?;

    let triggered = service
        .trigger_import(
            Some(vec![
                "not a url".into(),
                "ftp://jobs.example.com/feed".into(),
                "https://jobicy.com/?feed=job_feed".into(),
            ]),
            Priority::High,
        )
        .await?;
    assert_eq!(triggered.urls, vec!["https://jobicy.com/?feed=job_feed"]);
    assert_eq!(triggered.task_ids.len(), 1);
    assert_eq!(service.queue_stats().await?.waiting, 1);

    let err = service
        .trigger_import(Some(vec!["nope".into()]), Priority::High)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    assert_eq!(service.clear_queue().await?, 1);
    service.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_run_import_task_outside_the_pool() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/feed")
        .with_status(200)
        .with_body(common::rss_feed(&[("301", "Support Engineer", "Initech")]))
        .create_async()
        .await;

    let service = ImportService::start(db, &common::fast_config()).await?;
    let url = format!("{}/feed", server.url());
    let log = service.create_import_log(&url).await?;
    assert_eq!(log.status, ImportStatus::InProgress);

    let task = QueuedTask::new(ImportTask::new(url.as_str(), log.id));
    let run = service.run_import_task(&task).await?;
    assert_eq!(run.import_log_id, log.id);
    assert_eq!(run.status, ImportStatus::Completed);
    assert_eq!(run.stats.new_jobs, 1);

    let stored = service.get_import_log(log.id).await?;
    assert_eq!(stored.status, ImportStatus::Completed);
    assert_eq!(stored.total_imported, 1);

    // Nothing went through the queue.
    assert_eq!(service.queue_stats().await?, QueueStats::default());

    service.shutdown().await?;
    Ok(())
}
