//! Upserts normalized candidates into the job store and tracks run statistics.

use db::Database;
use db::repositories::{ImportLogRepository, JobRepository, UpsertOutcome};
use jobfeed_core::{ErrorDetail, ImportLogId, JobCandidate, RunStats};

/// Processed candidates between import log checkpoints.
pub const CHECKPOINT_EVERY: usize = 5;

/// Reconciles a batch of candidates against persisted jobs by identity.
#[derive(Debug, Clone)]
pub struct Reconciler {
    jobs: JobRepository,
    logs: ImportLogRepository,
}

impl Reconciler {
    pub fn new(db: Database) -> Self {
        Self {
            jobs: JobRepository::new(db.clone()),
            logs: ImportLogRepository::new(db),
        }
    }

    /// Reconcile `candidates` in order, counting every candidate as fetched.
    pub async fn reconcile(
        &self,
        candidates: &[JobCandidate],
        source_url: &str,
        import_log_id: ImportLogId,
    ) -> RunStats {
        let stats = RunStats::new(candidates.len() as u64);
        self.reconcile_with(stats, candidates, source_url, import_log_id)
            .await
    }

    /// Reconcile `candidates` in order on top of counters the caller already holds.
    ///
    /// Persistence failures are counted per candidate and never abort the batch.
    /// The import log is checkpointed every [`CHECKPOINT_EVERY`] candidates and
    /// once at the end.
    pub async fn reconcile_with(
        &self,
        mut stats: RunStats,
        candidates: &[JobCandidate],
        source_url: &str,
        import_log_id: ImportLogId,
    ) -> RunStats {
        let total = candidates.len();
        tracing::info!("Starting import of {} jobs from {}", total, source_url);

        for (index, candidate) in candidates.iter().enumerate() {
            tracing::debug!(
                "Processing job {}/{}: \"{}\" by \"{}\"",
                index + 1,
                total,
                candidate.title,
                candidate.company
            );

            match self.jobs.upsert(candidate).await {
                Ok(UpsertOutcome::Created(job)) => {
                    tracing::debug!("Created new job: \"{}\" ({})", job.title, job.id);
                    stats.record_created();
                }
                Ok(UpsertOutcome::Updated(job)) => {
                    tracing::debug!("Updated existing job: \"{}\" ({})", job.title, job.id);
                    stats.record_updated();
                }
                Err(e) => {
                    tracing::warn!(
                        index = index + 1,
                        external_id = %candidate.external_id,
                        "Failed to import job \"{}\": {}",
                        candidate.title,
                        e
                    );
                    stats.record_failure(ErrorDetail::for_candidate(
                        e.to_string(),
                        candidate,
                        index,
                    ));
                }
            }

            if (index + 1) % CHECKPOINT_EVERY == 0 {
                self.checkpoint(import_log_id, &stats).await;
                tracing::debug!("Progress update: {}/{} processed", index + 1, total);
            }
        }

        if total % CHECKPOINT_EVERY != 0 || total == 0 {
            self.checkpoint(import_log_id, &stats).await;
        }

        tracing::info!(
            total_fetched = stats.total_fetched,
            new_jobs = stats.new_jobs,
            updated_jobs = stats.updated_jobs,
            failed_jobs = stats.failed_jobs,
            skipped_jobs = stats.skipped_jobs,
            "Import completed for {}: {:.1}% success",
            source_url,
            stats.success_rate().unwrap_or(0.0)
        );

        stats
    }

    async fn checkpoint(&self, import_log_id: ImportLogId, stats: &RunStats) {
        if let Err(e) = self.logs.checkpoint(import_log_id, stats).await {
            tracing::warn!("Failed to checkpoint import log {}: {}", import_log_id, e);
        }
    }
}
