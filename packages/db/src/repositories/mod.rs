//! Repository implementations for database operations.

mod import_log_repo;
mod job_repo;
mod task_repo;

pub use import_log_repo::ImportLogRepository;
pub use job_repo::{JobRepository, UpsertOutcome};
pub use task_repo::TaskRepository;
