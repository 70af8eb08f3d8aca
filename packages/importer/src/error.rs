//! Error types for import runs and the service facade.

use actors::QueueError;
use db::DbError;
use feed::FetchError;
use thiserror::Error;

/// A stage-level failure of one import attempt.
///
/// These finalize the run's import log as failed and hand the task back to
/// the queue's retry policy.
#[derive(Debug, Error)]
pub enum TaskExecutionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to record import result: {0}")]
    Store(#[from] DbError),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Db(DbError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("fetcher setup failed: {0}")]
    Fetcher(#[from] FetchError),
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Db(other),
        }
    }
}
