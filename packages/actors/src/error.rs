//! Errors surfaced by the queue and pool handles.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to start actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("actor unavailable: {0}")]
    Unavailable(String),

    /// The queue refused the request.
    #[error("{0}")]
    Rejected(String),
}
