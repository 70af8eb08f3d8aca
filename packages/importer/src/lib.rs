//! Job feed importer: reconciliation, the import pipeline and the service facade.
//!
//! [`ImportService`] wires the pieces together:
//!
//! - a trigger creates an [`jobfeed_core::ImportLog`] per source and enqueues an import task
//! - a worker runs the [`ImportPipeline`]: fetch, parse, normalize, [`Reconciler`]
//! - the pipeline finalizes the log as completed, or as failed when the fetch
//!   stage fails, in which case the queue retries with backoff

mod config;
mod error;
mod pipeline;
mod reconciler;
mod service;

pub use config::{AppConfig, ConfigError, DEFAULT_SOURCES};
pub use error::{ServiceError, TaskExecutionError};
pub use pipeline::{ImportPipeline, ImportRun};
pub use reconciler::{CHECKPOINT_EVERY, Reconciler};
pub use service::{DEFAULT_LOG_RETENTION_DAYS, ImportService, TriggeredImport};
