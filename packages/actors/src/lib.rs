//! Actor system for the import task queue.
//!
//! This crate provides the Ractor-based task queue and the supervised
//! worker pool that drains it.
//!
//! # Architecture
//!
//! - `QueueActor` - Owns every task: priority dispatch, retries with backoff,
//!   retention and the durable copy in the store
//! - `WorkerActor` - Polls the queue and runs one task at a time through a
//!   [`TaskHandler`]
//! - `PoolSupervisor` - Keeps the configured number of workers alive and
//!   drains them on shutdown
//!
//! # Usage
//!
//! ```ignore
//! use actors::{PoolConfig, TaskQueue, WorkerPool};
//!
//! let queue = TaskQueue::start(db, QueueSettings::default()).await?;
//! let pool = WorkerPool::start(&queue, handler, PoolConfig::default()).await?;
//!
//! queue.enqueue(ImportTask::new(url, log_id)).await?;
//!
//! queue.drain()?;
//! pool.shutdown().await?;
//! queue.shutdown().await?;
//! ```

mod error;
mod handler;
mod messages;
mod queue_actor;
mod supervisor;
mod task_queue;
mod worker_actor;

pub use error::QueueError;
pub use handler::{FnHandler, HandlerFuture, HandlerResult, TaskHandler};
pub use messages::{PoolMessage, QueueMessage, WorkerMessage};
pub use queue_actor::{INTERRUPTED_FINAL_ATTEMPT, QueueActor, QueueArgs};
pub use supervisor::{PoolArgs, PoolConfig, PoolSupervisor, WorkerPool};
pub use task_queue::TaskQueue;
pub use worker_actor::{WorkerActor, WorkerArgs};

pub use jobfeed_core::QueuedTask;

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
