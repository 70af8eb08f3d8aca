//! Message types for actor communication.

use jobfeed_core::{ImportTask, QueueHealth, QueueStats, QueuedTask, TaskId, TaskOutcome, TaskStatus};
use ractor::RpcReplyPort;

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Enqueue a new import task.
    Enqueue {
        task: Box<ImportTask>,
        reply: RpcReplyPort<Result<QueuedTask, String>>,
    },

    /// Request the next task for a worker.
    RequestTask {
        worker_id: String,
        reply: RpcReplyPort<Option<QueuedTask>>,
    },

    /// Report task completion.
    TaskCompleted {
        task_id: TaskId,
        worker_id: String,
        outcome: TaskOutcome,
    },

    /// Report a failed attempt.
    TaskFailed {
        task_id: TaskId,
        worker_id: String,
        error: String,
    },

    /// A worker died; its in-flight tasks count as failed attempts.
    WorkerLost { worker_id: String },

    /// Move a delayed task back to waiting once its backoff has elapsed.
    Promote { task_id: TaskId },

    /// Get a task by ID.
    GetTask {
        task_id: TaskId,
        reply: RpcReplyPort<Option<QueuedTask>>,
    },

    /// List tasks with a status, newest first.
    ListTasks {
        status: TaskStatus,
        limit: usize,
        reply: RpcReplyPort<Vec<QueuedTask>>,
    },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },

    /// Get queue health.
    GetHealth { reply: RpcReplyPort<QueueHealth> },

    /// Pause dispatch.
    Pause,

    /// Resume dispatch.
    Resume,

    /// Discard every task and its history. Replies with the number discarded.
    Clear {
        reply: RpcReplyPort<Result<u64, String>>,
    },

    /// Re-enqueue every failed task with its attempts reset.
    RetryFailed {
        reply: RpcReplyPort<Result<u64, String>>,
    },

    /// Stop dispatching and refuse new tasks; in-flight tasks still report back.
    Drain,

    /// Shutdown the queue.
    Shutdown,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Stop after the current task.
    Shutdown,

    /// Poll tick: ask the queue for work.
    Heartbeat,
}

/// Messages for the PoolSupervisor.
#[derive(Debug)]
pub enum PoolMessage {
    /// Number of live workers.
    GetWorkerCount { reply: RpcReplyPort<usize> },

    /// Stop every worker after its in-flight task and reply once all are gone.
    Shutdown { reply: RpcReplyPort<()> },
}
