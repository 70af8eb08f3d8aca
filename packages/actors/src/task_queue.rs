//! Handle to a running task queue.

use std::sync::Mutex;

use db::Database;
use db::repositories::TaskRepository;
use jobfeed_core::{
    ImportTask, QueueHealth, QueueSettings, QueueStats, QueuedTask, TaskId, TaskStatus,
};
use ractor::{Actor, ActorRef, RpcReplyPort};
use tokio::task::JoinHandle;

use crate::error::QueueError;
use crate::messages::QueueMessage;
use crate::queue_actor::{QueueActor, QueueArgs};

/// Durable priority queue of import tasks.
///
/// Owns the queue actor. Stored tasks are recovered on [`TaskQueue::start`].
pub struct TaskQueue {
    actor: ActorRef<QueueMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Spawn the queue actor over the given store.
    pub async fn start(db: Database, settings: QueueSettings) -> Result<Self, QueueError> {
        let args = QueueArgs {
            repo: TaskRepository::new(db),
            settings,
        };
        let (actor, handle) = Actor::spawn(None, QueueActor, args).await?;

        Ok(Self {
            actor,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn actor(&self) -> ActorRef<QueueMessage> {
        self.actor.clone()
    }

    async fn call<T>(
        &self,
        message: impl FnOnce(RpcReplyPort<T>) -> QueueMessage,
    ) -> Result<T, QueueError>
    where
        T: Send + 'static,
    {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(message(tx.into()))
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|_| QueueError::Unavailable("task queue dropped the request".into()))
    }

    fn cast(&self, message: QueueMessage) -> Result<(), QueueError> {
        self.actor
            .send_message(message)
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }

    /// Add an import task; it runs once a worker is free.
    pub async fn enqueue(&self, task: ImportTask) -> Result<QueuedTask, QueueError> {
        self.call(|reply| QueueMessage::Enqueue {
            task: Box::new(task),
            reply,
        })
        .await?
        .map_err(QueueError::Rejected)
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        self.call(|reply| QueueMessage::GetStats { reply }).await
    }

    pub async fn health(&self) -> Result<QueueHealth, QueueError> {
        self.call(|reply| QueueMessage::GetHealth { reply }).await
    }

    /// Stop dispatching. Tasks already running finish.
    pub fn pause(&self) -> Result<(), QueueError> {
        self.cast(QueueMessage::Pause)
    }

    pub fn resume(&self) -> Result<(), QueueError> {
        self.cast(QueueMessage::Resume)
    }

    /// Discard every task including retry history. Returns how many were dropped.
    pub async fn clear(&self) -> Result<u64, QueueError> {
        self.call(|reply| QueueMessage::Clear { reply })
            .await?
            .map_err(QueueError::Rejected)
    }

    /// Re-enqueue every failed task with a fresh attempt budget.
    pub async fn retry_failed(&self) -> Result<u64, QueueError> {
        self.call(|reply| QueueMessage::RetryFailed { reply })
            .await?
            .map_err(QueueError::Rejected)
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Option<QueuedTask>, QueueError> {
        self.call(|reply| QueueMessage::GetTask { task_id, reply })
            .await
    }

    /// Tasks with the given status, newest first.
    pub async fn list_tasks(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<QueuedTask>, QueueError> {
        self.call(|reply| QueueMessage::ListTasks {
            status,
            limit,
            reply,
        })
        .await
    }

    /// Refuse new tasks and stop dispatching, keeping completions flowing.
    pub fn drain(&self) -> Result<(), QueueError> {
        self.cast(QueueMessage::Drain)
    }

    /// Stop the queue actor and wait for it to exit.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.cast(QueueMessage::Shutdown)?;

        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        }

        Ok(())
    }
}
