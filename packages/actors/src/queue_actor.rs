//! Queue actor owning the task queue and its durable copy.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use db::repositories::TaskRepository;
use jobfeed_core::{
    QueueHealth, QueueSettings, QueueState, QueueStats, QueuedTask, TaskId, TaskStatus,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::QueueMessage;

/// Failure reason for a task whose last attempt was cut off by a restart.
pub const INTERRUPTED_FINAL_ATTEMPT: &str = "Interrupted during final attempt";

/// Wrapper for priority queue ordering (higher priority first, older tasks first).
#[derive(Debug, Clone)]
struct PriorityTask {
    task: QueuedTask,
}

impl PartialEq for PriorityTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.id == other.task.id
    }
}

impl Eq for PriorityTask {}

impl PartialOrd for PriorityTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first
        match self.task.priority.cmp(&other.task.priority) {
            Ordering::Equal => {
                // Older tasks first (earlier created_at)
                other.task.created_at.cmp(&self.task.created_at)
            }
            other => other,
        }
    }
}

/// A dispatched task and the worker running it.
#[derive(Debug)]
struct ActiveTask {
    task: QueuedTask,
    worker_id: String,
}

/// Queue actor arguments.
pub struct QueueArgs {
    pub repo: TaskRepository,
    pub settings: QueueSettings,
}

/// State for the queue actor.
pub struct QueueActorState {
    settings: QueueSettings,
    state: QueueState,
    repo: TaskRepository,
    /// Tasks ready for dispatch.
    waiting: BinaryHeap<PriorityTask>,
    /// Tasks waiting out a retry backoff.
    delayed: HashMap<TaskId, QueuedTask>,
    active: HashMap<TaskId, ActiveTask>,
    /// Retained completed tasks, oldest first.
    completed: VecDeque<QueuedTask>,
    /// Retained failed tasks, oldest first.
    failed: VecDeque<QueuedTask>,
    last_activity: Option<DateTime<Utc>>,
}

impl QueueActorState {
    fn new(args: QueueArgs) -> Self {
        Self {
            settings: args.settings,
            state: QueueState::Running,
            repo: args.repo,
            waiting: BinaryHeap::new(),
            delayed: HashMap::new(),
            active: HashMap::new(),
            completed: VecDeque::new(),
            failed: VecDeque::new(),
            last_activity: None,
        }
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            waiting: self.waiting.len() as u64,
            active: self.active.len() as u64,
            delayed: self.delayed.len() as u64,
            completed: self.completed.len() as u64,
            failed: self.failed.len() as u64,
            paused: self.state == QueueState::Paused,
        }
    }

    fn total(&self) -> u64 {
        let stats = self.stats();
        stats.pending() + stats.processed()
    }

    fn find(&self, task_id: TaskId) -> Option<QueuedTask> {
        if let Some(active) = self.active.get(&task_id) {
            return Some(active.task.clone());
        }
        if let Some(task) = self.delayed.get(&task_id) {
            return Some(task.clone());
        }
        self.waiting
            .iter()
            .map(|p| &p.task)
            .chain(self.completed.iter())
            .chain(self.failed.iter())
            .find(|t| t.id == task_id)
            .cloned()
    }

    fn with_status(&self, status: TaskStatus) -> Vec<QueuedTask> {
        match status {
            TaskStatus::Waiting => self.waiting.iter().map(|p| p.task.clone()).collect(),
            TaskStatus::Active => self.active.values().map(|a| a.task.clone()).collect(),
            TaskStatus::Delayed => self.delayed.values().cloned().collect(),
            TaskStatus::Completed => self.completed.iter().cloned().collect(),
            TaskStatus::Failed => self.failed.iter().cloned().collect(),
        }
    }

    async fn persist(&self, task: &QueuedTask) {
        if let Err(e) = self.repo.save(task).await {
            tracing::warn!("Failed to persist task {}: {}", task.id, e);
        }
    }

    async fn forget(&self, task_id: TaskId) {
        if let Err(e) = self.repo.delete(task_id).await {
            tracing::warn!("Failed to delete task {}: {}", task_id, e);
        }
    }

    /// Evict the oldest terminal records beyond the retention caps.
    async fn retain(&mut self) {
        while self.completed.len() > self.settings.keep_completed {
            if let Some(old) = self.completed.pop_front() {
                self.forget(old.id).await;
            }
        }
        while self.failed.len() > self.settings.keep_failed {
            if let Some(old) = self.failed.pop_front() {
                self.forget(old.id).await;
            }
        }
    }

    /// Record a failed attempt: delay for a retry or fail terminally.
    async fn fail_attempt(
        &mut self,
        myself: &ActorRef<QueueMessage>,
        mut task: QueuedTask,
        error: String,
    ) {
        let now = Utc::now();
        self.last_activity = Some(now);

        if task.can_retry() {
            let delay = self.settings.backoff_for(task.attempts_made);
            tracing::warn!(
                task_id = %task.id,
                attempt = task.attempts_made,
                max_attempts = task.max_attempts,
                "Task attempt failed, retrying in {:?}: {}",
                delay,
                error
            );
            task.status = TaskStatus::Delayed;
            task.failed_reason = Some(error);
            task.retry_at =
                Some(now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero()));
            self.persist(&task).await;
            schedule_promotion(myself, task.id, delay);
            self.delayed.insert(task.id, task);
        } else {
            tracing::error!(
                task_id = %task.id,
                source_url = %task.data.source_url,
                "Task failed after {} attempts: {}",
                task.attempts_made,
                error
            );
            task.status = TaskStatus::Failed;
            task.failed_reason = Some(error);
            task.retry_at = None;
            task.finished_on = Some(now);
            self.persist(&task).await;
            self.failed.push_back(task);
            self.retain().await;
        }
    }
}

/// Send a `Promote` for a delayed task once its backoff elapses.
fn schedule_promotion(queue: &ActorRef<QueueMessage>, task_id: TaskId, delay: Duration) {
    let queue = queue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = queue.send_message(QueueMessage::Promote { task_id });
    });
}

/// Queue actor that owns every task of the import queue.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting task queue");

        let mut state = QueueActorState::new(args);
        let stored = state
            .repo
            .list_all()
            .await
            .map_err(|e| ActorProcessingErr::from(format!("Failed to load tasks: {}", e)))?;

        let now = Utc::now();
        for mut task in stored {
            match task.status {
                TaskStatus::Waiting => state.waiting.push(PriorityTask { task }),
                TaskStatus::Active if task.can_retry() => {
                    // The process died mid-attempt; run it again.
                    tracing::warn!("Re-queueing interrupted task {}", task.id);
                    task.status = TaskStatus::Waiting;
                    state.persist(&task).await;
                    state.waiting.push(PriorityTask { task });
                }
                TaskStatus::Active => {
                    tracing::warn!("Task {} was interrupted on its final attempt", task.id);
                    task.status = TaskStatus::Failed;
                    task.failed_reason = Some(INTERRUPTED_FINAL_ATTEMPT.to_string());
                    task.finished_on = Some(now);
                    state.persist(&task).await;
                    state.failed.push_back(task);
                }
                TaskStatus::Delayed => {
                    let delay = task
                        .retry_at
                        .and_then(|at| (at - now).to_std().ok())
                        .unwrap_or_default();
                    schedule_promotion(&myself, task.id, delay);
                    state.delayed.insert(task.id, task);
                }
                TaskStatus::Completed => state.completed.push_back(task),
                TaskStatus::Failed => state.failed.push_back(task),
            }
        }
        state
            .completed
            .make_contiguous()
            .sort_by_key(|t| t.finished_on);
        state.failed.make_contiguous().sort_by_key(|t| t.finished_on);
        state.retain().await;

        let stats = state.stats();
        if stats.pending() + stats.processed() > 0 {
            tracing::info!(
                waiting = stats.waiting,
                delayed = stats.delayed,
                completed = stats.completed,
                failed = stats.failed,
                "Recovered stored tasks"
            );
        }

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue { task, reply } => {
                if state.state == QueueState::Draining {
                    let _ = reply.send(Err("Queue is shutting down".into()));
                    return Ok(());
                }

                let task = QueuedTask::new(*task).with_max_attempts(state.settings.max_attempts);
                if let Err(e) = state.repo.save(&task).await {
                    let _ = reply.send(Err(format!("Failed to persist task: {}", e)));
                    return Ok(());
                }

                tracing::info!(
                    task_id = %task.id,
                    source_url = %task.data.source_url,
                    priority = %task.priority,
                    "Task enqueued"
                );
                state.waiting.push(PriorityTask { task: task.clone() });

                let _ = reply.send(Ok(task));
            }

            QueueMessage::RequestTask { worker_id, reply } => {
                if state.state != QueueState::Running {
                    let _ = reply.send(None);
                    return Ok(());
                }

                let Some(PriorityTask { task: previous }) = state.waiting.pop() else {
                    let _ = reply.send(None);
                    return Ok(());
                };

                let now = Utc::now();
                let mut task = previous.clone();
                task.attempts_made = task.attempts_made.saturating_add(1);
                task.status = TaskStatus::Active;
                task.processed_on = Some(now);

                if let Err(e) = state.repo.save(&task).await {
                    tracing::warn!("Failed to mark task {} active: {}", task.id, e);
                    state.waiting.push(PriorityTask { task: previous });
                    let _ = reply.send(None);
                    return Ok(());
                }

                tracing::debug!(
                    task_id = %task.id,
                    worker_id = %worker_id,
                    attempt = task.attempts_made,
                    "Task dispatched"
                );
                state.last_activity = Some(now);
                state.active.insert(
                    task.id,
                    ActiveTask {
                        task: task.clone(),
                        worker_id,
                    },
                );

                let _ = reply.send(Some(task));
            }

            QueueMessage::TaskCompleted {
                task_id,
                worker_id,
                outcome,
            } => {
                let Some(ActiveTask { mut task, .. }) = state.active.remove(&task_id) else {
                    tracing::debug!(
                        "Ignoring completion of unknown task {} from {}",
                        task_id,
                        worker_id
                    );
                    return Ok(());
                };

                let now = Utc::now();
                tracing::info!(
                    task_id = %task.id,
                    attempts = task.attempts_made,
                    "Task completed: {}",
                    outcome.summary
                );
                task.status = TaskStatus::Completed;
                task.return_value = Some(outcome);
                task.finished_on = Some(now);
                state.last_activity = Some(now);

                state.persist(&task).await;
                state.completed.push_back(task);
                state.retain().await;
            }

            QueueMessage::TaskFailed {
                task_id,
                worker_id,
                error,
            } => {
                let Some(ActiveTask { task, .. }) = state.active.remove(&task_id) else {
                    tracing::debug!(
                        "Ignoring failure of unknown task {} from {}",
                        task_id,
                        worker_id
                    );
                    return Ok(());
                };

                state.fail_attempt(&myself, task, error).await;
            }

            QueueMessage::WorkerLost { worker_id } => {
                let orphaned: Vec<TaskId> = state
                    .active
                    .iter()
                    .filter(|(_, a)| a.worker_id == worker_id)
                    .map(|(id, _)| *id)
                    .collect();

                for task_id in orphaned {
                    if let Some(ActiveTask { task, .. }) = state.active.remove(&task_id) {
                        let error = format!("Worker {} stopped unexpectedly", worker_id);
                        state.fail_attempt(&myself, task, error).await;
                    }
                }
            }

            QueueMessage::Promote { task_id } => {
                // Unknown after a clear or a manual retry.
                if let Some(mut task) = state.delayed.remove(&task_id) {
                    task.status = TaskStatus::Waiting;
                    task.retry_at = None;
                    state.persist(&task).await;
                    state.waiting.push(PriorityTask { task });
                }
            }

            QueueMessage::GetTask { task_id, reply } => {
                let _ = reply.send(state.find(task_id));
            }

            QueueMessage::ListTasks {
                status,
                limit,
                reply,
            } => {
                let mut tasks = state.with_status(status);
                tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                tasks.truncate(limit);
                let _ = reply.send(tasks);
            }

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.stats());
            }

            QueueMessage::GetHealth { reply } => {
                let health = QueueHealth::evaluate(
                    state.state,
                    state.stats(),
                    &state.settings,
                    state.last_activity,
                );
                let _ = reply.send(health);
            }

            QueueMessage::Pause => {
                if state.state == QueueState::Running {
                    tracing::info!("Task queue paused");
                    state.state = QueueState::Paused;
                }
            }

            QueueMessage::Resume => {
                if state.state == QueueState::Paused {
                    tracing::info!("Task queue resumed");
                    state.state = QueueState::Running;
                }
            }

            QueueMessage::Clear { reply } => {
                if let Err(e) = state.repo.clear().await {
                    let _ = reply.send(Err(format!("Failed to clear tasks: {}", e)));
                    return Ok(());
                }

                let discarded = state.total();
                state.waiting.clear();
                state.delayed.clear();
                state.active.clear();
                state.completed.clear();
                state.failed.clear();
                tracing::warn!("Task queue cleared, {} tasks discarded", discarded);

                let _ = reply.send(Ok(discarded));
            }

            QueueMessage::RetryFailed { reply } => {
                let mut retried = 0u64;
                while let Some(mut task) = state.failed.pop_front() {
                    task.status = TaskStatus::Waiting;
                    task.attempts_made = 0;
                    task.failed_reason = None;
                    task.retry_at = None;
                    task.finished_on = None;
                    state.persist(&task).await;
                    state.waiting.push(PriorityTask { task });
                    retried += 1;
                }
                if retried > 0 {
                    tracing::info!("Re-enqueued {} failed tasks", retried);
                }

                let _ = reply.send(Ok(retried));
            }

            QueueMessage::Drain => {
                tracing::info!("Task queue draining");
                state.state = QueueState::Draining;
            }

            QueueMessage::Shutdown => {
                tracing::info!("Shutting down task queue");
                state.state = QueueState::Draining;
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}
