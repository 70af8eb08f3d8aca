//! Supervisor actor for the worker pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use tokio::task::JoinHandle;

use crate::error::QueueError;
use crate::handler::TaskHandler;
use crate::messages::{PoolMessage, QueueMessage, WorkerMessage};
use crate::task_queue::TaskQueue;
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Worker pool sizing and polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Delay between an idle worker's polls of the queue.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Supervisor actor arguments.
pub struct PoolArgs {
    pub queue: ActorRef<QueueMessage>,
    pub handler: Arc<dyn TaskHandler>,
    pub config: PoolConfig,
}

struct WorkerEntry {
    worker_id: String,
    actor: ActorRef<WorkerMessage>,
}

/// State for the pool supervisor.
pub struct PoolState {
    queue: ActorRef<QueueMessage>,
    handler: Arc<dyn TaskHandler>,
    config: PoolConfig,
    /// Live workers by actor ID.
    workers: HashMap<ActorId, WorkerEntry>,
    /// Worker counter for unique IDs.
    worker_counter: u64,
    shutting_down: bool,
    shutdown_reply: Option<RpcReplyPort<()>>,
}

impl PoolState {
    fn new(args: PoolArgs) -> Self {
        Self {
            queue: args.queue,
            handler: args.handler,
            config: args.config,
            workers: HashMap::new(),
            worker_counter: 0,
            shutting_down: false,
            shutdown_reply: None,
        }
    }

    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("worker-{}", self.worker_counter)
    }

    fn finish_shutdown(&mut self, myself: &ActorRef<PoolMessage>) {
        if let Some(reply) = self.shutdown_reply.take() {
            let _ = reply.send(());
        }
        myself.stop(None);
    }
}

async fn spawn_worker(
    myself: &ActorRef<PoolMessage>,
    state: &mut PoolState,
) -> Result<(), ActorProcessingErr> {
    let worker_id = state.next_worker_id();
    let args = WorkerArgs {
        worker_id: worker_id.clone(),
        queue: state.queue.clone(),
        handler: state.handler.clone(),
        poll_interval: state.config.poll_interval,
    };

    let (actor, _handle) = Actor::spawn_linked(None, WorkerActor, args, myself.get_cell())
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;

    state
        .workers
        .insert(actor.get_id(), WorkerEntry { worker_id, actor });
    Ok(())
}

/// Supervisor that keeps the configured number of workers alive.
pub struct PoolSupervisor;

impl PoolSupervisor {
    async fn worker_exited(
        myself: ActorRef<PoolMessage>,
        state: &mut PoolState,
        actor_id: ActorId,
        reason: String,
    ) -> Result<(), ActorProcessingErr> {
        let Some(entry) = state.workers.remove(&actor_id) else {
            return Ok(());
        };

        if state.shutting_down {
            tracing::debug!("Worker {} stopped", entry.worker_id);
            if state.workers.is_empty() {
                state.finish_shutdown(&myself);
            }
            return Ok(());
        }

        tracing::warn!("Worker {} terminated: {}; restarting", entry.worker_id, reason);
        if let Err(e) = state.queue.send_message(QueueMessage::WorkerLost {
            worker_id: entry.worker_id,
        }) {
            tracing::warn!("Queue unreachable while reporting lost worker: {}", e);
        }
        spawn_worker(&myself, state).await
    }
}

impl Actor for PoolSupervisor {
    type Msg = PoolMessage;
    type State = PoolState;
    type Arguments = PoolArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker pool with {} workers", args.config.concurrency);

        let mut state = PoolState::new(args);
        for _ in 0..state.config.concurrency {
            spawn_worker(&myself, &mut state).await?;
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
            PoolMessage::GetWorkerCount { reply } => {
                let _ = reply.send(state.workers.len());
            }

            PoolMessage::Shutdown { reply } => {
                tracing::info!("Shutting down worker pool");
                state.shutting_down = true;
                state.shutdown_reply = Some(reply);

                if state.workers.is_empty() {
                    state.finish_shutdown(&myself);
                    return Ok(());
                }
                for entry in state.workers.values() {
                    // Each worker stops once its in-flight task is reported.
                    let _ = entry.actor.send_message(WorkerMessage::Shutdown);
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                let reason = reason.unwrap_or_else(|| "stopped".into());
                Self::worker_exited(myself, state, cell.get_id(), reason).await?;
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                Self::worker_exited(myself, state, cell.get_id(), error.to_string()).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Handle to a running worker pool.
pub struct WorkerPool {
    actor: ActorRef<PoolMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `config.concurrency` workers pulling from `queue` and running `handler`.
    pub async fn start(
        queue: &TaskQueue,
        handler: Arc<dyn TaskHandler>,
        config: PoolConfig,
    ) -> Result<Self, QueueError> {
        let args = PoolArgs {
            queue: queue.actor(),
            handler,
            config,
        };
        let (actor, handle) = Actor::spawn(None, PoolSupervisor, args).await?;

        Ok(Self {
            actor,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Number of live workers.
    pub async fn worker_count(&self) -> Result<usize, QueueError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(PoolMessage::GetWorkerCount { reply: tx.into() })
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|_| QueueError::Unavailable("worker pool dropped the request".into()))
    }

    /// Let every worker finish its in-flight task, then stop the pool.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(PoolMessage::Shutdown { reply: tx.into() })
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|_| QueueError::Unavailable("worker pool stopped early".into()))?;

        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        }

        Ok(())
    }
}
