//! Worker actor for executing tasks.

use std::sync::Arc;
use std::time::Duration;

use jobfeed_core::QueuedTask;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::handler::TaskHandler;
use crate::messages::{QueueMessage, WorkerMessage};

/// How long a worker waits for the queue to answer a task request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// State for the worker actor.
///
/// A claimed task runs inside the `Heartbeat` handler, so the mailbox holds
/// further ticks and `Shutdown` until the task is reported.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Queue actor reference.
    pub queue: ActorRef<QueueMessage>,
    pub handler: Arc<dyn TaskHandler>,
    /// Whether the worker should continue running.
    pub running: bool,
}

impl WorkerActorState {
    /// Create a new worker actor state.
    pub fn new(
        worker_id: impl Into<String>,
        queue: ActorRef<QueueMessage>,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            handler,
            running: true,
        }
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub handler: Arc<dyn TaskHandler>,
    /// Delay between polls of the queue while idle.
    pub poll_interval: Duration,
}

/// Run one attempt of a task and report the result to the queue.
async fn run_task(state: &WorkerActorState, task: QueuedTask) -> Result<(), ActorProcessingErr> {
    let task_id = task.id;
    let result = state.handler.handle(&task).await;

    match result {
        Ok(outcome) => {
            state.queue.send_message(QueueMessage::TaskCompleted {
                task_id,
                worker_id: state.worker_id.clone(),
                outcome,
            })?;
        }
        Err(error) => {
            state.queue.send_message(QueueMessage::TaskFailed {
                task_id,
                worker_id: state.worker_id.clone(),
                error,
            })?;
        }
    }

    Ok(())
}

/// Worker actor that executes tasks one at a time.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("Starting worker: {}", args.worker_id);

        // Start the work loop
        let myself_clone = myself.clone();
        let poll_interval = args.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                if myself_clone.send_message(WorkerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });

        Ok(WorkerActorState::new(args.worker_id, args.queue, args.handler))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Shutdown => {
                tracing::debug!("Shutting down worker: {}", state.worker_id);
                state.running = false;
                myself.stop(None);
                return Ok(());
            }

            WorkerMessage::Heartbeat => {
                if !state.running {
                    myself.stop(None);
                    return Ok(());
                }

                let result = ractor::rpc::call(
                    &state.queue,
                    |reply| QueueMessage::RequestTask {
                        worker_id: state.worker_id.clone(),
                        reply,
                    },
                    Some(REQUEST_TIMEOUT),
                )
                .await;
                if let Ok(ractor::rpc::CallResult::Success(Some(task))) = result {
                    run_task(state, task).await?;
                }
            }
        }

        Ok(())
    }
}
