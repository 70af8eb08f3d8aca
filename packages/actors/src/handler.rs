//! Task handler seam between the worker pool and the work it runs.

use jobfeed_core::{QueuedTask, TaskOutcome};
use std::future::Future;
use std::pin::Pin;

/// Result type for task handlers. The error string becomes the task's failure reason.
pub type HandlerResult = Result<TaskOutcome, String>;

/// Future type for async task handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for task handlers.
///
/// Implement this trait to define what a worker does with a dequeued task.
/// Returning `Err` hands the task back to the queue's retry policy.
pub trait TaskHandler: Send + Sync + 'static {
    /// Run one attempt of a task.
    fn handle(&self, task: &QueuedTask) -> HandlerFuture;
}

/// A simple function-based task handler.
pub struct FnHandler<F>
where
    F: Fn(&QueuedTask) -> HandlerFuture + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&QueuedTask) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(&QueuedTask) -> HandlerFuture + Send + Sync + 'static,
{
    fn handle(&self, task: &QueuedTask) -> HandlerFuture {
        (self.handler)(task)
    }
}

/// Helper macro for creating task handlers from async blocks.
#[macro_export]
macro_rules! task_handler {
    (|$task:ident| $body:expr) => {
        $crate::FnHandler::new(|$task: &$crate::QueuedTask| {
            let $task = $task.clone();
            Box::pin(async move { $body }) as $crate::HandlerFuture
        })
    };
}
