use crate::queue::{Dequeue, TaskQueue};
use crate::task::{Notified, Task};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use tracing::error;

// Public API
mod builder;
pub use builder::Builder;

mod context;
pub use context::TaskContext;

mod scheduler;
pub use scheduler::Scheduler;

mod space;
pub use space::{ExecutionSpace, Serial};

pub(crate) mod stats;
pub use stats::Stats;

// Flavors
pub(crate) mod local;

pub(crate) mod stealing;
pub use stealing::ThreadPool;

pub(crate) use builder::RuntimeConfig;

/// Abstraction of everything needed to build a worker loop.
pub(crate) trait EventLoop {
    /// One search for a runnable task.
    fn find_task(&self) -> Dequeue;

    /// Drives the queue until there is nothing left for this worker to do.
    /// `scratch` is handed to every task this worker applies.
    fn event_loop(&self, scratch: &mut [u8]);
}

/// Applies a dequeued task and hands it back for completion. Returns `None` if
/// the payload panicked, in which case the queue is poisoned.
pub(crate) fn run_task(queue: &TaskQueue, task: Notified, cx: &mut TaskContext<'_>) -> Option<Task> {
    let id = task.id();
    queue.counters().applied.fetch_add(1, Ordering::Relaxed);

    match panic::catch_unwind(AssertUnwindSafe(|| task.run(cx))) {
        Ok(task) => Some(task),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%id, %message, "task panicked, poisoning the scheduler");
            queue.poison(id, message);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
