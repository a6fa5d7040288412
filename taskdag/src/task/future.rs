use crate::task::state::ReadyState;
use crate::task::{Id, Priority, Task, TaskKind};
use std::fmt;
use std::marker::PhantomData;

/// Handle to the output of a spawned task.
///
/// A future keeps the task record alive, so its output can be read after the
/// scheduler ran it. It is also a [`Dependency`](crate::Dependency): pass it to
/// [`TaskSpec::after`](crate::TaskSpec::after) to order work behind it.
pub struct TaskFuture<R> {
    task: Task,
    _p: PhantomData<fn() -> R>,
}

impl<R> TaskFuture<R> {
    /// Safety: `R` must be the output type of the task's payload.
    pub(crate) unsafe fn new(task: Task) -> TaskFuture<R> {
        TaskFuture {
            task,
            _p: PhantomData,
        }
    }

    pub(crate) fn task(&self) -> &Task {
        &self.task
    }

    pub fn id(&self) -> Id {
        self.task.id()
    }

    pub fn priority(&self) -> Priority {
        self.task.priority()
    }

    pub fn kind(&self) -> TaskKind {
        self.task.kind()
    }

    pub fn state(&self) -> ReadyState {
        self.task.state().ready_state()
    }

    /// True once the task and all of its continuations completed.
    pub fn is_ready(&self) -> bool {
        self.task.state().is_complete()
    }

    /// The task's output, once it is [ready](Self::is_ready).
    pub fn get(&self) -> Option<&R> {
        if !self.is_ready() {
            return None;
        }

        // Safety: `R` was fixed at spawn, and `Complete` publishes the output.
        // `self.task` keeps the record alive for as long as `&self`.
        unsafe { self.task.as_raw().read_output::<R>() }
    }
}

impl<R> Clone for TaskFuture<R> {
    fn clone(&self) -> Self {
        TaskFuture {
            task: self.task.clone(),
            _p: PhantomData,
        }
    }
}

impl<R> fmt::Debug for TaskFuture<R> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("TaskFuture")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
