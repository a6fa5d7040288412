use crate::runtime::stats::Counters;
use std::sync::Arc;

pub(crate) use crate::runtime::TaskContext;

mod future;
pub use self::future::TaskFuture;

mod header;
pub(crate) use self::header::{Header, TaskFlags};

mod id;
pub use self::id::Id;

mod layout;

mod raw;
pub(crate) use self::raw::RawTask;

mod spec;
pub(crate) use self::spec::NUM_TASK_KINDS;
pub use self::spec::{Dependency, NUM_PRIORITY_LEVELS, Priority, TaskKind, TaskSpec};

mod state;
pub use self::state::ReadyState;

#[allow(clippy::module_inception)]
mod task;
pub(crate) use self::task::{Notified, Task};

mod vtable;

/// Allocates a task record. Two references are created: the returned `Task`
/// is the spawner's and is either handed to the ready queue or dropped once
/// the dependency edges are registered; the `TaskFuture` goes to the caller.
pub(crate) fn new_task<F, R>(
    payload: F,
    priority: Priority,
    kind: TaskKind,
    flags: TaskFlags,
    parent: Option<Task>,
    counters: Arc<Counters>,
) -> (Task, TaskFuture<R>)
where
    F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    let raw = RawTask::new::<F, R>(payload, priority, kind, flags, parent, counters);
    let task = Task::new(raw);

    // Safety: `R` is the payload's output type.
    let future = unsafe { TaskFuture::new(task.clone()) };

    (task, future)
}
