use crate::task::raw::RawTask;
use crate::task::state::Snapshot;
use crate::task::{Header, Id, Priority, TaskContext, TaskFlags, TaskKind};
use std::fmt;

/// An owned handle to a task record, tracked by ref count.
///
/// Every reference a record has is one of these: queue membership, dependency
/// edges, futures, continuation parent links and the worker running the task.
#[repr(transparent)]
pub struct Task {
    raw: RawTask,
}

// Safety: the header is only mutated through atomics and locks, and the payload
// stage is only touched by the worker that owns the `Running` transition.
unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
    pub(super) fn new(raw: RawTask) -> Task {
        Task { raw }
    }

    /// Safety: the returned handle owns a reference. Callers that only borrow
    /// the record must not let it drop.
    pub(crate) unsafe fn from_raw(raw: RawTask) -> Task {
        Task { raw }
    }

    pub(crate) fn as_raw(&self) -> RawTask {
        self.raw
    }

    pub(crate) fn header(&self) -> &Header {
        self.raw.header()
    }

    pub(crate) fn id(&self) -> Id {
        self.header().id
    }

    pub(crate) fn priority(&self) -> Priority {
        self.header().priority
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.header().kind
    }

    pub(crate) fn state(&self) -> Snapshot {
        self.header().state.load()
    }
}

impl Clone for Task {
    fn clone(&self) -> Task {
        self.header().state.ref_inc();
        Task { raw: self.raw }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // Decrement the ref count
        if self.header().state.ref_dec() {
            // Deallocate if this is the final ref count
            unsafe { self.raw.dealloc() };
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "Task({}, {:?})", self.id(), self.state())
    }
}

/// A task linked into a ready queue bucket. Holds the queue's reference.
#[repr(transparent)]
pub(crate) struct Notified(Task);

impl Notified {
    /// Makes a task with no unresolved dependency runnable.
    #[track_caller]
    pub(crate) fn new(task: Task) -> Notified {
        task.header().state.transition_to_ready();
        Notified(task)
    }

    pub(crate) fn id(&self) -> Id {
        self.0.id()
    }

    pub(crate) fn priority(&self) -> Priority {
        self.0.priority()
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.0.kind()
    }

    /// Takes the task to `Running` without invoking its payload. Used for
    /// `when_all` aggregates, which have nothing to run.
    pub(crate) fn bypass(self) -> Task {
        let Notified(task) = self;

        if let Err(actual) = task.header().state.transition_to_running() {
            panic!("FATAL: task {} dequeued twice ({:?})", task.id(), actual);
        }
        task
    }

    pub(crate) fn is_aggregate(&self) -> bool {
        self.0.header().flags().contains(TaskFlags::AGGREGATE)
    }

    /// Runs the task's payload and hands the reference back to the worker,
    /// which completes it.
    pub(crate) fn run(self, cx: &mut TaskContext<'_>) -> Task {
        let Notified(task) = self;

        if let Err(actual) = task.header().state.transition_to_running() {
            panic!("FATAL: task {} dequeued twice ({:?})", task.id(), actual);
        }

        // A panicking payload leaves the context entered; the worker stops
        // using it once the queue is poisoned.
        cx.enter(task.as_raw());
        unsafe { task.as_raw().apply(cx) };
        cx.exit();

        task
    }
}

impl fmt::Debug for Notified {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "task::Notified({})", self.0.id())
    }
}
