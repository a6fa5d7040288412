use crate::queue::grid::ReadyGrid;
use crate::task::{Notified, Priority, TaskKind};
use crossbeam_deque::{Stealer, Worker as CbWorker};

/// A worker's own grid of ready buckets. Only the owning worker pushes and
/// pops; peers steal through the matching [`Stealer`] grid.
pub(crate) struct LocalQueue {
    buckets: ReadyGrid<CbWorker<Notified>>,
}

impl LocalQueue {
    pub(crate) fn new() -> LocalQueue {
        LocalQueue {
            // FIFO so that tasks at the same level run in the order they
            // became ready.
            buckets: ReadyGrid::from_fn(|_, _| CbWorker::new_fifo()),
        }
    }

    pub(crate) fn stealers(&self) -> ReadyGrid<Stealer<Notified>> {
        self.buckets.map(CbWorker::stealer)
    }

    pub(crate) fn bucket(&self, priority: Priority, kind: TaskKind) -> &CbWorker<Notified> {
        self.buckets.get(priority, kind)
    }

    pub(crate) fn push(&self, task: Notified) {
        self.bucket(task.priority(), task.kind()).push(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.iter().map(CbWorker::len).sum()
    }
}
