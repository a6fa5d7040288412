use crate::queue::{Dequeue, LocalQueue, TaskQueue};
use crate::runtime::{EventLoop, TaskContext, run_task};
use tracing::{trace, warn};

pub(crate) struct Worker<'a> {
    queue: &'a TaskQueue,

    /// Tasks spawned or made ready while draining.
    local: LocalQueue,
}

impl<'a> Worker<'a> {
    pub(crate) fn new(queue: &'a TaskQueue) -> Self {
        Self {
            queue,
            local: LocalQueue::new(),
        }
    }
}

impl EventLoop for Worker<'_> {
    fn find_task(&self) -> Dequeue {
        self.queue.scan(&self.local)
    }

    fn event_loop(&self, scratch: &mut [u8]) {
        let mut cx = TaskContext::new(self.queue, &self.local, 0, 1, scratch);

        while let Dequeue::Task(task) = self.find_task() {
            match run_task(self.queue, task, &mut cx) {
                Some(task) => self.queue.complete(task, Some(&self.local)),
                None => break,
            }
        }

        // Tasks left here were spawned by another thread and are still waiting
        // on a dependency. A later `execute` picks them up.
        let incomplete = self.queue.incomplete();
        if !self.queue.is_done() {
            warn!(incomplete, "drain found no ready task while tasks remain incomplete");
        } else {
            trace!(incomplete, "drain done");
        }
    }
}
