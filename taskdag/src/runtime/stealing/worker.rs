use crate::queue::{Dequeue, LocalQueue, ReadyGrid, TaskQueue};
use crate::runtime::{EventLoop, TaskContext, run_task};
use crate::task::{Notified, Task};
use crossbeam_deque::Stealer;
use crossbeam_utils::Backoff;
use tracing::trace;

pub(crate) struct Worker<'a> {
    index: usize,

    /// Number of workers in this `execute`.
    concurrency: usize,

    queue: &'a TaskQueue,

    /// Our own ready buckets. Tasks we spawn or make ready land here.
    local: LocalQueue,

    /// Handle to the other workers' ready buckets. If there are N workers we
    /// have N-1 grids to steal from.
    stealers: Vec<&'a ReadyGrid<Stealer<Notified>>>,

    /// How many times a contended cell is retried before moving on.
    max_steal_retries: usize,
}

impl<'a> Worker<'a> {
    pub(crate) fn new(
        index: usize,
        concurrency: usize,
        queue: &'a TaskQueue,
        local: LocalQueue,
        all_stealers: &'a [ReadyGrid<Stealer<Notified>>],
        max_steal_retries: usize,
    ) -> Self {
        let mut stealers: Vec<_> = all_stealers
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .map(|(_, s)| s)
            .collect();

        // Shuffle the stealers so that each worker's search order when trying to
        // steal work is different, which spreads contention. Seeded with the
        // worker index to keep runs reproducible.
        fastrand::Rng::with_seed(index as u64).shuffle(&mut stealers);

        Self {
            index,
            concurrency,
            queue,
            local,
            stealers,
            max_steal_retries,
        }
    }
}

impl EventLoop for Worker<'_> {
    fn find_task(&self) -> Dequeue {
        // The ready count is only a hint: a scan that comes up empty falls
        // through to stealing.
        if self.queue.ready_count() > 0 {
            match self.queue.scan(&self.local) {
                Dequeue::End => {}
                found => return found,
            }
        }

        self.queue.attempt_to_steal(&self.local, &self.stealers, self.max_steal_retries)
    }

    fn event_loop(&self, scratch: &mut [u8]) {
        let mut cx = TaskContext::new(self.queue, &self.local, self.index, self.concurrency, scratch);
        let backoff = Backoff::new();

        let mut previous: Option<Task> = None;
        let mut applied = 0usize;

        loop {
            // Completing may make dependents ready on our own queue, so it
            // happens before looking for the next task.
            if let Some(task) = previous.take() {
                self.queue.complete(task, Some(&self.local));
            }

            match self.find_task() {
                Dequeue::Task(task) => {
                    backoff.reset();
                    applied += 1;

                    match run_task(self.queue, task, &mut cx) {
                        Some(task) => previous = Some(task),
                        None => break,
                    }
                }
                Dequeue::End => backoff.snooze(),
                Dequeue::Shutdown => break,
            }
        }

        trace!(worker = self.index, applied, left = self.local.len(), "worker exit");
    }
}
