//! Implementation of the work stealing worker loop, and of the thread pool
//! that runs it.

use crate::queue::{LocalQueue, TaskQueue};
use crate::runtime::{EventLoop, ExecutionSpace};
use crate::utils::ScopeGuard;
use parking_lot::Mutex;
use std::thread;

mod pool;
pub use pool::ThreadPool;

mod worker;
pub(crate) use worker::Worker;


/// Fans the worker loop out over every worker of `space`, and returns once all
/// of them exited.
pub(crate) fn execute(queue: &TaskQueue, space: &dyn ExecutionSpace, max_steal_retries: usize) {
    let concurrency = space.concurrency();
    let scratch_size = space.scratch_size();

    let locals: Vec<LocalQueue> = (0..concurrency).map(|_| LocalQueue::new()).collect();
    let stealers: Vec<_> = locals.iter().map(LocalQueue::stealers).collect();

    // A local queue is only ever used by one thread, each worker claims its own.
    let slots: Vec<Mutex<Option<LocalQueue>>> = locals.into_iter().map(|local| Mutex::new(Some(local))).collect();

    space.for_each_worker(&|index| {
        // A broken invariant unwinding out of one worker must not leave its
        // peers waiting for tasks that will never complete.
        let _abandon = ScopeGuard::new(|| {
            if thread::panicking() {
                queue.abandon();
            }
        });

        let Some(local) = slots.get(index).and_then(|slot| slot.lock().take()) else {
            panic!("worker index {} claimed twice or out of range", index);
        };

        let worker = Worker::new(index, concurrency, queue, local, &stealers, max_steal_retries);
        let mut scratch = vec![0u8; scratch_size];
        worker.event_loop(&mut scratch);
    });
}
