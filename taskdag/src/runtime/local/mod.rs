//! Drains the queue on the calling thread. Used whenever the execution space
//! has a concurrency of one: no stealing, no backoff, no fan-out.

use crate::queue::TaskQueue;
use crate::runtime::EventLoop;

mod worker;
pub(crate) use worker::Worker;

#[cfg(test)]
mod tests;

pub(crate) fn drain(queue: &TaskQueue, scratch_size: usize) {
    let mut scratch = vec![0u8; scratch_size];
    Worker::new(queue).event_loop(&mut scratch);
}
