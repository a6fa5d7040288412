// Exports
mod dag;
pub(crate) use dag::RandomDag;

mod recorder;
pub(crate) use recorder::{DropProbe, Recorder};

use crate::{Builder, Scheduler};
use anyhow::Result;

/// Scheduler with `workers` threads, or the serial flavor for one worker.
pub(crate) fn scheduler(workers: usize) -> Result<Scheduler> {
    match workers {
        1 => Builder::new_serial().try_build(),
        n => Builder::new_threaded().worker_threads(n).thread_name("taskdag-test").try_build(),
    }
}
