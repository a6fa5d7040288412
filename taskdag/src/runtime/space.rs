/// Supplies the workers that drive a [`Scheduler`](crate::Scheduler).
///
/// `execute` asks the space to run one worker routine per worker index and
/// returns once all of them did.
pub trait ExecutionSpace: Send + Sync {
    /// Number of workers `for_each_worker` runs.
    fn concurrency(&self) -> usize;

    /// Runs `f(index)` once for every `index` in `0..concurrency()`, and returns
    /// after every invocation returned.
    fn for_each_worker(&self, f: &(dyn Fn(usize) + Sync));

    /// Bytes of scratch memory each worker hands to the tasks it runs.
    fn scratch_size(&self) -> usize;
}

/// A single worker running on the calling thread.
#[derive(Debug, Clone)]
pub struct Serial {
    scratch_size: usize,
}

impl Serial {
    pub fn new(scratch_size: usize) -> Serial {
        Serial { scratch_size }
    }
}

impl Default for Serial {
    fn default() -> Self {
        Serial::new(512)
    }
}

impl ExecutionSpace for Serial {
    fn concurrency(&self) -> usize {
        1
    }

    fn for_each_worker(&self, f: &(dyn Fn(usize) + Sync)) {
        f(0)
    }

    fn scratch_size(&self) -> usize {
        self.scratch_size
    }
}
