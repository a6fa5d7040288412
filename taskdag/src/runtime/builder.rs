use crate::runtime::space::{ExecutionSpace, Serial};
use crate::runtime::stealing::ThreadPool;
use crate::runtime::Scheduler;
use anyhow::{Result, anyhow};
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Per-worker scratch memory handed to tasks through their context.
const SCRATCH_SIZE: usize = 512;

const MAX_SCRATCH_SIZE: usize = 1 << 20;

/// Maximum number of stealing attempts per ready queue cell.
const MAX_STEAL_RETRIES: usize = 3;

const MAX_WORKER_THREADS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Serial,
    Threaded,
}

#[derive(Clone)]
pub(crate) struct ThreadNameFn(pub(crate) Arc<dyn Fn() -> String + Send + Sync + 'static>);

fn default_thread_name_fn() -> ThreadNameFn {
    let worker_count = Arc::new(AtomicUsize::new(0));

    ThreadNameFn(Arc::new(move || {
        let id = worker_count.fetch_add(1, Ordering::Relaxed);
        format!("taskdag-{}", id)
    }))
}

impl fmt::Debug for ThreadNameFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadNameFn").field(&"<function>").finish()
    }
}

#[derive(Debug)]
pub struct Builder {
    /// Execution space flavor
    kind: Kind,

    /// Number of worker threads of the threaded flavor. Defaults to one per
    /// core.
    worker_threads: Option<usize>,

    /// Name fn used for threads spawned by the pool.
    thread_name: ThreadNameFn,

    /// Stack size used for threads spawned by the pool.
    thread_stack_size: Option<usize>,

    /// Bytes of scratch memory each worker hands to the tasks it runs.
    scratch_size: usize,

    /// How many times an idle worker retries a contended ready queue cell of
    /// its peers before moving on.
    max_steal_retries: usize,
}

impl Builder {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            worker_threads: None,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
            scratch_size: SCRATCH_SIZE,
            max_steal_retries: MAX_STEAL_RETRIES,
        }
    }

    /// Returns a new builder for a scheduler that runs every task on the thread
    /// calling `execute`.
    pub fn new_serial() -> Builder {
        Builder::new(Kind::Serial)
    }

    /// Returns a new builder for a scheduler backed by a pool of worker
    /// threads. Configuration methods can be chained on the return value.
    pub fn new_threaded() -> Builder {
        Builder::new(Kind::Threaded)
    }

    /// Defaults to 1 worker per CPU core. A pool of one worker runs tasks on
    /// the calling thread, like the serial flavor.
    #[track_caller]
    pub fn worker_threads(mut self, val: usize) -> Self {
        assert!(val > 0, "worker_threads must be greater than 0");
        self.worker_threads = Some(val);
        self
    }

    /// Sets name of threads spawned by the pool.
    ///
    /// The default name is "taskdag-{id}", where id is monotonically
    /// increasing.
    pub fn thread_name(mut self, val: impl Into<String>) -> Self {
        let val = val.into();
        self.thread_name = ThreadNameFn(Arc::new(move || val.clone()));
        self
    }

    /// Sets a function used to generate the name of threads spawned by the
    /// pool.
    pub fn thread_name_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.thread_name = ThreadNameFn(Arc::new(f));
        self
    }

    /// Sets the stack size (in bytes) for worker threads.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// specifies minimal stack size.
    #[track_caller]
    pub fn thread_stack_size(mut self, val: usize) -> Self {
        assert!(val.is_power_of_two(), "thread_stack_size must be a power of two");
        self.thread_stack_size = Some(val);
        self
    }

    /// Bytes of scratch memory per worker, 512 by default. Zero disables
    /// scratch memory.
    pub fn scratch_size(mut self, val: usize) -> Self {
        self.scratch_size = val;
        self
    }

    #[track_caller]
    pub fn max_steal_retries(mut self, val: usize) -> Self {
        assert!(val > 0, "max_steal_retries must be greater than 0");
        self.max_steal_retries = val;
        self
    }

    /// Creates the configured `Scheduler`. The threaded flavor starts its
    /// workers here; they stay parked until `execute` is called.
    pub fn try_build(self) -> Result<Scheduler> {
        let cfg = RuntimeConfig::try_from(self)?;

        let space: Box<dyn ExecutionSpace> = match cfg.kind {
            Kind::Serial => Box::new(Serial::new(cfg.scratch_size)),
            Kind::Threaded => Box::new(ThreadPool::try_new(&cfg)?),
        };

        Ok(Scheduler::from_parts(cfg, space))
    }
}

// Export builder as a RuntimeConfig object to be consumed by the scheduler
// and the execution spaces.
#[derive(Debug, Clone)]
pub(crate) struct RuntimeConfig {
    pub(crate) kind: Kind,
    pub(crate) worker_threads: usize,
    pub(crate) thread_name: ThreadNameFn,
    pub(crate) thread_stack_size: Option<usize>,
    pub(crate) scratch_size: usize,
    pub(crate) max_steal_retries: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            kind: Kind::Serial,
            worker_threads: 1,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
            scratch_size: SCRATCH_SIZE,
            max_steal_retries: MAX_STEAL_RETRIES,
        }
    }
}

impl RuntimeConfig {
    fn validate(&self) -> Result<()> {
        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(anyhow!(
                "worker_threads ({}) exceeds the maximum of {}",
                self.worker_threads,
                MAX_WORKER_THREADS
            ));
        }

        if self.scratch_size > MAX_SCRATCH_SIZE {
            return Err(anyhow!(
                "scratch_size ({} bytes) exceeds the maximum of {} bytes",
                self.scratch_size,
                MAX_SCRATCH_SIZE
            ));
        }

        Ok(())
    }
}

impl TryFrom<Builder> for RuntimeConfig {
    type Error = anyhow::Error;

    fn try_from(builder: Builder) -> Result<Self, Self::Error> {
        let worker_threads = match builder.kind {
            Kind::Serial => 1,
            Kind::Threaded => match builder.worker_threads {
                Some(n) => n,
                None => thread::available_parallelism()?.get(),
            },
        };

        let cfg = RuntimeConfig {
            kind: builder.kind,
            worker_threads,
            thread_name: builder.thread_name,
            thread_stack_size: builder.thread_stack_size,
            scratch_size: builder.scratch_size,
            max_steal_retries: builder.max_steal_retries,
        };

        cfg.validate()?;

        Ok(cfg)
    }
}
