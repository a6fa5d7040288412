use crate::SchedulerError;
use crate::queue::TaskQueue;
use crate::runtime::space::ExecutionSpace;
use crate::runtime::stats::Stats;
use crate::runtime::{RuntimeConfig, TaskContext, local, stealing};
use crate::task::{Dependency, TaskFlags, TaskFuture, TaskSpec};
use crate::utils::ScopeGuard;
use std::fmt;
use std::sync::atomic::{self, AtomicBool, Ordering};
use tracing::debug;

/// Owns a task queue and the execution space whose workers drain it.
///
/// Tasks can be spawned from any thread at any time, but they only run during
/// [`execute`](Scheduler::execute).
///
/// ```ignore
/// let sched = Builder::new_threaded().worker_threads(4).try_build()?;
/// let a = sched.spawn(TaskSpec::single(), |_| 20)?;
/// let b = sched.spawn(TaskSpec::single().after(&a), |_| 22)?;
/// sched.execute()?;
/// assert_eq!(b.get(), Some(&22));
/// ```
pub struct Scheduler {
    cfg: RuntimeConfig,
    queue: TaskQueue,
    space: Box<dyn ExecutionSpace>,
    executing: AtomicBool,
}

impl Scheduler {
    pub(crate) fn from_parts(cfg: RuntimeConfig, space: Box<dyn ExecutionSpace>) -> Scheduler {
        debug!(
            kind = ?cfg.kind,
            concurrency = space.concurrency(),
            scratch_size = space.scratch_size(),
            "scheduler built"
        );

        Scheduler {
            cfg,
            queue: TaskQueue::new(),
            space,
            executing: AtomicBool::new(false),
        }
    }

    /// Builds a scheduler on a custom execution space, with default settings
    /// for everything else.
    pub fn with_space<S: ExecutionSpace + 'static>(space: S) -> Scheduler {
        let cfg = RuntimeConfig {
            worker_threads: space.concurrency(),
            scratch_size: space.scratch_size(),
            ..RuntimeConfig::default()
        };
        Scheduler::from_parts(cfg, Box::new(space))
    }

    pub fn concurrency(&self) -> usize {
        self.space.concurrency()
    }

    /// Declares a task. It becomes ready once every dependency of `spec`
    /// completed, and runs during the next `execute`.
    pub fn spawn<F, R>(&self, spec: TaskSpec, payload: F) -> Result<TaskFuture<R>, SchedulerError>
    where
        F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        self.queue.spawn(spec, TaskFlags::empty(), payload, None, None)
    }

    /// A task that completes once every task in `deps` completed.
    pub fn when_all<'d, D, I>(&self, deps: I) -> Result<TaskFuture<()>, SchedulerError>
    where
        D: Dependency + 'd,
        I: IntoIterator<Item = &'d D>,
    {
        self.queue.when_all(deps, None)
    }

    /// Runs tasks until none is left incomplete.
    ///
    /// With a concurrency of one the queue is drained on the calling thread.
    /// Otherwise one worker routine per worker of the execution space runs the
    /// work stealing loop, and this call blocks until all of them returned.
    ///
    /// A panicking task stops the run: `execute` returns
    /// [`SchedulerError::TaskPanicked`], and the scheduler is poisoned.
    pub fn execute(&self) -> Result<(), SchedulerError> {
        if self.executing.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyExecuting);
        }
        let _executing = ScopeGuard::new(|| self.executing.store(false, Ordering::Release));

        if self.queue.is_poisoned() {
            return Err(SchedulerError::Poisoned);
        }

        let concurrency = self.space.concurrency();
        debug!(concurrency, incomplete = self.queue.incomplete(), "execute");

        if concurrency == 1 {
            local::drain(&self.queue, self.space.scratch_size());
        } else {
            stealing::execute(&self.queue, self.space.as_ref(), self.cfg.max_steal_retries);
        }

        // Publish every side effect of the run to the caller.
        atomic::fence(Ordering::SeqCst);

        debug!(incomplete = self.queue.incomplete(), stats = ?self.stats(), "execute done");

        match self.queue.take_panic() {
            Some(report) => Err(SchedulerError::TaskPanicked {
                id: report.id,
                message: report.message,
            }),
            None => Ok(()),
        }
    }

    /// Tasks spawned but not yet complete.
    pub fn pending(&self) -> usize {
        self.queue.incomplete()
    }

    pub fn is_poisoned(&self) -> bool {
        self.queue.is_poisoned()
    }

    pub fn stats(&self) -> Stats {
        self.queue.counters().snapshot()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("concurrency", &self.concurrency())
            .field("pending", &self.pending())
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}
