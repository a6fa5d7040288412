use crate::runtime::builder::RuntimeConfig;
use crate::runtime::space::ExecutionSpace;
use crate::utils::{Latch, ScopeGuard};
use anyhow::{Result, anyhow};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread;
use tracing::{debug, error};

type Job = dyn Fn(usize) + Sync;

/// A dispatched job. The pointers are only valid until the dispatching call
/// returns, which it does after every worker counted the latch down.
#[derive(Clone, Copy)]
struct Dispatch {
    job: *const Job,
    latch: *const Latch,
    panic: *const Mutex<Option<Box<dyn Any + Send>>>,
}

// Safety: see `ThreadPool::for_each_worker`.
unsafe impl Send for Dispatch {}

#[derive(Default)]
struct PoolState {
    /// Bumped for every dispatch. Each worker runs each epoch exactly once.
    epoch: u64,
    dispatch: Option<Dispatch>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<PoolState>,
    wake: Condvar,
}

/// Persistent pool of named worker threads.
///
/// Threads are started once and stay parked between calls to
/// `for_each_worker`, so repeated `execute` calls do not pay for thread
/// creation.
pub struct ThreadPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
    num_threads: usize,
    scratch_size: usize,

    /// Serializes dispatches from concurrent callers.
    dispatch: Mutex<()>,
}

impl ThreadPool {
    pub(crate) fn try_new(cfg: &RuntimeConfig) -> Result<ThreadPool> {
        let num_threads = cfg.worker_threads;
        let shared = Arc::new(Shared::default());

        // Spawning threads is async, wait for all threads to be started.
        let barrier = Arc::new(Barrier::new(num_threads + 1));

        let handles = (0..num_threads)
            .map(|index| spawn_worker_thread(cfg, index, shared.clone(), barrier.clone()))
            .collect::<Result<Vec<_>>>()?;

        barrier.wait();
        debug!(num_threads, "thread pool started");

        Ok(ThreadPool {
            shared,
            handles: Mutex::new(handles),
            num_threads,
            scratch_size: cfg.scratch_size,
            dispatch: Mutex::new(()),
        })
    }

    fn join_all(&self) -> Result<()> {
        let mut handles = self.handles.lock();

        let errors = handles.drain(..).filter_map(|handle| handle.join().err()).count();

        if errors == 0 {
            Ok(())
        } else {
            Err(anyhow!("{} thread(s) panicked", errors))
        }
    }
}

impl ExecutionSpace for ThreadPool {
    fn concurrency(&self) -> usize {
        self.num_threads
    }

    fn for_each_worker(&self, f: &(dyn Fn(usize) + Sync)) {
        let _dispatch = self.dispatch.lock();

        let latch = Latch::new(self.num_threads);
        let panic = Mutex::new(None);

        // Safety: the lifetime of `f` is erased to hand it to the workers. No
        // worker touches the dispatch after counting down the latch, and we do
        // not return before the latch reached zero.
        let job: &'static Job = unsafe { mem::transmute::<&(dyn Fn(usize) + Sync), &'static Job>(f) };

        {
            let mut state = self.shared.state.lock();
            state.epoch += 1;
            state.dispatch = Some(Dispatch {
                job,
                latch: &latch,
                panic: &panic,
            });
        }
        self.shared.wake.notify_all();

        latch.wait();
        self.shared.state.lock().dispatch = None;

        if let Some(payload) = panic.into_inner() {
            panic::resume_unwind(payload);
        }
    }

    fn scratch_size(&self) -> usize {
        self.scratch_size
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();

        match self.join_all() {
            Ok(()) => debug!(num_threads = self.num_threads, "thread pool stopped"),
            Err(e) => error!("error during thread pool shutdown: {:?}", e),
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads)
            .field("scratch_size", &self.scratch_size)
            .finish()
    }
}

fn spawn_worker_thread(
    cfg: &RuntimeConfig,
    index: usize,
    shared: Arc<Shared>,
    barrier: Arc<Barrier>,
) -> Result<thread::JoinHandle<()>> {
    let mut builder = thread::Builder::new().name((cfg.thread_name.0)());

    if let Some(stack_size) = cfg.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    let handle = builder.spawn(move || {
        barrier.wait();
        worker_main(index, &shared);
    })?;

    Ok(handle)
}

fn worker_main(index: usize, shared: &Shared) {
    let mut seen = 0;

    loop {
        let dispatch = {
            let mut state = shared.state.lock();
            while state.epoch == seen && !state.shutdown {
                shared.wake.wait(&mut state);
            }

            if state.shutdown {
                return;
            }

            seen = state.epoch;
            state.dispatch
        };

        // A new epoch always carries a dispatch, which is only cleared once
        // every worker ran it.
        let Some(dispatch) = dispatch else {
            continue;
        };

        // Safety: see `ThreadPool::for_each_worker`.
        let latch = unsafe { &*dispatch.latch };
        let _signal = ScopeGuard::new(|| latch.count_down());

        let res = panic::catch_unwind(AssertUnwindSafe(|| unsafe { (*dispatch.job)(index) }));

        if let Err(payload) = res {
            error!(worker = index, "worker routine panicked");
            unsafe { &*dispatch.panic }.lock().get_or_insert(payload);
        }
    }
}
