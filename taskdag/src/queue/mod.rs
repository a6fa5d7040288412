//! The ready queue and the completion protocol.
//!
//! Ready tasks live in `[priority][kind]` buckets. Threads that are not
//! workers push into a shared grid of injectors; workers push into their own
//! [`LocalQueue`], which peers steal from when they run dry. Termination is
//! detected with an authoritative count of incomplete records, so no task
//! count has to be known up front.

use crate::SchedulerError;
use crate::runtime::stats::Counters;
use crate::task::{self, Id, Notified, Priority, Task, TaskContext, TaskFlags, TaskFuture, TaskSpec};
use crate::task::{Dependency, TaskKind};
use crossbeam_deque::{Injector, Steal, Stealer};
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use smallvec::{SmallVec, smallvec};
use std::iter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use tracing::trace;

mod grid;
pub(crate) use self::grid::{ReadyGrid, scan_order};

mod local;
pub(crate) use self::local::LocalQueue;

/// Result of one pass over the ready queue.
#[derive(Debug)]
pub(crate) enum Dequeue {
    Task(Notified),

    /// No runnable task was found this pass. Work may still show up.
    End,

    /// The queue is done: nothing is incomplete, or a task panicked.
    Shutdown,
}

/// A panic captured while applying a task.
#[derive(Debug, Clone)]
pub(crate) struct PanicReport {
    pub(crate) id: Id,
    pub(crate) message: String,
}

pub(crate) struct TaskQueue {
    /// Ready tasks pushed from outside the worker loops.
    injector: ReadyGrid<Injector<Notified>>,

    /// Approximate number of ready tasks across every grid. Only a hint to
    /// skip the local scan, it may briefly go negative.
    ready_count: CachePadded<AtomicIsize>,

    /// Spawned records that have not reached `Complete`.
    incomplete: CachePadded<AtomicUsize>,

    poisoned: AtomicBool,

    /// First panic observed, until `execute` reports it.
    panic: Mutex<Option<PanicReport>>,

    counters: Arc<Counters>,
}

impl TaskQueue {
    pub(crate) fn new() -> TaskQueue {
        TaskQueue {
            injector: ReadyGrid::from_fn(|_, _| Injector::new()),
            ready_count: CachePadded::new(AtomicIsize::new(0)),
            incomplete: CachePadded::new(AtomicUsize::new(0)),
            poisoned: AtomicBool::new(false),
            panic: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    pub(crate) fn ready_count(&self) -> isize {
        self.ready_count.load(Ordering::Relaxed)
    }

    pub(crate) fn incomplete(&self) -> usize {
        self.incomplete.load(Ordering::Acquire)
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// True once no incomplete task remains, or a task panicked.
    pub(crate) fn is_done(&self) -> bool {
        self.is_poisoned() || self.incomplete() == 0
    }

    /// Allocates a record for `payload` and registers its dependency edges. The
    /// task is pushed right away if every dependency already completed.
    ///
    /// `parent` is set when spawning a continuation: the parent will not
    /// complete before it. `local` is the grid of the calling worker, if any.
    pub(crate) fn spawn<F, R>(
        &self,
        spec: TaskSpec,
        flags: TaskFlags,
        payload: F,
        parent: Option<&Task>,
        local: Option<&LocalQueue>,
    ) -> Result<TaskFuture<R>, SchedulerError>
    where
        F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        if self.is_poisoned() {
            return Err(SchedulerError::Poisoned);
        }

        // Completing a foreign dependency would push the dependent onto the
        // other scheduler's queue.
        if let Some(dep) = spec.dependencies().iter().find(|dep| !dep.header().belongs_to(&self.counters)) {
            return Err(SchedulerError::ForeignDependency(dep.id()));
        }

        let mut flags = flags;
        if let Some(parent) = parent {
            // The parent cannot complete before the continuation does, so the
            // continuation waiting on the parent would never become ready.
            if spec.dependencies().iter().any(|dep| parent.header().is_self_or_ancestor(dep.header())) {
                return Err(SchedulerError::SelfDependency);
            }
            flags |= TaskFlags::CONTINUATION;
        }

        let TaskSpec { priority, kind, deps } = spec;
        let (task, future) = task::new_task(payload, priority, kind, flags, parent.cloned(), self.counters.clone());

        if let Some(parent) = parent {
            parent.header().hold();
        }
        self.incomplete.fetch_add(1, Ordering::AcqRel);
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);

        let pending = deps.iter().filter(|dep| dep.header().register_dependent(&task)).count();
        trace!(id = %task.id(), %priority, ?kind, ?flags, deps = deps.len(), pending, "spawn");

        // Drop the spawn guard. Whoever takes the wait count to zero makes the
        // task ready, which is us only if no dependency is outstanding.
        if task.header().release_wait() {
            self.make_ready(task, local);
        }

        Ok(future)
    }

    /// Spawns a no-op task that completes once every task in `deps` did.
    pub(crate) fn when_all<'d, D, I>(&self, deps: I, local: Option<&LocalQueue>) -> Result<TaskFuture<()>, SchedulerError>
    where
        D: Dependency + 'd,
        I: IntoIterator<Item = &'d D>,
    {
        let spec = TaskSpec::single().priority(Priority::HIGH).after_all(deps);
        self.spawn(spec, TaskFlags::AGGREGATE, |_: &mut TaskContext<'_>| {}, None, local)
    }

    fn make_ready(&self, task: Task, local: Option<&LocalQueue>) {
        let task = Notified::new(task);

        // Aggregates have no payload, they complete as soon as they are ready.
        if task.is_aggregate() {
            self.complete(task.bypass(), local);
        } else {
            self.push(task, local);
        }
    }

    /// Links a ready task into the caller's local grid, or the injector grid
    /// when called from outside a worker.
    pub(crate) fn push(&self, task: Notified, local: Option<&LocalQueue>) {
        self.ready_count.fetch_add(1, Ordering::Relaxed);

        match local {
            Some(local) => local.push(task),
            None => self.injector.get(task.priority(), task.kind()).push(task),
        }
    }

    /// Pops from one cell: the worker's own bucket first, then the matching
    /// injector bucket.
    pub(crate) fn pop_ready(&self, priority: Priority, kind: TaskKind, local: &LocalQueue) -> Dequeue {
        let bucket = local.bucket(priority, kind);
        let injector = self.injector.get(priority, kind);

        let found = bucket.pop().or_else(|| {
            iter::repeat_with(|| injector.steal_batch_and_pop(bucket))
                .find(|s| !s.is_retry())
                .and_then(Steal::success)
        });

        match found {
            Some(task) => {
                self.ready_count.fetch_sub(1, Ordering::Relaxed);
                Dequeue::Task(task)
            }
            None => Dequeue::End,
        }
    }

    /// One pass over every cell in scan order. The first task found wins.
    pub(crate) fn scan(&self, local: &LocalQueue) -> Dequeue {
        if self.is_done() {
            return Dequeue::Shutdown;
        }

        scan_order()
            .find_map(|(priority, kind)| match self.pop_ready(priority, kind, local) {
                Dequeue::Task(task) => Some(task),
                _ => None,
            })
            .map_or(Dequeue::End, Dequeue::Task)
    }

    /// Probes the injector and every peer grid in scan order. A cell is retried
    /// up to `max_retries` times while a steal reports contention.
    pub(crate) fn attempt_to_steal(
        &self,
        local: &LocalQueue,
        peers: &[&ReadyGrid<Stealer<Notified>>],
        max_retries: usize,
    ) -> Dequeue {
        if self.is_done() {
            return Dequeue::Shutdown;
        }

        let stolen = scan_order().find_map(|(priority, kind)| {
            let bucket = local.bucket(priority, kind);
            let injector = self.injector.get(priority, kind);

            iter::repeat_with(|| {
                injector.steal_batch_and_pop(bucket).or_else(|| {
                    // `collect` returns the first success, it does not drain
                    // every peer.
                    let steal: Steal<Notified> = peers.iter().map(|peer| peer.get(priority, kind).steal()).collect();
                    if steal.is_success() {
                        self.counters.stolen.fetch_add(1, Ordering::Relaxed);
                    }
                    steal
                })
            })
            .take(max_retries)
            .find(|s| !s.is_retry())
            .and_then(Steal::success)
        });

        match stolen {
            Some(task) => {
                self.ready_count.fetch_sub(1, Ordering::Relaxed);
                Dequeue::Task(task)
            }
            None if self.is_done() => Dequeue::Shutdown,
            None => Dequeue::End,
        }
    }

    /// Releases the execution hold of a task whose payload returned.
    ///
    /// Once no respawned continuation is outstanding the task is finalized:
    /// it becomes `Complete`, dependents whose last dependency this was become
    /// ready, and a finalized continuation releases its parent, which may be
    /// finalized in turn.
    pub(crate) fn complete(&self, task: Task, local: Option<&LocalQueue>) {
        let mut pending: SmallVec<[Task; 4]> = smallvec![task];

        while let Some(task) = pending.pop() {
            if !task.header().release_hold() {
                trace!(id = %task.id(), "waiting on continuations");
                continue;
            }

            let dependents = task.header().mark_complete();
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
            trace!(id = %task.id(), dependents = dependents.len(), "complete");

            for dependent in dependents {
                if !dependent.header().release_wait() {
                    continue;
                }

                let dependent = Notified::new(dependent);
                if dependent.is_aggregate() {
                    pending.push(dependent.bypass());
                } else {
                    self.push(dependent, local);
                }
            }

            if let Some(parent) = task.header().parent() {
                pending.push(parent.clone());
            }

            // Every dependent and the parent are themselves incomplete, so
            // this cannot reach zero while work remains.
            self.incomplete.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Marks the queue done. Only the first report is kept.
    pub(crate) fn poison(&self, id: Id, message: String) {
        self.panic.lock().get_or_insert(PanicReport { id, message });
        self.poisoned.store(true, Ordering::Release);
    }

    /// Marks the queue done without a report. Used when a worker loop itself
    /// unwinds.
    pub(crate) fn abandon(&self) {
        self.poisoned.store(true, Ordering::Release);
    }

    /// Takes the panic report, if it was not reported yet. The queue stays
    /// poisoned.
    pub(crate) fn take_panic(&self) -> Option<PanicReport> {
        self.panic.lock().take()
    }
}
