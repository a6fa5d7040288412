use crate::SchedulerError;
use crate::queue::{LocalQueue, TaskQueue};
use crate::task::{Dependency, Header, Id, Priority, RawTask, Task, TaskFlags, TaskFuture, TaskKind, TaskSpec};
use std::fmt;
use std::mem::ManuallyDrop;

/// The execution context a task's payload runs against.
///
/// One context exists per worker and per `execute`; the worker points it at
/// each task it applies. Tasks spawned through the context land on the
/// worker's own ready queue.
pub struct TaskContext<'a> {
    queue: &'a TaskQueue,
    local: &'a LocalQueue,
    worker_index: usize,
    concurrency: usize,
    scratch: &'a mut [u8],

    /// The task being applied. The worker holds its reference.
    current: Option<RawTask>,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        queue: &'a TaskQueue,
        local: &'a LocalQueue,
        worker_index: usize,
        concurrency: usize,
        scratch: &'a mut [u8],
    ) -> TaskContext<'a> {
        TaskContext {
            queue,
            local,
            worker_index,
            concurrency,
            scratch,
            current: None,
        }
    }

    pub(crate) fn enter(&mut self, task: RawTask) {
        self.current = Some(task);
    }

    pub(crate) fn exit(&mut self) {
        self.current = None;
    }

    fn current(&self) -> ManuallyDrop<Task> {
        let raw = self.current.expect("task context used outside of a running task");

        // Safety: the worker owns a reference for as long as the task is
        // entered, and the borrowed handle is never dropped.
        ManuallyDrop::new(unsafe { Task::from_raw(raw) })
    }

    fn header(&self) -> &Header {
        self.current
            .as_ref()
            .expect("task context used outside of a running task")
            .header()
    }

    /// Index of the worker running the task, in `0..concurrency()`.
    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// Number of workers of this `execute`.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Rank of this worker within its team. Teams are a single worker.
    pub fn team_rank(&self) -> usize {
        0
    }

    pub fn team_size(&self) -> usize {
        1
    }

    /// This worker's scratch memory. Contents are left over from earlier tasks.
    pub fn scratch(&mut self) -> &mut [u8] {
        &mut self.scratch[..]
    }

    pub fn task_id(&self) -> Id {
        self.header().id()
    }

    pub fn priority(&self) -> Priority {
        self.header().priority()
    }

    pub fn kind(&self) -> TaskKind {
        self.header().kind()
    }

    /// Spawns a task onto this worker's ready queue. The running task does not
    /// wait for it.
    pub fn spawn<F, R>(&mut self, spec: TaskSpec, payload: F) -> Result<TaskFuture<R>, SchedulerError>
    where
        F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        self.queue.spawn(spec, TaskFlags::empty(), payload, None, Some(self.local))
    }

    /// Spawns continuation work: the running task only completes, and its
    /// dependents only become ready, after the continuation completed.
    ///
    /// Fails with [`SchedulerError::SelfDependency`] if `spec` depends on the
    /// running task or on a task it continues.
    pub fn respawn<F, R>(&mut self, spec: TaskSpec, payload: F) -> Result<TaskFuture<R>, SchedulerError>
    where
        F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        let parent = self.current();
        self.queue.spawn(spec, TaskFlags::empty(), payload, Some(&parent), Some(self.local))
    }

    /// A task that completes once every task in `deps` completed.
    pub fn when_all<'d, D, I>(&mut self, deps: I) -> Result<TaskFuture<()>, SchedulerError>
    where
        D: Dependency + 'd,
        I: IntoIterator<Item = &'d D>,
    {
        self.queue.when_all(deps, Some(self.local))
    }
}

impl fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("worker_index", &self.worker_index)
            .field("concurrency", &self.concurrency)
            .field("scratch_size", &self.scratch.len())
            .field("current", &self.current.as_ref().map(|raw| raw.header().id()))
            .finish()
    }
}
