use crate::SchedulerError;
use crate::task::{Task, TaskFuture};
use smallvec::SmallVec;
use std::fmt;

/// Number of priority levels of the ready queue.
pub const NUM_PRIORITY_LEVELS: usize = 8;

pub(crate) const NUM_TASK_KINDS: usize = 2;

/// Static scheduling hint. Lower levels are dequeued first.
///
/// Priority is evaluated once, when a worker scans the ready queue. There is no
/// aging, so a steady stream of high priority work can starve lower levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const HIGH: Priority = Priority(0);
    pub const REGULAR: Priority = Priority(3);
    pub const LOW: Priority = Priority(NUM_PRIORITY_LEVELS as u8 - 1);

    /// Fails with [`SchedulerError::InvalidPriority`] if `level` is not below
    /// [`NUM_PRIORITY_LEVELS`].
    pub fn new(level: u8) -> Result<Priority, SchedulerError> {
        if usize::from(level) < NUM_PRIORITY_LEVELS {
            Ok(Priority(level))
        } else {
            Err(SchedulerError::InvalidPriority(level))
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }

    pub(crate) fn from_index(index: usize) -> Priority {
        debug_assert!(index < NUM_PRIORITY_LEVELS);
        Priority(index as u8)
    }

    /// All levels, in scan order.
    pub(crate) fn all() -> impl Iterator<Item = Priority> {
        (0..NUM_PRIORITY_LEVELS as u8).map(Priority)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::REGULAR
    }
}

impl TryFrom<u8> for Priority {
    type Error = SchedulerError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Priority::new(level)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Runs on one worker.
    #[default]
    Single,

    /// Cooperative team task. Always executed with a team of one worker.
    Team,
}

impl TaskKind {
    /// Within a priority level, `Single` buckets are scanned before `Team`.
    pub(crate) const SCAN_ORDER: [TaskKind; NUM_TASK_KINDS] = [TaskKind::Single, TaskKind::Team];

    pub(crate) fn index(self) -> usize {
        match self {
            TaskKind::Single => 0,
            TaskKind::Team => 1,
        }
    }
}

mod sealed {
    pub trait Sealed {
        fn task(&self) -> &crate::task::Task;
    }
}

/// Anything a task can be declared to run after.
pub trait Dependency: sealed::Sealed {}

impl<R> sealed::Sealed for TaskFuture<R> {
    fn task(&self) -> &Task {
        self.task()
    }
}

impl<R> Dependency for TaskFuture<R> {}

/// Declaration of a task: its priority, kind and the tasks it must run after.
///
/// ```ignore
/// let a = sched.spawn(TaskSpec::single(), |_| 1)?;
/// let b = sched.spawn(TaskSpec::team().priority(Priority::HIGH).after(&a), |_| 2)?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct TaskSpec {
    pub(crate) priority: Priority,
    pub(crate) kind: TaskKind,
    pub(crate) deps: SmallVec<[Task; 4]>,
}

impl TaskSpec {
    pub fn single() -> TaskSpec {
        TaskSpec::default()
    }

    pub fn team() -> TaskSpec {
        TaskSpec {
            kind: TaskKind::Team,
            ..TaskSpec::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> TaskSpec {
        self.priority = priority;
        self
    }

    /// The task will not run before `dep` has completed.
    pub fn after<D: Dependency + ?Sized>(mut self, dep: &D) -> TaskSpec {
        self.deps.push(dep.task().clone());
        self
    }

    pub fn after_all<'a, D, I>(self, deps: I) -> TaskSpec
    where
        D: Dependency + 'a,
        I: IntoIterator<Item = &'a D>,
    {
        deps.into_iter().fold(self, |spec, dep| spec.after(dep))
    }

    pub(crate) fn dependencies(&self) -> &[Task] {
        &self.deps
    }
}
