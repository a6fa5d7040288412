//! A cooperative task-graph execution engine.
//!
//! Tasks are closures declared with a [`TaskSpec`]: a static priority, a kind,
//! and the tasks they must run after. A [`Scheduler`] owns the ready queue and
//! an [`ExecutionSpace`] whose workers drain it during
//! [`Scheduler::execute`]. Running tasks can spawn more work, and can
//! `respawn` continuations that their own completion waits on.
//!
//! ```ignore
//! use taskdag::{Builder, Priority, TaskSpec};
//!
//! let sched = Builder::new_threaded().worker_threads(4).try_build()?;
//!
//! let a = sched.spawn(TaskSpec::single().priority(Priority::HIGH), |_| 1)?;
//! let b = sched.spawn(TaskSpec::single().after(&a), |_| 2)?;
//! let all = sched.when_all([&a, &b])?;
//!
//! sched.execute()?;
//! assert!(all.is_ready());
//! assert_eq!(b.get(), Some(&2));
//! ```

mod error;
pub use error::SchedulerError;

mod queue;

pub mod runtime;
pub use runtime::{Builder, ExecutionSpace, Scheduler, Serial, Stats, TaskContext, ThreadPool};

mod task;
pub use task::{Dependency, Id, NUM_PRIORITY_LEVELS, Priority, ReadyState, TaskFuture, TaskKind, TaskSpec};

mod utils;

#[cfg(test)]
mod test_utils;
