use crate::task::Id;

/// Errors returned by the scheduler's public operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("invalid priority level {0}, must be below {max}", max = crate::NUM_PRIORITY_LEVELS)]
    InvalidPriority(u8),

    /// A continuation was declared to run after the task that respawned it, or
    /// after one of that task's own parents. It could never become ready.
    #[error("a continuation cannot depend on the task it continues")]
    SelfDependency,

    /// A dependency was spawned on another scheduler. Its completion would
    /// never reach this scheduler's queue.
    #[error("task {0} belongs to another scheduler")]
    ForeignDependency(Id),

    #[error("execute is already running on this scheduler")]
    AlreadyExecuting,

    #[error("task {id} panicked: {message}")]
    TaskPanicked { id: Id, message: String },

    /// A task panicked during an earlier `execute`. The queue is abandoned.
    #[error("scheduler is poisoned by an earlier task panic")]
    Poisoned,
}
