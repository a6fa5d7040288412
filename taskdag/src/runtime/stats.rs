use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by a queue and every record it allocates.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) spawned: AtomicU64,
    pub(crate) applied: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) destroyed: AtomicU64,
    pub(crate) stolen: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            spawned: self.spawned.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            stolen: self.stolen.load(Ordering::Relaxed),
        }
    }
}

/// Point in time snapshot of a scheduler's monotonic counters.
///
/// Counters are read independently, so a snapshot taken while `execute` runs
/// is only approximately consistent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Task records allocated, including `when_all` aggregates.
    pub spawned: u64,

    /// Payloads invoked.
    pub applied: u64,

    /// Records that reached `Complete`.
    pub completed: u64,

    /// Records freed.
    pub destroyed: u64,

    /// Tasks taken from a peer worker's local queue.
    pub stolen: u64,
}
