//! The task state word.
//!
//! A single `AtomicUsize` packs the ready-state lifecycle in the low bits and
//! the reference count in the remaining bits, so that a record's lifecycle and
//! its ownership can be inspected with one load.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

const LIFECYCLE_MASK: usize = 0b11;

const NOT_READY: usize = 0b00;
const READY: usize = 0b01;
const RUNNING: usize = 0b10;
const COMPLETE: usize = 0b11;

const REF_COUNT_SHIFT: usize = 2;
const REF_ONE: usize = 1 << REF_COUNT_SHIFT;

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Blocked on at least one unresolved dependency.
    NotReady,

    /// Linked into a ready queue bucket.
    Ready,

    /// Dequeued by a worker. A task stays `Running` after its payload returns
    /// while respawned continuation work is still outstanding.
    Running,

    /// Terminal.
    Complete,
}

pub(crate) struct State {
    val: AtomicUsize,
}

#[derive(Copy, Clone)]
pub(crate) struct Snapshot(usize);

impl State {
    /// A new task starts `NotReady` with a single reference, owned by the
    /// spawner.
    pub(super) fn new() -> State {
        State {
            val: AtomicUsize::new(NOT_READY | REF_ONE),
        }
    }

    pub(crate) fn load(&self) -> Snapshot {
        Snapshot(self.val.load(Ordering::Acquire))
    }

    pub(super) fn ref_inc(&self) {
        let prev = self.val.fetch_add(REF_ONE, Ordering::Relaxed);

        // Same overflow guard as `Arc`: a refcount this large means handles are
        // being leaked in a loop.
        if prev > isize::MAX as usize {
            std::process::abort();
        }
    }

    /// Returns true if this dropped the last reference.
    pub(super) fn ref_dec(&self) -> bool {
        let prev = Snapshot(self.val.fetch_sub(REF_ONE, Ordering::AcqRel));
        assert!(prev.ref_count() >= 1, "FATAL: task reference count underflow");
        prev.ref_count() == 1
    }

    #[track_caller]
    pub(crate) fn transition_to_ready(&self) {
        if let Err(actual) = self.transition(NOT_READY, READY) {
            panic!("FATAL: task made ready twice (state: {:?})", actual);
        }
    }

    /// `Ready -> Running`. Fails if the task was not linked in a queue, which
    /// means two workers dequeued the same record.
    pub(crate) fn transition_to_running(&self) -> Result<Snapshot, Snapshot> {
        self.transition(READY, RUNNING)
    }

    #[track_caller]
    pub(crate) fn transition_to_complete(&self) {
        match self.transition(RUNNING, COMPLETE) {
            Ok(_) => {}
            Err(actual) if actual.is_complete() => {
                panic!("FATAL: task completed twice, reference counting is broken")
            }
            Err(actual) => panic!("FATAL: completing a task that never ran ({:?})", actual),
        }
    }

    fn transition(&self, from: usize, to: usize) -> Result<Snapshot, Snapshot> {
        self.val
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |curr| {
                (curr & LIFECYCLE_MASK == from).then_some((curr & !LIFECYCLE_MASK) | to)
            })
            .map(Snapshot)
            .map_err(Snapshot)
    }
}

impl Snapshot {
    pub(crate) fn ready_state(self) -> ReadyState {
        match self.0 & LIFECYCLE_MASK {
            NOT_READY => ReadyState::NotReady,
            READY => ReadyState::Ready,
            RUNNING => ReadyState::Running,
            _ => ReadyState::Complete,
        }
    }

    pub(crate) fn is_complete(self) -> bool {
        self.0 & LIFECYCLE_MASK == COMPLETE
    }

    pub(crate) fn ref_count(self) -> usize {
        self.0 >> REF_COUNT_SHIFT
    }
}

impl fmt::Debug for State {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.load().fmt(fmt)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Snapshot")
            .field("state", &self.ready_state())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let state = State::new();
        assert_eq!(state.load().ready_state(), ReadyState::NotReady);
        assert_eq!(state.load().ref_count(), 1);

        state.transition_to_ready();
        assert!(state.transition_to_running().is_ok());
        assert!(state.transition_to_running().is_err());

        state.transition_to_complete();
        assert!(state.load().is_complete());
        assert_eq!(state.load().ref_count(), 1);
    }

    #[test]
    fn test_ref_count_is_independent_of_lifecycle() {
        let state = State::new();
        state.ref_inc();
        state.ref_inc();
        state.transition_to_ready();

        assert_eq!(state.load().ref_count(), 3);
        assert_eq!(state.load().ready_state(), ReadyState::Ready);

        assert!(!state.ref_dec());
        assert!(!state.ref_dec());
        assert!(state.ref_dec());
    }

    #[test]
    #[should_panic(expected = "completed twice")]
    fn test_double_completion_is_fatal() {
        let state = State::new();
        state.transition_to_ready();
        let _ = state.transition_to_running();
        state.transition_to_complete();
        state.transition_to_complete();
    }

    #[test]
    #[should_panic(expected = "never ran")]
    fn test_completing_a_ready_task_is_fatal() {
        let state = State::new();
        state.transition_to_ready();
        state.transition_to_complete();
    }
}
