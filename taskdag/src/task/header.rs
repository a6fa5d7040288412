use crate::runtime::stats::Counters;
use crate::task::state::State;
use crate::task::vtable::Vtable;
use crate::task::{Id, Priority, Task, TaskKind};
use bitflags::bitflags;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct TaskFlags: u8 {
        /// Spawned through `respawn`: the parent cannot complete before it.
        const CONTINUATION = 1 << 0;

        /// No-op payload produced by `when_all`.
        const AGGREGATE = 1 << 1;
    }
}

pub(crate) type Dependents = SmallVec<[Task; 4]>;

/// Everything the queue and the worker loops need to know about a task,
/// without knowing its payload type.
///
/// It is critical for `Header` to be the first field of the task layout, as
/// the record is referenced through both `*mut TaskLayout` and `*mut Header`.
#[repr(C)]
pub(crate) struct Header {
    /// Lifecycle and reference count.
    pub(super) state: State,

    /// Table of function pointers for the payload type.
    pub(super) vtable: &'static Vtable,

    pub(super) id: Id,
    pub(super) priority: Priority,
    pub(super) kind: TaskKind,
    pub(super) flags: TaskFlags,

    /// Unresolved dependencies, plus one guard held by the spawner until every
    /// dependency edge is registered.
    pub(super) wait_count: AtomicU32,

    /// The task's own execution plus one per respawned continuation that has
    /// not completed yet.
    pub(super) outstanding: AtomicU32,

    /// Tasks waiting on this one. Completion takes the list under the same
    /// lock that registration checks `Complete` under.
    pub(super) dependents: Mutex<Dependents>,

    /// Set on continuations only.
    pub(super) parent: Option<Task>,

    pub(super) counters: Arc<Counters>,
}

impl Header {
    pub(super) fn new(
        vtable: &'static Vtable,
        priority: Priority,
        kind: TaskKind,
        flags: TaskFlags,
        parent: Option<Task>,
        counters: Arc<Counters>,
    ) -> Header {
        Header {
            state: State::new(),
            vtable,
            id: Id::next(),
            priority,
            kind,
            flags,
            wait_count: AtomicU32::new(1),
            outstanding: AtomicU32::new(1),
            dependents: Mutex::new(SmallVec::new()),
            parent,
            counters,
        }
    }

    pub(crate) fn id(&self) -> Id {
        self.id
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.kind
    }

    pub(crate) fn flags(&self) -> TaskFlags {
        self.flags
    }

    pub(crate) fn parent(&self) -> Option<&Task> {
        self.parent.as_ref()
    }

    /// True if the task was spawned on the queue owning `counters`.
    pub(crate) fn belongs_to(&self, counters: &Arc<Counters>) -> bool {
        Arc::ptr_eq(&self.counters, counters)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.state.load().is_complete()
    }

    /// Records `dependent` as waiting on this task and bumps its wait count.
    /// Returns false, and records nothing, if this task already completed.
    pub(crate) fn register_dependent(&self, dependent: &Task) -> bool {
        let mut dependents = self.dependents.lock();
        if self.is_complete() {
            return false;
        }

        // Must happen before the edge becomes visible to a completing worker.
        dependent.header().wait_count.fetch_add(1, Ordering::AcqRel);
        dependents.push(dependent.clone());
        true
    }

    /// Returns true if this released the last wait, making the task runnable.
    pub(crate) fn release_wait(&self) -> bool {
        let prev = self.wait_count.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "FATAL: task {} wait count underflow", self.id);
        prev == 1
    }

    /// Adds a hold on completion for a continuation.
    pub(crate) fn hold(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns true if this released the last hold on completion.
    #[track_caller]
    pub(crate) fn release_hold(&self) -> bool {
        let prev = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            panic!("FATAL: task {} completed twice, reference counting is broken", self.id);
        }
        prev == 1
    }

    /// `Running -> Complete`, handing back the tasks that were waiting on this
    /// one. Panics if the task already completed.
    #[track_caller]
    pub(crate) fn mark_complete(&self) -> Dependents {
        let mut dependents = self.dependents.lock();
        self.state.transition_to_complete();
        std::mem::take(&mut *dependents)
    }

    /// True if `task` is this task or a parent waiting on it through a chain of
    /// continuations.
    pub(crate) fn is_self_or_ancestor(&self, task: &Header) -> bool {
        let mut current = Some(self);
        while let Some(header) = current {
            if std::ptr::eq(header, task) {
                return true;
            }
            current = header.parent.as_ref().map(Task::header);
        }
        false
    }
}
