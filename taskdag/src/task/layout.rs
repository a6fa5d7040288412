use crate::runtime::stats::Counters;
use crate::task::header::{Header, TaskFlags};
use crate::task::vtable::vtable;
use crate::task::{Priority, Task, TaskContext, TaskKind};
use std::cell::UnsafeCell;
use std::sync::Arc;

/// The task cell. Contains the components of the task.
///
/// It is critical for `Header` to be the first field as the task structure will
/// be referenced by both *mut TaskLayout and *mut Header.
#[repr(C)]
pub(super) struct TaskLayout<F, R> {
    /// Hot task state data
    pub(super) header: Header,

    /// Either the payload or its output, depending on the execution stage.
    pub(super) core: Core<F, R>,
}

pub(super) struct Core<F, R> {
    pub(super) stage: UnsafeCell<Stage<F, R>>,
}

pub(super) enum Stage<F, R> {
    Pending(F),
    Finished(R),
    Consumed,
}

impl<F, R> TaskLayout<F, R>
where
    F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    pub(super) fn new(
        payload: F,
        priority: Priority,
        kind: TaskKind,
        flags: TaskFlags,
        parent: Option<Task>,
        counters: Arc<Counters>,
    ) -> Box<TaskLayout<F, R>> {
        Box::new(TaskLayout {
            header: Header::new(vtable::<F, R>(), priority, kind, flags, parent, counters),
            core: Core {
                stage: UnsafeCell::new(Stage::Pending(payload)),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::const_assert_eq;
    use std::mem::offset_of;

    type Payload = fn(&mut TaskContext<'_>) -> u64;

    // Raw pointers to the layout are reinterpreted as pointers to the header.
    const_assert_eq!(offset_of!(TaskLayout<Payload, u64>, header), 0);
    const_assert_eq!(offset_of!(TaskLayout<(), ()>, header), 0);
}
