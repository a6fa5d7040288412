#![allow(unsafe_op_in_unsafe_fn)]

use crate::runtime::stats::Counters;
use crate::task::header::TaskFlags;
use crate::task::layout::TaskLayout;
use crate::task::{Header, Priority, Task, TaskContext, TaskKind};
use std::ptr::NonNull;
use std::sync::Arc;

/// Raw task handle
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawTask {
    ptr: NonNull<Header>,
}

impl RawTask {
    pub(super) fn new<F, R>(
        payload: F,
        priority: Priority,
        kind: TaskKind,
        flags: TaskFlags,
        parent: Option<Task>,
        counters: Arc<Counters>,
    ) -> RawTask
    where
        F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        let ptr = Box::into_raw(TaskLayout::new(payload, priority, kind, flags, parent, counters));
        let ptr = unsafe { NonNull::new_unchecked(ptr.cast()) };
        RawTask { ptr }
    }

    /// Returns a reference to the task's header.
    pub(crate) fn header(&self) -> &Header {
        unsafe { self.ptr.as_ref() }
    }

    /// Safety: the caller must own the `Ready -> Running` transition.
    pub(super) unsafe fn apply(self, cx: &mut TaskContext<'_>) {
        let vtable = self.header().vtable;
        (vtable.apply)(self.ptr, cx)
    }

    /// Safety: the reference count must have reached zero.
    pub(super) unsafe fn dealloc(self) {
        let vtable = self.header().vtable;
        (vtable.destroy)(self.ptr)
    }

    /// Safety: `R` must be the output type of the payload stored by the task,
    /// and the caller must hold a reference to the record for `'a`.
    pub(super) unsafe fn read_output<'a, R>(self) -> Option<&'a R> {
        let vtable = self.header().vtable;
        let output = (vtable.read_output)(self.ptr).cast::<R>();
        output.as_ref()
    }
}
