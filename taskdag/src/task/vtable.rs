#![allow(unsafe_op_in_unsafe_fn)]

use crate::task::layout::{Stage, TaskLayout};
use crate::task::{Header, TaskContext};
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

/// Invokes the payload against the worker's execution context.
pub(crate) type ApplyFn = unsafe fn(NonNull<Header>, &mut TaskContext<'_>);

/// Drops whatever the record still owns and frees it.
pub(crate) type DestroyFn = unsafe fn(NonNull<Header>);

type ReadOutputFn = unsafe fn(NonNull<Header>) -> *const ();

/// Per payload type table of function pointers. The queue and the worker loops
/// only ever see `NonNull<Header>` and call through this table.
pub(crate) struct Vtable {
    pub(super) apply: ApplyFn,

    pub(super) destroy: DestroyFn,

    /// Points at the payload's output once it has been produced, null
    /// otherwise.
    pub(super) read_output: ReadOutputFn,
}

/// Get the vtable for the requested `F` and `R` types. The table is evaluated at
/// compile time, so there is one per payload type in the binary.
pub(super) fn vtable<F, R>() -> &'static Vtable
where
    F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    const {
        &Vtable {
            apply: get_function_pointer::<F, R>().0,
            destroy: get_function_pointer::<F, R>().1,
            read_output: read_output::<F, R>,
        }
    }
}

/// The `(apply, destroy)` pair for payload type `F`.
pub(crate) const fn get_function_pointer<F, R>() -> (ApplyFn, DestroyFn)
where
    F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    (apply::<F, R>, destroy::<F, R>)
}

unsafe fn stage<F, R>(ptr: NonNull<Header>) -> *mut Stage<F, R> {
    ptr.cast::<TaskLayout<F, R>>().as_ref().core.stage.get()
}

/// Safety: the caller must own the `Running` transition of this record.
unsafe fn apply<F, R>(ptr: NonNull<Header>, cx: &mut TaskContext<'_>)
where
    F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    let stage = stage::<F, R>(ptr);

    let payload = match mem::replace(&mut *stage, Stage::Consumed) {
        Stage::Pending(payload) => payload,
        _ => panic!("FATAL: task {} applied twice", ptr.as_ref().id),
    };

    // The stage is not borrowed while the payload runs.
    let output = payload(cx);
    ptr::write(stage, Stage::Finished(output));
}

/// Safety: must only be called once the last reference is gone.
unsafe fn destroy<F, R>(ptr: NonNull<Header>)
where
    F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    let layout = Box::from_raw(ptr.cast::<TaskLayout<F, R>>().as_ptr());
    let counters = layout.header.counters.clone();
    drop(layout);
    counters.destroyed.fetch_add(1, Ordering::Relaxed);
}

/// Safety: the record must be `Complete`, which publishes the output.
unsafe fn read_output<F, R>(ptr: NonNull<Header>) -> *const ()
where
    F: FnOnce(&mut TaskContext<'_>) -> R + Send + 'static,
    R: Send + Sync + 'static,
{
    match &*stage::<F, R>(ptr) {
        Stage::Finished(output) => (output as *const R).cast(),
        _ => ptr::null(),
    }
}
