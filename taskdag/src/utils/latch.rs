use parking_lot::{Condvar, Mutex};

/// A counting latch: `wait` blocks until `count_down` was called `count`
/// times.
#[derive(Debug)]
pub(crate) struct Latch {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl Latch {
    pub(crate) fn new(count: usize) -> Latch {
        Latch {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    #[track_caller]
    pub(crate) fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.checked_sub(1).expect("latch counted down too many times");

        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    pub(crate) fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.done.wait(&mut remaining);
        }
    }
}
