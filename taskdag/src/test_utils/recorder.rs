use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Records which labelled payloads ran, and in which order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    clock: AtomicU64,
    runs: DashMap<usize, Vec<u64>>,
    log: Mutex<Vec<usize>>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a run of `label` and returns its sequence number.
    pub(crate) fn record(&self, label: usize) -> u64 {
        let mut log = self.inner.log.lock();
        let seq = self.inner.clock.fetch_add(1, Ordering::Relaxed);
        log.push(label);
        self.inner.runs.entry(label).or_default().push(seq);
        seq
    }

    pub(crate) fn runs(&self, label: usize) -> usize {
        self.inner.runs.get(&label).map_or(0, |runs| runs.len())
    }

    pub(crate) fn first(&self, label: usize) -> Option<u64> {
        self.inner.runs.get(&label).and_then(|runs| runs.iter().min().copied())
    }

    pub(crate) fn last(&self, label: usize) -> Option<u64> {
        self.inner.runs.get(&label).and_then(|runs| runs.iter().max().copied())
    }

    /// Labels in the order they were recorded.
    pub(crate) fn order(&self) -> Vec<usize> {
        self.inner.log.lock().clone()
    }

    pub(crate) fn total(&self) -> usize {
        self.inner.log.lock().len()
    }
}

/// Counts how many times it was dropped, across clones of the counter.
#[derive(Debug)]
pub(crate) struct DropProbe(Arc<AtomicUsize>);

impl DropProbe {
    pub(crate) fn new(drops: &Arc<AtomicUsize>) -> Self {
        DropProbe(drops.clone())
    }
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}
