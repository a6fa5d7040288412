use crate::task::{NUM_PRIORITY_LEVELS, NUM_TASK_KINDS, Priority, TaskKind};
use std::array;

/// Cells in scan order: priority first, then `Single` before `Team`.
pub(crate) fn scan_order() -> impl Iterator<Item = (Priority, TaskKind)> {
    Priority::all().flat_map(|p| TaskKind::SCAN_ORDER.map(|k| (p, k)))
}

/// A fixed `[priority][kind]` grid of buckets.
pub(crate) struct ReadyGrid<T> {
    cells: [[T; NUM_TASK_KINDS]; NUM_PRIORITY_LEVELS],
}

impl<T> ReadyGrid<T> {
    pub(crate) fn from_fn(mut f: impl FnMut(Priority, TaskKind) -> T) -> ReadyGrid<T> {
        ReadyGrid {
            cells: array::from_fn(|level| {
                let priority = Priority::from_index(level);
                TaskKind::SCAN_ORDER.map(|kind| f(priority, kind))
            }),
        }
    }

    pub(crate) fn get(&self, priority: Priority, kind: TaskKind) -> &T {
        &self.cells[priority.index()][kind.index()]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter().flatten()
    }

    pub(crate) fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> ReadyGrid<U> {
        ReadyGrid::from_fn(|p, k| f(self.get(p, k)))
    }
}
