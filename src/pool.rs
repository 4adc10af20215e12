//! The load-ordered worker pool.
//!
//! An array-backed binary min-heap keyed on pending load. Unlike a stock
//! priority queue it also supports removing an *arbitrary* worker in
//! O(log n): every element carries its current slot index, and an
//! id-to-slot table is updated on every swap, so a completing worker can be
//! pulled out by identity even when it is nowhere near the root.

use crate::worker::{WorkerHandle, WorkerId};

pub struct WorkerPool<Req, Res> {
    slots: Vec<WorkerHandle<Req, Res>>,
    /// Back-pointers: worker id to current slot, `None` while extracted.
    index: Vec<Option<usize>>,
}

impl<Req, Res> WorkerPool<Req, Res> {
    pub fn with_capacity(workers: usize) -> Self {
        Self {
            slots: Vec::with_capacity(workers),
            index: vec![None; workers],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current slot of a pooled worker.
    pub fn position_of(&self, id: WorkerId) -> Option<usize> {
        self.index.get(id).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerHandle<Req, Res>> + '_ {
        self.slots.iter()
    }

    /// The least-loaded worker, without removing it.
    pub fn peek_min(&self) -> Option<&WorkerHandle<Req, Res>> {
        self.slots.first()
    }

    /// Inserts a worker and restores heap order.
    ///
    /// Panics if a worker with the same id is already pooled.
    pub fn insert(&mut self, worker: WorkerHandle<Req, Res>) {
        let id = worker.id();
        if id >= self.index.len() {
            self.index.resize(id + 1, None);
        }
        assert!(self.index[id].is_none(), "worker {id} is already pooled");

        let slot = self.slots.len();
        self.slots.push(worker);
        self.record(slot);
        self.sift_up(slot);
    }

    /// Removes and returns the least-loaded worker.
    pub fn extract_min(&mut self) -> Option<WorkerHandle<Req, Res>> {
        if self.slots.is_empty() {
            None
        } else {
            Some(self.take(0))
        }
    }

    /// Removes an arbitrary worker by id via its position back-pointer.
    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerHandle<Req, Res>> {
        let slot = self.position_of(id)?;
        let worker = self.take(slot);
        assert_eq!(worker.id(), id, "worker pool index corrupted");
        Some(worker)
    }

    /// Removes the worker at `slot`, repairing heap order and back-pointers.
    fn take(&mut self, slot: usize) -> WorkerHandle<Req, Res> {
        let last = self.slots.len() - 1;
        self.slots.swap(slot, last);
        let worker = self.slots.pop().expect("slot checked non-empty");
        debug_assert_eq!(worker.pos(), slot);
        self.index[worker.id()] = None;

        if slot < self.slots.len() {
            self.record(slot);
            // The displaced element may violate heap order in either
            // direction relative to its new slot.
            if self.sift_down(slot) == slot {
                self.sift_up(slot);
            }
        }
        worker
    }

    /// Stamps the element at `slot` with its position, in both directions.
    fn record(&mut self, slot: usize) {
        let id = self.slots[slot].id();
        self.slots[slot].set_pos(slot);
        self.index[id] = Some(slot);
    }

    /// Load order with a deterministic tie break on worker id.
    fn less(&self, a: usize, b: usize) -> bool {
        let (wa, wb) = (&self.slots[a], &self.slots[b]);
        (wa.pending(), wa.id()) < (wb.pending(), wb.id())
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
        self.record(a);
        self.record(b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.less(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    /// Returns the element's final slot.
    fn sift_down(&mut self, mut slot: usize) -> usize {
        loop {
            let mut smallest = slot;
            for child in [2 * slot + 1, 2 * slot + 2] {
                if child < self.slots.len() && self.less(child, smallest) {
                    smallest = child;
                }
            }
            if smallest == slot {
                return slot;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: WorkerId, pending: usize) -> WorkerHandle<(), ()> {
        let (mut h, _rx) = WorkerHandle::new(id, 1);
        for _ in 0..pending {
            h.inc_pending();
        }
        h
    }

    /// Walks every slot checking the heap property and both position
    /// back-pointer directions.
    fn assert_consistent(pool: &WorkerPool<(), ()>) {
        for (slot, worker) in pool.slots.iter().enumerate() {
            assert_eq!(worker.pos(), slot, "stale pos on worker {}", worker.id());
            assert_eq!(
                pool.index[worker.id()],
                Some(slot),
                "stale index entry for worker {}",
                worker.id()
            );
            if slot > 0 {
                let parent = &pool.slots[(slot - 1) / 2];
                assert!(
                    (parent.pending(), parent.id()) <= (worker.pending(), worker.id()),
                    "heap property violated at slot {slot}"
                );
            }
        }
    }

    #[test]
    fn extracts_in_load_order() {
        let mut pool = WorkerPool::with_capacity(6);
        for (id, pending) in [(0, 3), (1, 1), (2, 2), (3, 0), (4, 5), (5, 4)] {
            pool.insert(handle(id, pending));
            assert_consistent(&pool);
        }

        let mut order = Vec::new();
        while let Some(worker) = pool.extract_min() {
            order.push(worker.pending());
            assert_consistent(&pool);
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
        assert!(pool.is_empty());
    }

    #[test]
    fn peek_min_matches_extract_min() {
        let mut pool = WorkerPool::with_capacity(3);
        pool.insert(handle(0, 2));
        pool.insert(handle(1, 0));
        pool.insert(handle(2, 1));

        let peeked = pool.peek_min().unwrap().id();
        let extracted = pool.extract_min().unwrap();
        assert_eq!(peeked, extracted.id());
        assert_eq!(extracted.pending(), 0);
    }

    #[test]
    fn removes_arbitrary_workers_by_id() {
        let mut pool = WorkerPool::with_capacity(7);
        for id in 0..7 {
            pool.insert(handle(id, id));
        }

        // Pull one from the middle of the array, not the root.
        let removed = pool.remove(3).unwrap();
        assert_eq!(removed.id(), 3);
        assert_eq!(removed.pending(), 3);
        assert_consistent(&pool);
        assert_eq!(pool.position_of(3), None);

        let mut order = Vec::new();
        while let Some(worker) = pool.extract_min() {
            order.push(worker.id());
            assert_consistent(&pool);
        }
        assert_eq!(order, vec![0, 1, 2, 4, 5, 6]);
    }

    #[test]
    fn remove_unknown_id_returns_none() {
        let mut pool = WorkerPool::with_capacity(2);
        pool.insert(handle(0, 0));
        assert!(pool.remove(1).is_none());
        assert!(pool.remove(99).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn tie_break_is_lower_worker_id() {
        let mut pool = WorkerPool::with_capacity(4);
        for id in [2, 0, 3, 1] {
            pool.insert(handle(id, 1));
        }

        let mut order = Vec::new();
        while let Some(worker) = pool.extract_min() {
            order.push(worker.id());
        }
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn reinserted_worker_with_lower_load_surfaces_first() {
        let mut pool = WorkerPool::with_capacity(3);
        pool.insert(handle(0, 2));
        pool.insert(handle(1, 2));
        pool.insert(handle(2, 2));

        // The complete path: remove by id, drop the load, reinsert.
        let mut worker = pool.remove(1).unwrap();
        worker.dec_pending();
        pool.insert(worker);
        assert_consistent(&pool);

        assert_eq!(pool.peek_min().unwrap().id(), 1);
        assert_eq!(pool.peek_min().unwrap().pending(), 1);
    }

    #[test]
    fn positions_stay_accurate_across_churn() {
        let mut pool = WorkerPool::with_capacity(8);
        for id in 0..8 {
            pool.insert(handle(id, 0));
        }

        // Dispatch-shaped churn: repeatedly extract the minimum, raise its
        // load, reinsert; interleave completion-shaped arbitrary removals.
        for round in 0..16 {
            let mut worker = pool.extract_min().unwrap();
            worker.inc_pending();
            pool.insert(worker);
            assert_consistent(&pool);

            let victim = round % 8;
            if let Some(mut worker) = pool.remove(victim) {
                if worker.pending() > 0 {
                    worker.dec_pending();
                }
                pool.insert(worker);
                assert_consistent(&pool);
            }
        }

        for id in 0..8 {
            let slot = pool.position_of(id).unwrap();
            assert_eq!(pool.slots[slot].id(), id);
        }
    }
}
