use crate::pool::{
    meta::{Arena, MetaTxId},
    state::SubPoolType,
};
use std::cmp::Ordering;

/// Which end of the priority order a heap keeps at its root.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Side {
    Best,
    Worst,
}

/// Binary heap over arena handles that writes every element's position back
/// into its record, so elements can be located by handle in O(1).
#[derive(Debug)]
struct Heap {
    side: Side,
    items: Vec<MetaTxId>,
}

// === impl Heap ===

impl Heap {
    fn new(side: Side) -> Self {
        Self { side, items: Vec::new() }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn peek(&self) -> Option<MetaTxId> {
        self.items.first().copied()
    }

    /// Whether the element at `a` must sit above the element at `b`.
    fn ranks_before(&self, arena: &Arena, a: MetaTxId, b: MetaTxId) -> bool {
        let ord = arena[a].prefer(&arena[b]);
        match self.side {
            Side::Best => ord == Ordering::Greater,
            Side::Worst => ord == Ordering::Less,
        }
    }

    fn set_position(&self, arena: &mut Arena, id: MetaTxId, pos: isize) {
        match self.side {
            Side::Best => arena[id].best_index = pos,
            Side::Worst => arena[id].worst_index = pos,
        }
    }

    fn position(&self, arena: &Arena, id: MetaTxId) -> isize {
        match self.side {
            Side::Best => arena[id].best_index,
            Side::Worst => arena[id].worst_index,
        }
    }

    fn swap(&mut self, arena: &mut Arena, i: usize, j: usize) {
        self.items.swap(i, j);
        self.set_position(arena, self.items[i], i as isize);
        self.set_position(arena, self.items[j], j as isize);
    }

    fn sift_up(&mut self, arena: &mut Arena, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.ranks_before(arena, self.items[pos], self.items[parent]) {
                break
            }
            self.swap(arena, pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, arena: &mut Arena, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            if left >= self.items.len() {
                break
            }
            let right = left + 1;
            let mut child = left;
            if right < self.items.len() &&
                self.ranks_before(arena, self.items[right], self.items[left])
            {
                child = right;
            }
            if !self.ranks_before(arena, self.items[child], self.items[pos]) {
                break
            }
            self.swap(arena, pos, child);
            pos = child;
        }
    }

    /// Pushes an element, restoring heap order.
    fn push(&mut self, arena: &mut Arena, id: MetaTxId) {
        let pos = self.items.len();
        self.items.push(id);
        self.set_position(arena, id, pos as isize);
        self.sift_up(arena, pos);
    }

    /// Appends an element without restoring heap order; batch with
    /// [`Self::heapify`].
    fn append(&mut self, arena: &mut Arena, id: MetaTxId) {
        let pos = self.items.len();
        self.items.push(id);
        self.set_position(arena, id, pos as isize);
    }

    /// Re-establishes heap order over all elements.
    fn heapify(&mut self, arena: &mut Arena) {
        for pos in (0..self.items.len() / 2).rev() {
            self.sift_down(arena, pos);
        }
    }

    /// Removes the element at `pos`, restoring heap order.
    fn remove_at(&mut self, arena: &mut Arena, pos: usize) -> MetaTxId {
        let id = self.swap_out(arena, pos);
        if pos < self.items.len() {
            self.sift_down(arena, pos);
            self.sift_up(arena, pos);
        }
        id
    }

    /// Swap-with-last removal that does not restore heap order; batch with
    /// [`Self::heapify`].
    fn swap_out(&mut self, arena: &mut Arena, pos: usize) -> MetaTxId {
        let last = self.items.len() - 1;
        if pos != last {
            self.swap(arena, pos, last);
        }
        let id = self.items.pop().expect("heap element present");
        self.set_position(arena, id, -1);
        id
    }
}

/// A priority container over one sub-pool's transactions: a best heap
/// (highest priority first) and a worst heap (lowest priority first) over the
/// same set of elements.
///
/// The `unsafe_*` operations break heap order for O(1) bulk mutation and
/// must be followed by [`Self::enforce_invariants`] before the next ordered
/// access.
#[derive(Debug)]
pub(crate) struct SubPool {
    kind: SubPoolType,
    best: Heap,
    worst: Heap,
}

// === impl SubPool ===

impl SubPool {
    /// Creates an empty sub-pool with the given tag.
    pub(crate) fn new(kind: SubPoolType) -> Self {
        Self { kind, best: Heap::new(Side::Best), worst: Heap::new(Side::Worst) }
    }

    /// Number of resident transactions.
    pub(crate) fn len(&self) -> usize {
        debug_assert_eq!(self.best.len(), self.worst.len());
        self.best.len()
    }

    /// The highest-priority element.
    pub(crate) fn best(&self) -> Option<MetaTxId> {
        self.best.peek()
    }

    /// The lowest-priority element.
    pub(crate) fn worst(&self) -> Option<MetaTxId> {
        self.worst.peek()
    }

    /// All resident elements, in no particular order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = MetaTxId> + '_ {
        self.best.items.iter().copied()
    }

    /// Adds an element, restoring order in both heaps.
    pub(crate) fn add(&mut self, arena: &mut Arena, id: MetaTxId) {
        arena[id].current = Some(self.kind);
        self.best.push(arena, id);
        self.worst.push(arena, id);
    }

    /// O(1) append without restoring order.
    pub(crate) fn unsafe_add(&mut self, arena: &mut Arena, id: MetaTxId) {
        arena[id].current = Some(self.kind);
        self.best.append(arena, id);
        self.worst.append(arena, id);
    }

    /// O(1) removal by back-indices without restoring order.
    pub(crate) fn unsafe_remove(&mut self, arena: &mut Arena, id: MetaTxId) {
        let (best_pos, worst_pos) = {
            let meta = &arena[id];
            debug_assert_eq!(meta.current, Some(self.kind));
            debug_assert!(meta.best_index >= 0 && meta.worst_index >= 0);
            (meta.best_index as usize, meta.worst_index as usize)
        };
        self.best.swap_out(arena, best_pos);
        self.worst.swap_out(arena, worst_pos);
        arena[id].current = None;
    }

    /// Re-heapifies both heaps after a batch of unsafe mutations.
    pub(crate) fn enforce_invariants(&mut self, arena: &mut Arena) {
        self.best.heapify(arena);
        self.worst.heapify(arena);
    }

    /// Removes and returns the highest-priority element.
    pub(crate) fn pop_best(&mut self, arena: &mut Arena) -> Option<MetaTxId> {
        let id = self.best.peek()?;
        self.best.remove_at(arena, 0);
        let worst_pos = self.worst.position(arena, id);
        self.worst.remove_at(arena, worst_pos as usize);
        arena[id].current = None;
        Some(id)
    }

    /// Removes and returns the lowest-priority element.
    pub(crate) fn pop_worst(&mut self, arena: &mut Arena) -> Option<MetaTxId> {
        let id = self.worst.peek()?;
        self.worst.remove_at(arena, 0);
        let best_pos = self.best.position(arena, id);
        self.best.remove_at(arena, best_pos as usize);
        arena[id].current = None;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identifier::SenderId,
        pool::{meta::MetaTx, state::SubPoolMarker},
        transaction::TxSlot,
    };
    use rand::{seq::SliceRandom, Rng};

    fn insert(arena: &mut Arena, marker: u8, tip: u64, nonce: u64) -> MetaTxId {
        let mut meta = MetaTx::new(
            TxSlot { sender_id: SenderId::new(1), nonce, tip, ..Default::default() },
            false,
        );
        meta.marker = SubPoolMarker::from_bits_truncate(marker);
        meta.effective_tip = tip;
        arena.insert(meta)
    }

    fn assert_back_indices(pool: &SubPool, arena: &Arena) {
        for (pos, &id) in pool.best.items.iter().enumerate() {
            assert_eq!(arena[id].best_index, pos as isize);
        }
        for (pos, &id) in pool.worst.items.iter().enumerate() {
            assert_eq!(arena[id].worst_index, pos as isize);
        }
    }

    #[test]
    fn best_and_worst_agree() {
        let mut arena = Arena::default();
        let mut pool = SubPool::new(SubPoolType::Pending);

        let low = insert(&mut arena, 0b10000, 1, 3);
        let mid = insert(&mut arena, 0b11100, 5, 2);
        let high = insert(&mut arena, 0b11110, 1, 1);
        for id in [mid, low, high] {
            pool.add(&mut arena, id);
        }

        assert_eq!(pool.best(), Some(high));
        assert_eq!(pool.worst(), Some(low));
        assert_back_indices(&pool, &arena);

        assert_eq!(pool.pop_best(&mut arena), Some(high));
        assert_eq!(arena[high].best_index, -1);
        assert_eq!(arena[high].worst_index, -1);
        assert_eq!(arena[high].current, None);
        assert_eq!(pool.len(), 2);
        assert_back_indices(&pool, &arena);

        assert_eq!(pool.pop_worst(&mut arena), Some(low));
        assert_eq!(pool.pop_worst(&mut arena), Some(mid));
        assert_eq!(pool.pop_worst(&mut arena), None);
    }

    #[test]
    fn unsafe_ops_then_enforce() {
        let mut arena = Arena::default();
        let mut pool = SubPool::new(SubPoolType::Queued);

        let ids: Vec<_> =
            (0..10).map(|i| insert(&mut arena, 0b10000, i as u64, i as u64)).collect();
        for &id in &ids {
            pool.unsafe_add(&mut arena, id);
        }
        pool.unsafe_remove(&mut arena, ids[4]);
        pool.unsafe_remove(&mut arena, ids[7]);
        pool.enforce_invariants(&mut arena);

        assert_eq!(pool.len(), 8);
        assert_back_indices(&pool, &arena);
        // highest tip survives as best, lowest as worst
        assert_eq!(pool.best(), Some(ids[9]));
        assert_eq!(pool.worst(), Some(ids[0]));
    }

    #[test]
    fn randomized_pop_order_is_sorted() {
        let mut rng = rand::thread_rng();
        let mut arena = Arena::default();
        let mut pool = SubPool::new(SubPoolType::BaseFee);

        let mut ids: Vec<_> = (0..200)
            .map(|_| {
                insert(
                    &mut arena,
                    *[0b10000u8, 0b11100, 0b11110, 0b11111].choose(&mut rng).unwrap(),
                    rng.gen_range(0..50),
                    rng.gen_range(0..20),
                )
            })
            .collect();
        ids.shuffle(&mut rng);
        for &id in &ids {
            pool.add(&mut arena, id);
        }
        assert_back_indices(&pool, &arena);

        let mut last: Option<MetaTxId> = None;
        while let Some(id) = pool.pop_best(&mut arena) {
            if let Some(prev) = last {
                assert_ne!(
                    arena[prev].prefer(&arena[id]),
                    std::cmp::Ordering::Less,
                    "pop_best must yield non-increasing priority"
                );
            }
            assert_back_indices(&pool, &arena);
            last = Some(id);
        }
    }
}
