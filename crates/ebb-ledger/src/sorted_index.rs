//! Ordered set of block heights kept as a doubly linked list in a map.
//!
//! Each key is its own node identity; a node stores only its neighbours.
//! Head and tail are `Option`s, so no height is reserved as a sentinel and
//! block 0 is an ordinary key.
//!
//! Appends at either end are O(1). Interior inserts scan forward from the
//! head; heights arrive nearly in order, so almost every insert lands on the
//! tail. Removal given a key is O(1). Nothing here
//! fails; operations on absent keys are no-ops and report that through their
//! return value.

use std::collections::HashMap;

use tracing::trace;

use ebb_core::types::BlockHeight;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Link {
    prev: Option<BlockHeight>,
    next: Option<BlockHeight>,
}

/// Ascending set of block heights with O(1) removal by key.
#[derive(Clone, Debug, Default)]
pub struct SortedBlockIndex {
    links: HashMap<BlockHeight, Link>,
    head: Option<BlockHeight>,
    tail: Option<BlockHeight>,
}

impl SortedBlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Smallest key.
    pub fn head(&self) -> Option<BlockHeight> {
        self.head
    }

    /// Largest key.
    pub fn tail(&self) -> Option<BlockHeight> {
        self.tail
    }

    pub fn contains(&self, key: BlockHeight) -> bool {
        self.links.contains_key(&key)
    }

    /// Successor of `key`, or `None` at the tail or for an absent key.
    pub fn next(&self, key: BlockHeight) -> Option<BlockHeight> {
        self.links.get(&key).and_then(|l| l.next)
    }

    /// Predecessor of `key`, or `None` at the head or for an absent key.
    pub fn prev(&self, key: BlockHeight) -> Option<BlockHeight> {
        self.links.get(&key).and_then(|l| l.prev)
    }

    /// Insert `key`. Returns `false` if it was already present.
    pub fn insert(&mut self, key: BlockHeight) -> bool {
        if self.contains(key) {
            return false;
        }

        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            self.links.insert(key, Link::default());
            self.head = Some(key);
            self.tail = Some(key);
            return true;
        };

        if key < head {
            self.links.insert(
                key,
                Link {
                    prev: None,
                    next: Some(head),
                },
            );
            self.set_prev(head, Some(key));
            self.head = Some(key);
        } else if key > tail {
            self.links.insert(
                key,
                Link {
                    prev: Some(tail),
                    next: None,
                },
            );
            self.set_next(tail, Some(key));
            self.tail = Some(key);
        } else {
            // head < key < tail, so the scan always stops on a real node.
            let mut successor = head;
            let mut steps = 0usize;
            while successor < key {
                match self.next(successor) {
                    Some(n) => successor = n,
                    None => break,
                }
                steps += 1;
            }
            trace!(key, successor, steps, "interior insert");
            let predecessor = self.prev(successor);
            self.links.insert(
                key,
                Link {
                    prev: predecessor,
                    next: Some(successor),
                },
            );
            self.set_prev(successor, Some(key));
            match predecessor {
                Some(p) => self.set_next(p, Some(key)),
                None => self.head = Some(key),
            }
        }
        true
    }

    /// Unlink `key`. Returns `false` (and changes nothing) if absent.
    pub fn remove(&mut self, key: BlockHeight) -> bool {
        let Some(link) = self.links.remove(&key) else {
            return false;
        };
        match link.prev {
            Some(p) => self.set_next(p, link.next),
            None => self.head = link.next,
        }
        match link.next {
            Some(n) => self.set_prev(n, link.prev),
            None => self.tail = link.prev,
        }
        true
    }

    /// Drop every key smaller than `cutoff`, making `cutoff` the new head.
    ///
    /// No-op if `cutoff` is not in the set. Returns the removed keys in
    /// ascending order.
    pub fn shrink(&mut self, cutoff: BlockHeight) -> Vec<BlockHeight> {
        if !self.contains(cutoff) {
            return Vec::new();
        }
        let mut removed = Vec::new();
        let mut cursor = self.head;
        while let Some(key) = cursor {
            if key == cutoff {
                break;
            }
            cursor = self.next(key);
            self.links.remove(&key);
            removed.push(key);
        }
        self.set_prev(cutoff, None);
        self.head = Some(cutoff);
        if !removed.is_empty() {
            trace!(cutoff, removed = removed.len(), "index shrunk");
        }
        removed
    }

    /// Ascending iterator over all keys.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            cursor: self.head,
        }
    }

    /// Ascending iterator starting at `key` (empty if `key` is absent).
    pub fn iter_from(&self, key: BlockHeight) -> Iter<'_> {
        Iter {
            index: self,
            cursor: self.contains(key).then_some(key),
        }
    }

    /// All keys in ascending order. Linear in the size of the set.
    pub fn to_vec(&self) -> Vec<BlockHeight> {
        self.iter().collect()
    }

    fn set_prev(&mut self, key: BlockHeight, prev: Option<BlockHeight>) {
        if let Some(link) = self.links.get_mut(&key) {
            link.prev = prev;
        }
    }

    fn set_next(&mut self, key: BlockHeight, next: Option<BlockHeight>) {
        if let Some(link) = self.links.get_mut(&key) {
            link.next = next;
        }
    }
}

/// Ascending iterator over a [`SortedBlockIndex`].
pub struct Iter<'a> {
    index: &'a SortedBlockIndex,
    cursor: Option<BlockHeight>,
}

impl Iterator for Iter<'_> {
    type Item = BlockHeight;

    fn next(&mut self) -> Option<BlockHeight> {
        let key = self.cursor?;
        self.cursor = self.index.next(key);
        Some(key)
    }
}

impl<'a> IntoIterator for &'a SortedBlockIndex {
    type Item = BlockHeight;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn index_of(keys: &[BlockHeight]) -> SortedBlockIndex {
        let mut idx = SortedBlockIndex::new();
        for &k in keys {
            idx.insert(k);
        }
        idx
    }

    /// Walk both directions and check every link agrees with the order.
    fn assert_links_consistent(idx: &SortedBlockIndex) {
        let forward = idx.to_vec();
        assert_eq!(forward.len(), idx.len());
        assert!(forward.windows(2).all(|w| w[0] < w[1]));
        let mut backward = Vec::new();
        let mut cursor = idx.tail();
        while let Some(k) = cursor {
            backward.push(k);
            cursor = idx.prev(k);
        }
        backward.reverse();
        assert_eq!(forward, backward);
        assert_eq!(idx.head(), forward.first().copied());
        assert_eq!(idx.tail(), forward.last().copied());
    }

    // --- insert ---

    #[test]
    fn insert_out_of_order_sorts() {
        let idx = index_of(&[10, 3, 7]);
        assert_eq!(idx.to_vec(), vec![3, 7, 10]);
        assert_links_consistent(&idx);
    }

    #[test]
    fn insert_into_empty_sets_head_and_tail() {
        let idx = index_of(&[5]);
        assert_eq!(idx.head(), Some(5));
        assert_eq!(idx.tail(), Some(5));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn insert_zero_is_a_real_key() {
        let idx = index_of(&[4, 0]);
        assert!(idx.contains(0));
        assert_eq!(idx.head(), Some(0));
        assert_eq!(idx.to_vec(), vec![0, 4]);
    }

    #[test]
    fn insert_duplicate_is_noop() {
        let mut idx = index_of(&[1, 2, 3]);
        assert!(!idx.insert(2));
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn insert_interior_many() {
        let idx = index_of(&[100, 0, 50, 25, 75, 60, 10, 90]);
        assert_eq!(idx.to_vec(), vec![0, 10, 25, 50, 60, 75, 90, 100]);
        assert_links_consistent(&idx);
    }

    // --- remove ---

    #[test]
    fn remove_head_middle_tail() {
        let mut idx = index_of(&[1, 2, 3, 4, 5]);
        assert!(idx.remove(1));
        assert!(idx.remove(3));
        assert!(idx.remove(5));
        assert_eq!(idx.to_vec(), vec![2, 4]);
        assert_links_consistent(&idx);
    }

    #[test]
    fn remove_only_key_empties() {
        let mut idx = index_of(&[9]);
        assert!(idx.remove(9));
        assert!(idx.is_empty());
        assert_eq!(idx.head(), None);
        assert_eq!(idx.tail(), None);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut idx = index_of(&[1, 2]);
        assert!(!idx.remove(7));
        assert_eq!(idx.to_vec(), vec![1, 2]);
        let mut empty = SortedBlockIndex::new();
        assert!(!empty.remove(0));
    }

    #[test]
    fn remove_twice_same_as_once() {
        let mut once = index_of(&[1, 2, 3]);
        let mut twice = once.clone();
        once.remove(2);
        twice.remove(2);
        twice.remove(2);
        assert_eq!(once.to_vec(), twice.to_vec());
    }

    // --- shrink ---

    #[test]
    fn shrink_drops_older_keys() {
        let mut idx = index_of(&[1, 3, 5, 7, 9]);
        assert_eq!(idx.shrink(5), vec![1, 3]);
        assert_eq!(idx.to_vec(), vec![5, 7, 9]);
        assert_eq!(idx.head(), Some(5));
        assert_eq!(idx.prev(5), None);
        assert_links_consistent(&idx);
    }

    #[test]
    fn shrink_absent_cutoff_is_noop() {
        let mut idx = index_of(&[1, 3, 5]);
        assert!(idx.shrink(4).is_empty());
        assert_eq!(idx.to_vec(), vec![1, 3, 5]);
    }

    #[test]
    fn shrink_at_head_removes_nothing() {
        let mut idx = index_of(&[1, 3]);
        assert!(idx.shrink(1).is_empty());
        assert_eq!(idx.to_vec(), vec![1, 3]);
    }

    #[test]
    fn shrink_to_tail_leaves_one() {
        let mut idx = index_of(&[1, 3, 5]);
        assert_eq!(idx.shrink(5), vec![1, 3]);
        assert_eq!(idx.to_vec(), vec![5]);
        assert_eq!(idx.tail(), Some(5));
    }

    #[test]
    fn shrink_twice_same_as_once() {
        let mut idx = index_of(&[2, 4, 6]);
        idx.shrink(4);
        let after_once = idx.to_vec();
        assert!(idx.shrink(4).is_empty());
        assert_eq!(idx.to_vec(), after_once);
    }

    // --- iteration ---

    #[test]
    fn iter_from_starts_at_key() {
        let idx = index_of(&[1, 2, 3, 4]);
        assert_eq!(idx.iter_from(3).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(idx.iter_from(9).count(), 0);
    }

    #[test]
    fn next_and_prev_of_absent_are_none() {
        let idx = index_of(&[1, 2]);
        assert_eq!(idx.next(5), None);
        assert_eq!(idx.prev(5), None);
        assert_eq!(idx.next(1), Some(2));
        assert_eq!(idx.prev(2), Some(1));
    }

    // --- proptest ---

    #[derive(Clone, Debug)]
    enum Op {
        Insert(BlockHeight),
        Remove(BlockHeight),
        Shrink(BlockHeight),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u64..64).prop_map(Op::Insert),
            2 => (0u64..64).prop_map(Op::Remove),
            1 => (0u64..64).prop_map(Op::Shrink),
        ]
    }

    proptest! {
        #[test]
        fn matches_btreeset_model(ops in prop::collection::vec(op(), 0..200)) {
            let mut idx = SortedBlockIndex::new();
            let mut model = BTreeSet::new();
            for op in ops {
                match op {
                    Op::Insert(k) => {
                        prop_assert_eq!(idx.insert(k), model.insert(k));
                    }
                    Op::Remove(k) => {
                        prop_assert_eq!(idx.remove(k), model.remove(&k));
                    }
                    Op::Shrink(k) => {
                        let removed = idx.shrink(k);
                        if model.contains(&k) {
                            let expected: Vec<_> = model.range(..k).copied().collect();
                            prop_assert_eq!(&removed, &expected);
                            model = model.split_off(&k);
                        } else {
                            prop_assert!(removed.is_empty());
                        }
                    }
                }
                let keys = idx.to_vec();
                prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(keys, model.iter().copied().collect::<Vec<_>>());
            }
            assert_links_consistent(&idx);
        }
    }
}
