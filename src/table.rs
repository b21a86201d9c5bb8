use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::node::{node_hash, Node};
use crate::reference::Ref;
use crate::utils::prime_gte;

/// Counters for the unique table.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct UniqueStats {
    /// Calls to `make_node`.
    pub access: u64,
    /// Chain links followed while probing.
    pub chain: u64,
    /// Probes that found an existing node.
    pub hit: u64,
    /// Probes that had to claim a new slot.
    pub miss: u64,
    /// Calls answered by `low == high`.
    pub trivial: u64,
}

/// Node arena with an embedded unique table.
///
/// Slot 0 and 1 hold the terminals. Every other slot is either a live node,
/// chained into `buckets[hash % size]` through `next`, or a dead slot on the
/// free list, also linked through `next`. Slot 0 doubles as the "end of
/// chain" marker in both lists since a terminal is never chained.
pub struct NodeTable {
    nodes: Vec<Node>,
    buckets: Vec<u32>,

    /// Head of the free list (0 when empty).
    free_pos: AtomicU32,
    /// Number of slots on the free list.
    free_num: AtomicU32,

    pub(crate) stats: UniqueStats,
}

impl NodeTable {
    /// Create a table with at least `capacity` slots, rounded up to a prime.
    pub fn new(capacity: usize) -> Self {
        let size = prime_gte(capacity.max(3));
        assert!(size < u32::MAX as usize, "Node table size exceeds the id space");

        let nodes = vec![Node::free(0); size];
        let mut table = Self {
            nodes,
            buckets: vec![0; size],
            free_pos: AtomicU32::new(0),
            free_num: AtomicU32::new(0),
            stats: UniqueStats::default(),
        };
        table.nodes[0] = Node::terminal(false, 0);
        table.nodes[1] = Node::terminal(true, 0);
        table.rehash();
        table
    }

    /// Total number of slots.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn free_num(&self) -> usize {
        self.free_num.load(Ordering::Acquire) as usize
    }

    pub fn has_free(&self) -> bool {
        self.free_pos.load(Ordering::Acquire) != 0
    }

    /// Number of slots in use, terminals included.
    pub fn live_num(&self) -> usize {
        self.size() - self.free_num()
    }

    pub fn node(&self, r: Ref) -> &Node {
        &self.nodes[r.index()]
    }

    pub fn node_mut(&mut self, r: Ref) -> &mut Node {
        &mut self.nodes[r.index()]
    }

    pub fn level(&self, r: Ref) -> u32 {
        self.nodes[r.index()].level
    }

    pub fn low(&self, r: Ref) -> Ref {
        self.nodes[r.index()].low
    }

    pub fn high(&self, r: Ref) -> Ref {
        self.nodes[r.index()].high
    }

    /// Whether `r` names a live slot.
    pub fn is_live(&self, r: Ref) -> bool {
        r.index() < self.nodes.len() && !self.nodes[r.index()].is_dead()
    }

    /// Whether `r` names a dead slot. Out-of-range ids count as dead.
    pub fn is_dead(&self, r: Ref) -> bool {
        !self.is_live(r)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Set the level of both terminals.
    pub fn set_terminal_level(&mut self, level: u32) {
        self.nodes[0].level = level;
        self.nodes[1].level = level;
    }

    fn bucket_of(&self, level: u32, low: Ref, high: Ref) -> usize {
        (node_hash(level, low, high) % self.nodes.len() as u64) as usize
    }

    /// Look up an existing node with the given triple.
    pub fn find(&mut self, level: u32, low: Ref, high: Ref) -> Option<Ref> {
        let bucket = self.bucket_of(level, low, high);
        let mut index = self.buckets[bucket];
        while index != 0 {
            let node = &self.nodes[index as usize];
            if node.level == level && node.low == low && node.high == high {
                self.stats.hit += 1;
                return Some(Ref::new(index));
            }
            index = node.next;
            self.stats.chain += 1;
        }
        None
    }

    /// Detach the head of the free list.
    ///
    /// The head is handed over with a compare-and-swap so that two
    /// allocators racing on the same list never claim the same slot.
    pub fn claim_free_slot(&self) -> Option<u32> {
        loop {
            let head = self.free_pos.load(Ordering::Acquire);
            if head == 0 {
                return None;
            }
            let next = self.nodes[head as usize].next;
            if self
                .free_pos
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.free_num.fetch_sub(1, Ordering::AcqRel);
                return Some(head);
            }
        }
    }

    /// Claim a free slot for `(level, low, high)` and chain it into its bucket.
    ///
    /// Returns `None` if the free list is empty. The caller must have
    /// checked with [`find`](Self::find) that no such node exists.
    pub fn insert(&mut self, level: u32, low: Ref, high: Ref) -> Option<Ref> {
        let index = self.claim_free_slot()?;
        let bucket = self.bucket_of(level, low, high);
        self.stats.miss += 1;
        self.nodes[index as usize] = Node {
            level,
            low,
            high,
            refcount: 0,
            next: self.buckets[bucket],
            mark: false,
        };
        self.buckets[bucket] = index;
        Some(Ref::new(index))
    }

    /// Rebuild every bucket chain and the free list from the slot contents.
    ///
    /// Slots are visited from the top down, so the free list comes out in
    /// ascending order and new nodes are packed towards the low end.
    pub fn rehash(&mut self) {
        let size = self.nodes.len() as u64;
        self.buckets.par_iter_mut().for_each(|b| *b = 0);
        let homes: Vec<u32> = self
            .nodes
            .par_iter()
            .map(|n| {
                if n.is_dead() {
                    u32::MAX
                } else {
                    (node_hash(n.level, n.low, n.high) % size) as u32
                }
            })
            .collect();

        let mut free_pos = 0;
        let mut free_num = 0;
        for index in (2..self.nodes.len()).rev() {
            let home = homes[index];
            if home == u32::MAX {
                self.nodes[index].next = free_pos;
                free_pos = index as u32;
                free_num += 1;
            } else {
                self.nodes[index].next = self.buckets[home as usize];
                self.buckets[home as usize] = index as u32;
            }
        }
        self.free_pos.store(free_pos, Ordering::Release);
        self.free_num.store(free_num, Ordering::Release);
    }

    /// Turn every unmarked live node into a dead slot and clear all marks.
    ///
    /// Returns the number of reclaimed slots. Chains are stale afterwards
    /// until [`rehash`](Self::rehash) runs.
    pub fn sweep(&mut self) -> usize {
        self.nodes[2..]
            .par_iter_mut()
            .map(|n| {
                if n.is_dead() {
                    0
                } else if n.mark {
                    n.mark = false;
                    0
                } else {
                    *n = Node::free(0);
                    1
                }
            })
            .sum()
    }

    /// Grow to `new_size` slots. New slots are dead and land on the free list.
    pub fn grow(&mut self, new_size: usize) {
        assert!(new_size > self.nodes.len(), "Node table never shrinks");
        assert!(new_size < u32::MAX as usize, "Node table size exceeds the id space");
        let old_size = self.nodes.len();
        self.nodes
            .par_extend((old_size..new_size).into_par_iter().map(|_| Node::free(0)));
        self.buckets.resize(new_size, 0);
        self.rehash();
    }
}

impl Index<Ref> for NodeTable {
    type Output = Node;

    fn index(&self, index: Ref) -> &Self::Output {
        self.node(index)
    }
}

impl IndexMut<Ref> for NodeTable {
    fn index_mut(&mut self, index: Ref) -> &mut Self::Output {
        self.node_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_new_table_is_prime_and_free() {
        let table = NodeTable::new(10);
        assert_eq!(table.size(), 11);
        assert_eq!(table.free_num(), 9);
        assert_eq!(table.live_num(), 2);
        assert!(table.is_live(Ref::ZERO));
        assert!(table.is_dead(Ref::new(2)));
        assert!(table.is_dead(Ref::new(100)));
    }

    #[test]
    fn test_insert_packs_from_low_end() {
        let mut table = NodeTable::new(10);
        let a = table.insert(0, Ref::ZERO, Ref::ONE).unwrap();
        let b = table.insert(1, Ref::ZERO, Ref::ONE).unwrap();
        assert_eq!(a, Ref::new(2));
        assert_eq!(b, Ref::new(3));
        assert_eq!(table.find(0, Ref::ZERO, Ref::ONE), Some(a));
        assert_eq!(table.find(1, Ref::ZERO, Ref::ONE), Some(b));
        assert_eq!(table.find(1, Ref::ONE, Ref::ZERO), None);
    }

    #[test]
    fn test_free_list_exhaustion() {
        let mut table = NodeTable::new(5);
        assert_eq!(table.size(), 5);
        for level in 0..3 {
            assert!(table.insert(level, Ref::ZERO, Ref::ONE).is_some());
        }
        assert!(!table.has_free());
        assert_eq!(table.insert(7, Ref::ZERO, Ref::ONE), None);
    }

    #[test]
    fn test_sweep_and_rehash() {
        let mut table = NodeTable::new(10);
        let a = table.insert(0, Ref::ZERO, Ref::ONE).unwrap();
        let b = table.insert(1, Ref::ZERO, Ref::ONE).unwrap();
        table[b].mark = true;

        assert_eq!(table.sweep(), 1);
        table.rehash();

        assert!(table.is_dead(a));
        assert!(table.is_live(b));
        assert!(!table[b].mark);
        assert_eq!(table.find(1, Ref::ZERO, Ref::ONE), Some(b));
        assert_eq!(table.find(0, Ref::ZERO, Ref::ONE), None);
        // The reclaimed slot is the lowest free one again.
        assert_eq!(table.claim_free_slot(), Some(a.get()));
    }

    #[test]
    fn test_grow_keeps_nodes() {
        let mut table = NodeTable::new(5);
        let a = table.insert(0, Ref::ZERO, Ref::ONE).unwrap();
        table.grow(13);
        assert_eq!(table.size(), 13);
        assert_eq!(table.free_num(), 13 - 3);
        assert_eq!(table.find(0, Ref::ZERO, Ref::ONE), Some(a));
    }
}
