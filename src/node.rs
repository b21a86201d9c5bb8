use crate::reference::Ref;
use crate::utils::{pairing3, MyHash};

/// Reference count that pins a node forever.
pub const MAX_REF: u32 = u32::MAX;

/// Fixed-shape node record.
///
/// `level`, `low` and `high` are written once when the slot is claimed and
/// never change while the node is alive. `next` is the unique-table chain
/// link for live nodes and the free-list link for dead ones.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub level: u32,
    pub low: Ref,
    pub high: Ref,
    pub refcount: u32,
    pub next: u32,
    pub mark: bool,
}

impl Node {
    /// A dead slot linked to `next` in the free list.
    pub const fn free(next: u32) -> Self {
        Self {
            level: 0,
            low: Ref::INVALID,
            high: Ref::INVALID,
            refcount: 0,
            next,
            mark: false,
        }
    }

    /// A pinned terminal.
    pub const fn terminal(value: bool, level: u32) -> Self {
        let r = Ref::from_bool(value);
        Self {
            level,
            low: r,
            high: r,
            refcount: MAX_REF,
            next: 0,
            mark: false,
        }
    }

    pub const fn is_dead(&self) -> bool {
        self.low.is_invalid()
    }

    pub fn inc_ref(&mut self) {
        if self.refcount != MAX_REF {
            self.refcount += 1;
        }
    }

    /// Returns `false` if the node held no reference.
    pub fn dec_ref(&mut self) -> bool {
        if self.refcount == MAX_REF {
            true
        } else if self.refcount > 0 {
            self.refcount -= 1;
            true
        } else {
            false
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        node_hash(self.level, self.low, self.high)
    }
}

/// Structural hash of a `(level, low, high)` triple.
pub fn node_hash(level: u32, low: Ref, high: Ref) -> u64 {
    pairing3(level as u64, low.get() as u64, high.get() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount_saturates() {
        let mut node = Node::free(0);
        node.low = Ref::ZERO;
        node.high = Ref::ONE;
        node.refcount = MAX_REF - 1;
        node.inc_ref();
        assert_eq!(node.refcount, MAX_REF);
        node.inc_ref();
        assert_eq!(node.refcount, MAX_REF);
        assert!(node.dec_ref());
        assert_eq!(node.refcount, MAX_REF);
    }

    #[test]
    fn test_dec_ref_underflow() {
        let mut node = Node::free(0);
        node.inc_ref();
        assert!(node.dec_ref());
        assert!(!node.dec_ref());
        assert_eq!(node.refcount, 0);
    }

    #[test]
    fn test_free_slot_is_dead() {
        assert!(Node::free(7).is_dead());
        assert!(!Node::terminal(true, 3).is_dead());
        assert_eq!(Node::terminal(true, 3).low, Ref::ONE);
    }
}
