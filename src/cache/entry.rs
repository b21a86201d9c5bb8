//! Keys stored in the operation caches.
//!
//! Each key keeps its full operand tuple, so a lookup detects both slot
//! collisions and entries that were written for a different operation.

use num_bigint::BigUint;

use crate::reference::Ref;
use crate::table::NodeTable;
use crate::utils::{pairing2, pairing3, pairing_slice, MyHash};

/// Liveness check used when cleaning caches after a collection.
pub trait Stale {
    /// Whether this key or value points at a slot that is now dead.
    fn is_stale(&self, table: &NodeTable) -> bool;
}

impl Stale for Ref {
    fn is_stale(&self, table: &NodeTable) -> bool {
        table.is_dead(*self)
    }
}

impl Stale for BigUint {
    fn is_stale(&self, _table: &NodeTable) -> bool {
        false
    }
}

/// Key of the fixed-arity caches: up to three operand nodes and a tag.
///
/// Unused operands are filled with [`Ref::ZERO`], which never dies.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OpKey {
    pub a: Ref,
    pub b: Ref,
    pub c: Ref,
    pub tag: u64,
}

impl OpKey {
    pub fn unary(a: Ref, tag: u64) -> Self {
        Self {
            a,
            b: Ref::ZERO,
            c: Ref::ZERO,
            tag,
        }
    }

    pub fn binary(a: Ref, b: Ref, tag: u64) -> Self {
        Self {
            a,
            b,
            c: Ref::ZERO,
            tag,
        }
    }

    pub fn ternary(a: Ref, b: Ref, c: Ref, tag: u64) -> Self {
        Self { a, b, c, tag }
    }
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        pairing2(
            pairing3(self.a.get() as u64, self.b.get() as u64, self.c.get() as u64),
            self.tag,
        )
    }
}

impl Stale for OpKey {
    fn is_stale(&self, table: &NodeTable) -> bool {
        table.is_dead(self.a) || table.is_dead(self.b) || table.is_dead(self.c)
    }
}

/// Key of the variadic cache: an operator tag and a sorted, de-duplicated operand list.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MultiOpKey {
    pub op: u32,
    pub operands: Vec<Ref>,
}

impl MyHash for MultiOpKey {
    fn hash(&self) -> u64 {
        self.operands
            .iter()
            .fold(self.op as u64, |acc, r| pairing2(acc, r.get() as u64))
    }
}

impl Stale for MultiOpKey {
    fn is_stale(&self, table: &NodeTable) -> bool {
        self.operands.iter().any(|&r| table.is_dead(r))
    }
}

/// Key of the counting cache: the root node and which count it is.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CountKey {
    pub node: Ref,
    pub tag: u32,
}

impl MyHash for CountKey {
    fn hash(&self) -> u64 {
        pairing_slice(self.tag as u64, &[self.node.get()])
    }
}

impl Stale for CountKey {
    fn is_stale(&self, table: &NodeTable) -> bool {
        table.is_dead(self.node)
    }
}
