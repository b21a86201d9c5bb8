//! Operation caches.
//!
//! Every recursive algorithm memoizes into one of seven direct-mapped caches:
//!
//! | Cache     | Key                              | Used by |
//! |-----------|----------------------------------|---------|
//! | `apply`   | `(l, r, op)`                     | binary apply, not, and/diff satisfiability |
//! | `quant`   | `(r, varset, kind)`              | exist, forall, project, tests-vars |
//! | `appex`   | `(l, r, varset, op/kind)`        | appex, appall, relprod |
//! | `replace` | `(r, pairing-id, kind)`          | replace, correctify, transform |
//! | `misc`    | `(r, cube, kind)`                | restrict |
//! | `multiop` | `(op, sorted operands)`          | and-all, or-all, ite |
//! | `count`   | `(r, kind)` → `BigUint`          | sat count, path count |
//!
//! After a collection every cache is either *cleaned* (entries touching a
//! dead node are dropped) or *reset*, depending on the configured policy.
//! The seven clean passes run in parallel.

mod direct_mapped;
mod entry;

use log::debug;
use num_bigint::BigUint;

pub use direct_mapped::{CacheCounters, DirectMappedCache};
pub use entry::{CountKey, MultiOpKey, OpKey, Stale};

use crate::reference::Ref;
use crate::table::NodeTable;

pub type OpCache = DirectMappedCache<OpKey, Ref>;
pub type MultiOpCache = DirectMappedCache<MultiOpKey, Ref>;
pub type CountCache = DirectMappedCache<CountKey, BigUint>;

impl<K, V> DirectMappedCache<K, V>
where
    K: Stale + Send + Sync,
    V: Stale + Send + Sync,
{
    /// Drops every entry whose key or value references a dead node.
    pub fn clean(&mut self, table: &NodeTable) {
        self.retain(|k, v| !k.is_stale(table) && !v.is_stale(table));
    }
}

/// The seven operation caches of one manager.
pub struct OperatorCaches {
    pub apply: OpCache,
    pub quant: OpCache,
    pub appex: OpCache,
    pub replace: OpCache,
    pub misc: OpCache,
    pub multiop: MultiOpCache,
    pub count: CountCache,
}

impl OperatorCaches {
    pub fn new(size: usize) -> Self {
        Self {
            apply: OpCache::new(size),
            quant: OpCache::new(size),
            appex: OpCache::new(size),
            replace: OpCache::new(size),
            misc: OpCache::new(size),
            multiop: MultiOpCache::new(size),
            count: CountCache::new(size),
        }
    }

    /// Current size of each cache (they are always sized alike).
    pub fn size(&self) -> usize {
        self.apply.capacity()
    }

    pub fn reset(&mut self) {
        let Self {
            apply,
            quant,
            appex,
            replace,
            misc,
            multiop,
            count,
        } = self;
        rayon::scope(|s| {
            s.spawn(move |_| apply.reset());
            s.spawn(move |_| quant.reset());
            s.spawn(move |_| appex.reset());
            s.spawn(move |_| replace.reset());
            s.spawn(move |_| misc.reset());
            s.spawn(move |_| multiop.reset());
            s.spawn(move |_| count.reset());
        });
    }

    pub fn clean(&mut self, table: &NodeTable) {
        let Self {
            apply,
            quant,
            appex,
            replace,
            misc,
            multiop,
            count,
        } = self;
        rayon::scope(|s| {
            s.spawn(move |_| apply.clean(table));
            s.spawn(move |_| quant.clean(table));
            s.spawn(move |_| appex.clean(table));
            s.spawn(move |_| replace.clean(table));
            s.spawn(move |_| misc.clean(table));
            s.spawn(move |_| multiop.clean(table));
            s.spawn(move |_| count.clean(table));
        });
    }

    /// Resize every cache to at least `size` slots.
    pub fn resize(&mut self, size: usize) {
        let old = self.size();
        self.apply.resize(size);
        self.quant.resize(size);
        self.appex.resize(size);
        self.replace.resize(size);
        self.misc.resize(size);
        self.multiop.resize(size);
        self.count.resize(size);
        debug!("Resized operation caches from {} to {}", old, self.size());
    }

    /// Summed counters over all caches.
    pub fn counters(&self) -> CacheCounters {
        let mut total = self.apply.counters();
        total += self.quant.counters();
        total += self.appex.counters();
        total += self.replace.counters();
        total += self.misc.counters();
        total += self.multiop.counters();
        total += self.count.counters();
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_clean_drops_entries_touching_dead_nodes() {
        let mut table = NodeTable::new(10);
        let a = table.insert(0, Ref::ZERO, Ref::ONE).unwrap();
        let b = table.insert(1, Ref::ZERO, Ref::ONE).unwrap();

        let mut caches = OperatorCaches::new(31);
        caches.apply.insert(OpKey::binary(a, b, 0), a);
        caches.quant.insert(OpKey::unary(a, 0), Ref::ONE);
        caches.multiop.insert(MultiOpKey { op: 0, operands: vec![a, b] }, b);
        caches.count.insert(CountKey { node: b, tag: 2 }, BigUint::from(4u32));

        // Kill `b`: only `a` survives the sweep.
        table[a].mark = true;
        table.sweep();
        table.rehash();
        caches.clean(&table);

        assert_eq!(caches.apply.get(&OpKey::binary(a, b, 0)), None);
        assert_eq!(caches.quant.get(&OpKey::unary(a, 0)), Some(&Ref::ONE));
        assert!(caches.multiop.is_empty());
        assert!(caches.count.is_empty());
    }

    #[test]
    fn test_resize_and_reset() {
        let mut caches = OperatorCaches::new(10);
        assert_eq!(caches.size(), 11);
        caches.replace.insert(OpKey::unary(Ref::new(7), 3), Ref::ONE);
        caches.resize(50);
        assert_eq!(caches.size(), 53);
        assert_eq!(caches.replace.len(), 1);
        caches.reset();
        assert!(caches.replace.is_empty());
    }
}
