//! The BDD manager: owner of the node table, caches and variable order.
//!
//! A [`BddManager`] serializes every operation behind one lock. Handles
//! ([`Bdd`]) borrow the manager and keep their node alive through its
//! reference count until they are dropped.
//!
//! ```
//! use netbdd::manager::BddManager;
//!
//! let mgr = BddManager::init(1000, 1000);
//! mgr.set_var_num(3).unwrap();
//! let x0 = mgr.ith_var(0).unwrap();
//! let x1 = mgr.ith_var(1).unwrap();
//! let f = x0.and(&x1).unwrap();
//! assert_eq!(f.sat_count().unwrap(), 2u32.into());
//! ```

use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::bdd::Bdd;
use crate::config::BddConfig;
use crate::error::{BddError, Result};
use crate::kernel::{GcStats, Kernel};
use crate::ops::BddOp;
use crate::pairing::Pairing;
use crate::reference::Ref;
use crate::types::{Level, Var};

pub struct BddManager {
    kernel: Mutex<Kernel>,
    made: AtomicU64,
    freed: AtomicU64,
}

impl BddManager {
    /// Create a manager with the given initial node table and cache sizes.
    pub fn init(node_capacity: usize, cache_capacity: usize) -> Self {
        Self::with_config(
            BddConfig::default()
                .with_node_capacity(node_capacity)
                .with_cache_capacity(cache_capacity),
        )
    }

    pub fn with_config(config: BddConfig) -> Self {
        Self {
            kernel: Mutex::new(Kernel::new(config)),
            made: AtomicU64::new(0),
            freed: AtomicU64::new(0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Kernel> {
        self.kernel.lock()
    }

    /// Run one top-level operation on the kernel.
    pub(crate) fn with_kernel<T>(&self, op: impl FnOnce(&mut Kernel) -> Result<T>) -> Result<T> {
        self.lock().run(op)
    }

    /// Read-only access that never fails.
    pub(crate) fn inspect<T>(&self, f: impl FnOnce(&Kernel) -> T) -> T {
        f(&self.lock())
    }

    /// Run `op` and wrap its result in a new handle.
    pub(crate) fn build(&self, op: impl FnOnce(&mut Kernel) -> Result<Ref>) -> Result<Bdd<'_>> {
        let mut kernel = self.lock();
        let r = kernel.run(op)?;
        kernel.addref(r);
        drop(kernel);
        Ok(self.wrap(r))
    }

    /// Wrap a node whose reference was already taken.
    pub(crate) fn wrap(&self, r: Ref) -> Bdd<'_> {
        self.made.fetch_add(1, Ordering::Relaxed);
        Bdd::from_raw(self, r)
    }

    pub(crate) fn retain(&self, r: Ref) {
        self.lock().addref(r);
    }

    pub(crate) fn release(&self, r: Ref) {
        self.freed.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.lock().delref(r) {
            warn!("Releasing {} failed: {}", r, err);
        }
    }

    /// Fails with `IllegalBdd` unless `bdd` belongs to this manager.
    pub(crate) fn check_owner(&self, bdd: &Bdd<'_>) -> Result<()> {
        if ptr::eq(self, bdd.manager()) {
            Ok(())
        } else {
            Err(BddError::IllegalBdd { node: bdd.id() })
        }
    }

    fn nodes_of(&self, bdds: &[Bdd<'_>]) -> Result<Vec<Ref>> {
        bdds.iter()
            .map(|b| self.check_owner(b).map(|_| b.node()))
            .collect()
    }

    // ─── Variables ──────────────────────────────────────────────────────────

    /// Declare `num` variables. The count can grow but never shrink.
    pub fn set_var_num(&self, num: u32) -> Result<()> {
        self.lock().set_var_num(num)
    }

    /// Declare `extra` more variables, returning the index of the first one.
    pub fn ext_var_num(&self, extra: u32) -> Result<u32> {
        let mut kernel = self.lock();
        let old = kernel.var_num();
        let num = old.checked_add(extra).ok_or(BddError::Range {
            what: "variable count",
            value: old as i64 + extra as i64,
        })?;
        kernel.set_var_num(num)?;
        Ok(old)
    }

    pub fn var_num(&self) -> u32 {
        self.inspect(|k| k.var_num())
    }

    pub fn level2var(&self, level: Level) -> Result<Var> {
        self.inspect(|k| k.checked_level2var(level))
    }

    pub fn var2level(&self, var: Var) -> Result<Level> {
        self.inspect(|k| k.checked_var2level(var))
    }

    // ─── Tuning ─────────────────────────────────────────────────────────────

    /// Set the node/cache ratio used after table growth. Returns the old ratio.
    pub fn set_cache_ratio(&self, ratio: usize) -> usize {
        let mut kernel = self.lock();
        std::mem::replace(&mut kernel.config.cache_ratio, ratio)
    }

    /// Set the free-slot percentage below which collection triggers growth.
    /// Returns the old value.
    pub fn set_min_free_nodes(&self, percent: usize) -> Result<usize> {
        if percent > 100 {
            return Err(BddError::Range {
                what: "min free nodes",
                value: percent as i64,
            });
        }
        let mut kernel = self.lock();
        Ok(std::mem::replace(&mut kernel.config.min_free_nodes, percent))
    }

    /// Returns the old factor.
    pub fn set_increase_factor(&self, factor: usize) -> usize {
        let mut kernel = self.lock();
        std::mem::replace(&mut kernel.config.increase_factor, factor)
    }

    /// Bound the node table size; 0 removes the bound. Returns the old bound.
    pub fn set_max_node_num(&self, size: usize) -> usize {
        let mut kernel = self.lock();
        std::mem::replace(&mut kernel.config.max_node_capacity, size)
    }

    /// Grow the node table to at least `size` slots. Returns the old size.
    pub fn set_node_table_size(&self, size: usize) -> usize {
        self.lock().set_node_table_size(size)
    }

    /// Resize every operation cache. Returns the old size.
    pub fn set_cache_size(&self, size: usize) -> usize {
        let mut kernel = self.lock();
        let old = kernel.caches.size();
        kernel.caches.resize(size);
        old
    }

    // ─── Constants and variables ────────────────────────────────────────────

    pub fn zero(&self) -> Bdd<'_> {
        self.wrap(Ref::ZERO)
    }

    pub fn one(&self) -> Bdd<'_> {
        self.wrap(Ref::ONE)
    }

    pub fn constant(&self, value: bool) -> Bdd<'_> {
        self.wrap(Ref::from_bool(value))
    }

    /// The function that is true exactly when `var` is.
    pub fn ith_var(&self, var: u32) -> Result<Bdd<'_>> {
        self.build(|k| k.ith_var(var))
    }

    /// The function that is true exactly when `var` is false.
    pub fn nith_var(&self, var: u32) -> Result<Bdd<'_>> {
        self.build(|k| k.nith_var(var))
    }

    /// The positive cube of `vars`, usable as a variable set.
    pub fn make_set(&self, vars: &[u32]) -> Result<Bdd<'_>> {
        self.build(|k| k.make_set(vars))
    }

    // ─── Variadic operations ────────────────────────────────────────────────

    /// Conjunction of all `operands`; TRUE for an empty slice.
    pub fn and_all(&self, operands: &[Bdd<'_>]) -> Result<Bdd<'_>> {
        let nodes = self.nodes_of(operands)?;
        self.build(|k| {
            nodes.iter().try_for_each(|&r| k.check(r))?;
            k.all_of(BddOp::And, &nodes)
        })
    }

    /// Disjunction of all `operands`; FALSE for an empty slice.
    pub fn or_all(&self, operands: &[Bdd<'_>]) -> Result<Bdd<'_>> {
        let nodes = self.nodes_of(operands)?;
        self.build(|k| {
            nodes.iter().try_for_each(|&r| k.check(r))?;
            k.all_of(BddOp::Or, &nodes)
        })
    }

    /// A new identity pairing.
    pub fn make_pair(&self) -> Pairing<'_> {
        let slot = self.lock().make_pairing();
        Pairing::new(self, slot)
    }

    /// A pairing substituting each `new` for its `old`.
    pub fn make_pair_from(&self, pairs: &[(u32, u32)]) -> Result<Pairing<'_>> {
        let mut pairing = self.make_pair();
        pairing.set_pairs(pairs)?;
        Ok(pairing)
    }

    // ─── Statistics ─────────────────────────────────────────────────────────

    /// Number of live nodes, terminals included.
    pub fn node_num(&self) -> usize {
        self.inspect(|k| k.table.live_num())
    }

    pub fn node_table_size(&self) -> usize {
        self.inspect(|k| k.table.size())
    }

    pub fn cache_size(&self) -> usize {
        self.inspect(|k| k.caches.size())
    }

    pub fn gc_count(&self) -> u64 {
        self.inspect(|k| k.gc_stats.collections)
    }

    pub fn gc_stats(&self) -> GcStats {
        self.inspect(|k| k.gc_stats)
    }

    /// Handles created so far.
    pub fn made_bdds(&self) -> u64 {
        self.made.load(Ordering::Relaxed)
    }

    /// Handles dropped so far.
    pub fn freed_bdds(&self) -> u64 {
        self.freed.load(Ordering::Relaxed)
    }

    /// Handles currently alive.
    pub fn outstanding_bdds(&self) -> u64 {
        self.made_bdds() - self.freed_bdds()
    }

    /// Number of distinct internal nodes shared by all `bdds`.
    pub fn node_count_all(&self, bdds: &[Bdd<'_>]) -> Result<usize> {
        let nodes = self.nodes_of(bdds)?;
        self.with_kernel(|k| {
            nodes.iter().try_for_each(|&r| k.check(r))?;
            Ok(k.node_count_all(&nodes))
        })
    }

    /// Force a garbage collection.
    pub fn collect_garbage(&self) {
        let mut kernel = self.lock();
        kernel.gc();
        debug!("Manual collection left {} live nodes", kernel.table.live_num());
    }

    /// Whether an exhausted node table made the manager unusable.
    pub fn is_failed(&self) -> bool {
        self.inspect(|k| k.ensure_usable().is_err())
    }
}

impl Default for BddManager {
    fn default() -> Self {
        Self::with_config(BddConfig::default())
    }
}

impl std::fmt::Debug for BddManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kernel = self.lock();
        f.debug_struct("BddManager")
            .field("var_num", &kernel.var_num())
            .field("nodes", &kernel.table.live_num())
            .field("capacity", &kernel.table.size())
            .field("cache_size", &kernel.caches.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_var_num_grows_only() {
        let mgr = BddManager::init(100, 100);
        mgr.set_var_num(4).unwrap();
        assert_eq!(mgr.var_num(), 4);
        assert_eq!(mgr.ext_var_num(2).unwrap(), 4);
        assert_eq!(mgr.var_num(), 6);
        assert!(matches!(
            mgr.set_var_num(3),
            Err(BddError::DecreaseVarNum { current: 6, requested: 3 })
        ));
        assert_eq!(mgr.var2level(Var::new(5)).unwrap(), Level::new(5));
        assert!(mgr.level2var(Level::new(6)).is_err());
    }

    #[test]
    fn test_setters_return_previous_values() {
        let mgr = BddManager::default();
        assert_eq!(mgr.set_cache_ratio(4), 0);
        assert_eq!(mgr.set_cache_ratio(2), 4);
        assert_eq!(mgr.set_min_free_nodes(30).unwrap(), 20);
        assert!(mgr.set_min_free_nodes(101).is_err());
        assert_eq!(mgr.set_increase_factor(0), 1);
        assert_eq!(mgr.set_max_node_num(5000), 0);

        assert_eq!(mgr.set_cache_size(50), 1009);
        assert_eq!(mgr.cache_size(), 53);

        // Growing the table also resizes the caches by the ratio.
        let old = mgr.set_node_table_size(4000);
        assert_eq!(old, 1009);
        assert_eq!(mgr.node_table_size(), 4001);
        assert_eq!(mgr.cache_size(), 2003);
    }

    #[test]
    fn test_handles_are_counted() {
        let mgr = BddManager::init(100, 100);
        mgr.set_var_num(2).unwrap();
        {
            let x = mgr.ith_var(0).unwrap();
            let _y = x.clone();
            assert_eq!(mgr.outstanding_bdds(), 2);
        }
        assert_eq!(mgr.outstanding_bdds(), 0);
        assert_eq!(mgr.made_bdds(), 2);
    }

    #[test]
    fn test_foreign_handles_are_rejected() {
        let a = BddManager::init(100, 100);
        let b = BddManager::init(100, 100);
        a.set_var_num(2).unwrap();
        b.set_var_num(2).unwrap();
        let x = a.ith_var(0).unwrap();
        let y = b.ith_var(1).unwrap();
        assert!(matches!(x.and(&y), Err(BddError::IllegalBdd { .. })));
        assert!(a.and_all(&[x, y]).is_err());
    }

    #[test]
    fn test_and_all_or_all_empty() {
        let mgr = BddManager::init(100, 100);
        mgr.set_var_num(2).unwrap();
        assert!(mgr.and_all(&[]).unwrap().is_one());
        assert!(mgr.or_all(&[]).unwrap().is_zero());
    }
}
