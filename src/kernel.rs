//! Engine core shared by every algorithm.
//!
//! The kernel owns the node table, the operation caches, the variable
//! order and the transient root stack. All recursive algorithms are
//! `impl Kernel` blocks taking `&mut self`, so a top-level call holds the
//! whole engine exclusively until it finishes.

use log::{debug, trace};

use crate::cache::OperatorCaches;
use crate::config::BddConfig;
use crate::error::{BddError, Result};
use crate::node::MAX_REF;
use crate::ops::quant::VarSetTable;
use crate::pairing::PairRegistry;
use crate::reference::Ref;
use crate::table::NodeTable;
use crate::types::{Level, Var};

/// Largest number of variables a manager accepts.
pub const MAX_VAR: u32 = 0x1F_FFFF;

/// Garbage collection counters.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct GcStats {
    /// Completed collections.
    pub collections: u64,
    /// Slots reclaimed over all collections.
    pub freed: u64,
    /// Time spent collecting, in seconds.
    pub gc_time: f64,
    /// Node table growths.
    pub resizes: u64,
    /// Time spent growing the node table, in seconds.
    pub resize_time: f64,
}

pub(crate) struct Kernel {
    pub(crate) table: NodeTable,
    pub(crate) caches: OperatorCaches,
    pub(crate) config: BddConfig,

    var_num: u32,
    /// `vars[2 * v]` is the node for `v`, `vars[2 * v + 1]` for `!v`.
    vars: Vec<Ref>,
    level2var: Vec<u32>,
    var2level: Vec<u32>,

    /// Intermediate results that must survive a collection.
    ref_stack: Vec<Ref>,

    pub(crate) varsets: VarSetTable,
    pub(crate) pairs: PairRegistry,

    /// Set when the node table grew during the current operation.
    pub(crate) resized: bool,
    /// Fatal error latched by resource exhaustion.
    failed: Option<BddError>,
    pub(crate) gc_stats: GcStats,
}

impl Kernel {
    pub fn new(config: BddConfig) -> Self {
        let table = NodeTable::new(config.node_capacity);
        let caches = OperatorCaches::new(config.cache_capacity);
        debug!(
            "Initialized kernel with {} nodes and {} cache entries",
            table.size(),
            caches.size()
        );
        Self {
            table,
            caches,
            config,
            var_num: 0,
            vars: Vec::new(),
            level2var: Vec::new(),
            var2level: Vec::new(),
            ref_stack: Vec::new(),
            varsets: VarSetTable::default(),
            pairs: PairRegistry::default(),
            resized: false,
            failed: None,
            gc_stats: GcStats::default(),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn var_num(&self) -> u32 {
        self.var_num
    }

    pub fn level(&self, r: Ref) -> u32 {
        self.table.level(r)
    }

    pub fn low(&self, r: Ref) -> Ref {
        self.table.low(r)
    }

    pub fn high(&self, r: Ref) -> Ref {
        self.table.high(r)
    }

    pub fn level_to_var(&self, level: u32) -> u32 {
        self.level2var[level as usize]
    }

    pub fn var_to_level(&self, var: u32) -> u32 {
        self.var2level[var as usize]
    }

    pub fn checked_level2var(&self, level: Level) -> Result<Var> {
        self.level2var
            .get(level.index() as usize)
            .map(|&v| Var::new(v))
            .ok_or(BddError::Range {
                what: "level",
                value: level.index() as i64,
            })
    }

    pub fn checked_var2level(&self, var: Var) -> Result<Level> {
        self.check_var(var.id())?;
        Ok(Level::new(self.var2level[var.index()]))
    }

    pub fn check_var(&self, var: u32) -> Result<()> {
        if var < self.var_num {
            Ok(())
        } else {
            Err(BddError::UnknownVariable {
                var,
                var_num: self.var_num,
            })
        }
    }

    /// Node for the positive literal of `var`.
    pub fn ith_var(&self, var: u32) -> Result<Ref> {
        self.check_var(var)?;
        Ok(self.vars[2 * var as usize])
    }

    /// Node for the negative literal of `var`.
    pub fn nith_var(&self, var: u32) -> Result<Ref> {
        self.check_var(var)?;
        Ok(self.vars[2 * var as usize + 1])
    }

    /// Node for the positive literal at `level`.
    pub(crate) fn level_var(&self, level: u32) -> Ref {
        self.vars[2 * self.level2var[level as usize] as usize]
    }

    /// Fails with `IllegalBdd` unless `r` names a live node.
    pub fn check(&self, r: Ref) -> Result<()> {
        if self.table.is_live(r) {
            Ok(())
        } else {
            Err(BddError::IllegalBdd { node: r.get() })
        }
    }

    pub fn ensure_usable(&self) -> Result<()> {
        match &self.failed {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // ─── External references ────────────────────────────────────────────────

    pub fn addref(&mut self, r: Ref) {
        if !r.is_const() {
            self.table[r].inc_ref();
        }
    }

    pub fn delref(&mut self, r: Ref) -> Result<()> {
        if r.is_const() {
            return Ok(());
        }
        self.check(r)?;
        if self.table[r].dec_ref() {
            Ok(())
        } else {
            Err(BddError::Deref { node: r.get() })
        }
    }

    #[cfg(test)]
    pub fn refcount(&self, r: Ref) -> u32 {
        self.table[r].refcount
    }

    // ─── Root stack ─────────────────────────────────────────────────────────

    pub(crate) fn init_ref(&mut self) {
        self.ref_stack.clear();
    }

    pub(crate) fn push_ref(&mut self, r: Ref) -> Ref {
        self.ref_stack.push(r);
        r
    }

    pub(crate) fn pop_ref(&mut self, n: usize) {
        let len = self.ref_stack.len();
        self.ref_stack.truncate(len - n);
    }

    pub(crate) fn ref_stack(&self) -> &[Ref] {
        &self.ref_stack
    }

    /// Runs one top-level operation: fresh root stack, then cache resizing
    /// if the node table grew meanwhile.
    pub(crate) fn run<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.ensure_usable()?;
        self.init_ref();
        let res = op(self);
        self.init_ref();
        self.check_resize();
        res
    }

    // ─── Node creation ──────────────────────────────────────────────────────

    /// Find or create the node `(level, low, high)`.
    ///
    /// Returns `low` without creating anything when both children agree.
    /// May collect garbage and grow the table; `low` and `high` are kept
    /// alive across that.
    pub fn make_node(&mut self, level: u32, low: Ref, high: Ref) -> Result<Ref> {
        self.table.stats.access += 1;

        if low == high {
            self.table.stats.trivial += 1;
            return Ok(low);
        }

        debug_assert!(
            level < self.table.level(low) && level < self.table.level(high),
            "ordering violated: L{} over {} (L{}) and {} (L{})",
            level,
            low,
            self.table.level(low),
            high,
            self.table.level(high)
        );

        if let Some(r) = self.table.find(level, low, high) {
            return Ok(r);
        }

        if !self.table.has_free() {
            self.push_ref(low);
            self.push_ref(high);
            self.gc();
            if self.table.free_num() * 100 / self.table.size() <= self.config.min_free_nodes {
                self.node_resize();
            }
            self.pop_ref(2);

            if !self.table.has_free() {
                let err = BddError::NodeNum {
                    size: self.table.size(),
                };
                self.failed = Some(err.clone());
                return Err(err);
            }
        }

        let r = self
            .table
            .insert(level, low, high)
            .ok_or(BddError::NodeNum {
                size: self.table.size(),
            })?;
        trace!("mk(L{}, {}, {}) -> {}", level, low, high, r);
        Ok(r)
    }

    // ─── Variables ──────────────────────────────────────────────────────────

    /// Declare `num` variables. Growing is allowed, shrinking is not.
    pub fn set_var_num(&mut self, num: u32) -> Result<()> {
        self.ensure_usable()?;
        if num < 1 || num > MAX_VAR {
            return Err(BddError::VarNum { requested: num });
        }
        if num < self.var_num {
            return Err(BddError::DecreaseVarNum {
                current: self.var_num,
                requested: num,
            });
        }
        if num == self.var_num {
            return Ok(());
        }

        debug!("Growing variable count from {} to {}", self.var_num, num);
        let old = self.var_num;

        // Terminals sit below every variable, including the new ones.
        self.table.set_terminal_level(num);
        self.var_num = num;
        self.init_ref();
        for v in old..num {
            let pos = self.make_node(v, Ref::ZERO, Ref::ONE)?;
            self.push_ref(pos);
            let neg = self.make_node(v, Ref::ONE, Ref::ZERO)?;
            self.pop_ref(1);
            self.table[pos].refcount = MAX_REF;
            self.table[neg].refcount = MAX_REF;
            self.vars.push(pos);
            self.vars.push(neg);
            self.level2var.push(v);
            self.var2level.push(v);
        }
        self.check_resize();

        self.pairs.grow(old, num, |level| self.vars[2 * level as usize]);
        self.varsets.grow(num);
        self.caches.count.reset();
        Ok(())
    }
}
