//! Quantification over variable sets.
//!
//! A *variable set* is the conjunction of positive literals, i.e. a chain of
//! nodes linked through their high edges with FALSE on every low edge. Before
//! a quantifier runs, the chain is loaded into a generation-stamped table over
//! levels so that membership tests are a single comparison.

use std::collections::HashSet;

use crate::cache::OpKey;
use crate::error::{BddError, Result};
use crate::kernel::Kernel;
use crate::ops::BddOp;
use crate::reference::Ref;

const EXIST: u64 = 0;
const FORALL: u64 = 1;
const APPEX: u64 = 3;
const APPALL: u64 = 4;
const PROJECT: u64 = 6;
const TESTS_VARS: u64 = 7;
const RESTRICT: u64 = 1;

/// Membership table of the currently loaded variable set.
///
/// `stamps[level]` equals `+generation` for a positive member and
/// `-generation` for a negative one (cubes used by `restrict`).
#[derive(Debug, Default)]
pub struct VarSetTable {
    stamps: Vec<i64>,
    generation: i64,
    /// Deepest level in the set.
    last: u32,
}

impl VarSetTable {
    /// Resize for `var_num` levels, forgetting the loaded set.
    pub fn grow(&mut self, var_num: u32) {
        self.stamps = vec![0; var_num as usize];
        self.generation = 0;
        self.last = 0;
    }

    fn next_generation(&mut self) {
        if self.generation == i64::MAX {
            self.stamps.iter_mut().for_each(|s| *s = 0);
            self.generation = 0;
        }
        self.generation += 1;
        self.last = 0;
    }

    fn insert(&mut self, level: u32, positive: bool) {
        self.stamps[level as usize] = if positive {
            self.generation
        } else {
            -self.generation
        };
        self.last = self.last.max(level);
    }

    pub fn contains(&self, level: u32) -> bool {
        self.stamps
            .get(level as usize)
            .is_some_and(|&s| s == self.generation || s == -self.generation)
    }

    /// Polarity of `level` in the loaded cube, if it is a member.
    pub fn polarity(&self, level: u32) -> Option<bool> {
        match self.stamps.get(level as usize) {
            Some(&s) if s == self.generation => Some(true),
            Some(&s) if s == -self.generation => Some(false),
            _ => None,
        }
    }

    pub fn last(&self) -> u32 {
        self.last
    }
}

impl Kernel {
    /// Load a positive variable set into the membership table.
    pub(crate) fn load_varset(&mut self, varset: Ref) -> Result<()> {
        if varset.is_const() {
            return Err(BddError::VarSet);
        }
        self.varsets.next_generation();
        let mut n = varset;
        while !n.is_const() {
            if !self.low(n).is_zero() {
                return Err(BddError::VarSet);
            }
            self.varsets.insert(self.level(n), true);
            n = self.high(n);
        }
        if !n.is_one() {
            return Err(BddError::VarSet);
        }
        Ok(())
    }

    /// Load a cube of literals of either polarity into the membership table.
    pub(crate) fn load_cube(&mut self, cube: Ref) -> Result<()> {
        if cube.is_const() {
            return Err(BddError::VarSet);
        }
        self.varsets.next_generation();
        let mut n = cube;
        while !n.is_const() {
            let level = self.level(n);
            if self.low(n).is_zero() {
                self.varsets.insert(level, true);
                n = self.high(n);
            } else if self.high(n).is_zero() {
                self.varsets.insert(level, false);
                n = self.low(n);
            } else {
                return Err(BddError::VarSet);
            }
        }
        if !n.is_one() {
            return Err(BddError::VarSet);
        }
        Ok(())
    }

    fn beyond_varset(&self, r: Ref) -> bool {
        self.level(r) > self.varsets.last()
    }

    /// Existential quantification: `∃ varset. r`.
    pub(crate) fn exist(&mut self, r: Ref, varset: Ref) -> Result<Ref> {
        if varset.is_const() {
            return Ok(r);
        }
        self.load_varset(varset)?;
        self.exist_rec(r, varset)
    }

    pub(crate) fn exist_rec(&mut self, r: Ref, varset: Ref) -> Result<Ref> {
        if r.is_const() || self.beyond_varset(r) {
            return Ok(r);
        }

        let key = OpKey::binary(r, varset, EXIST);
        if let Some(&res) = self.caches.quant.get(&key) {
            return Ok(res);
        }

        let level = self.level(r);
        let res = if self.varsets.contains(level) {
            self.exist_frontier(r, varset)?
        } else {
            let low = self.exist_rec(self.low(r), varset)?;
            self.push_ref(low);
            let high = self.exist_rec(self.high(r), varset)?;
            self.push_ref(high);
            let res = self.make_node(level, low, high);
            self.pop_ref(2);
            res?
        };

        self.caches.quant.insert(key, res);
        Ok(res)
    }

    /// `∃` of a node whose own variable is quantified.
    ///
    /// Walks every descendant reachable through quantified nodes only, then
    /// ORs the quantified results of the first non-quantified descendants in
    /// one variadic call. Stops as soon as any of them is TRUE.
    fn exist_frontier(&mut self, r: Ref, varset: Ref) -> Result<Ref> {
        let base = self.ref_stack().len();
        let mut to_process = vec![r];
        let mut processed: HashSet<Ref> = HashSet::from([r]);
        let mut to_or: HashSet<Ref> = HashSet::new();

        while let Some(node) = to_process.pop() {
            let children = [self.low(node), self.high(node)];
            if children.contains(&Ref::ONE) {
                self.pop_ref(self.ref_stack().len() - base);
                return Ok(Ref::ONE);
            }
            for child in children {
                if child.is_zero() {
                    continue;
                }
                if self.varsets.contains(self.level(child)) {
                    if processed.insert(child) {
                        to_process.push(child);
                    }
                } else {
                    let quantified = self.exist_rec(child, varset)?;
                    if quantified.is_one() {
                        self.pop_ref(self.ref_stack().len() - base);
                        return Ok(Ref::ONE);
                    }
                    self.push_ref(quantified);
                    to_or.insert(quantified);
                }
            }
        }

        let res = self.or_all_rec(to_or.into_iter().collect());
        self.pop_ref(self.ref_stack().len() - base);
        res
    }

    /// Universal quantification: `∀ varset. r`.
    pub(crate) fn forall(&mut self, r: Ref, varset: Ref) -> Result<Ref> {
        if varset.is_const() {
            return Ok(r);
        }
        self.load_varset(varset)?;
        self.quant_rec(BddOp::And, r, varset)
    }

    /// Generic quantifier: combines both cofactors of quantified levels with `combine`.
    pub(crate) fn quant_rec(&mut self, combine: BddOp, r: Ref, varset: Ref) -> Result<Ref> {
        if combine == BddOp::Or {
            return self.exist_rec(r, varset);
        }
        if r.is_const() || self.beyond_varset(r) {
            return Ok(r);
        }

        let key = OpKey::binary(r, varset, (combine.code() as u64) << 3 | FORALL);
        if let Some(&res) = self.caches.quant.get(&key) {
            return Ok(res);
        }

        let level = self.level(r);
        let low = self.quant_rec(combine, self.low(r), varset)?;
        self.push_ref(low);
        let high = self.quant_rec(combine, self.high(r), varset)?;
        self.push_ref(high);
        let res = if self.varsets.contains(level) {
            self.apply_rec(combine, low, high)
        } else {
            self.make_node(level, low, high)
        };
        self.pop_ref(2);
        let res = res?;

        self.caches.quant.insert(key, res);
        Ok(res)
    }

    /// Apply `op` to `l` and `r`, then quantify `varset` existentially
    /// (`is_all == false`) or universally.
    pub(crate) fn app_quant(
        &mut self,
        l: Ref,
        r: Ref,
        op: BddOp,
        varset: Ref,
        is_all: bool,
    ) -> Result<Ref> {
        if varset.is_const() {
            return self.apply_rec(op, l, r);
        }
        self.load_varset(varset)?;
        if op == BddOp::And && !is_all {
            self.relprod_rec(l, r, varset)
        } else {
            let combine = if is_all { BddOp::And } else { BddOp::Or };
            self.appquant_rec(l, r, op, combine, varset)
        }
    }

    fn appquant_rec(
        &mut self,
        l: Ref,
        r: Ref,
        op: BddOp,
        combine: BddOp,
        varset: Ref,
    ) -> Result<Ref> {
        match op {
            BddOp::Or => {
                if l.is_one() || r.is_one() {
                    return Ok(Ref::ONE);
                } else if l == r || r.is_zero() {
                    return self.quant_rec(combine, l, varset);
                } else if l.is_zero() {
                    return self.quant_rec(combine, r, varset);
                }
            }
            BddOp::Xor => {
                if l == r {
                    return Ok(Ref::ZERO);
                } else if l.is_zero() {
                    return self.quant_rec(combine, r, varset);
                } else if r.is_zero() {
                    return self.quant_rec(combine, l, varset);
                }
            }
            BddOp::Nand => {
                if l.is_zero() || r.is_zero() {
                    return Ok(Ref::ONE);
                }
            }
            BddOp::Nor => {
                if l.is_one() || r.is_one() {
                    return Ok(Ref::ZERO);
                }
            }
            _ => {}
        }

        if l.is_const() && r.is_const() {
            return Ok(Ref::from_bool(op.eval(l.is_one(), r.is_one())));
        }
        if self.beyond_varset(l) && self.beyond_varset(r) {
            return self.apply_rec(op, l, r);
        }

        let kind = if combine == BddOp::And { APPALL } else { APPEX };
        let key = OpKey::ternary(l, r, varset, (op.code() as u64) << 3 | kind);
        if let Some(&res) = self.caches.appex.get(&key) {
            return Ok(res);
        }

        let level = self.level(l).min(self.level(r));
        let (l0, l1) = self.cofactors(l, level);
        let (r0, r1) = self.cofactors(r, level);
        let low = self.appquant_rec(l0, r0, op, combine, varset)?;
        self.push_ref(low);
        let high = self.appquant_rec(l1, r1, op, combine, varset)?;
        self.push_ref(high);
        let res = if self.varsets.contains(level) {
            self.apply_rec(combine, low, high)
        } else {
            self.make_node(level, low, high)
        };
        self.pop_ref(2);
        let res = res?;

        self.caches.appex.insert(key, res);
        Ok(res)
    }

    /// Relational product: `∃ varset. l ∧ r`, without building `l ∧ r`.
    pub(crate) fn relprod_rec(&mut self, l: Ref, r: Ref, varset: Ref) -> Result<Ref> {
        if l.is_zero() || r.is_zero() {
            return Ok(Ref::ZERO);
        } else if l == r || r.is_one() {
            return self.exist_rec(l, varset);
        } else if l.is_one() {
            return self.exist_rec(r, varset);
        }

        if self.beyond_varset(l) && self.beyond_varset(r) {
            return self.and_rec(l, r);
        }

        let key = OpKey::ternary(l, r, varset, (BddOp::And.code() as u64) << 3 | APPEX);
        if let Some(&res) = self.caches.appex.get(&key) {
            return Ok(res);
        }

        let level = self.level(l).min(self.level(r));
        let (l0, l1) = self.cofactors(l, level);
        let (r0, r1) = self.cofactors(r, level);
        let low = self.relprod_rec(l0, r0, varset)?;
        self.push_ref(low);
        let high = self.relprod_rec(l1, r1, varset)?;
        self.push_ref(high);
        let res = if self.varsets.contains(level) {
            self.or_rec(low, high)
        } else {
            self.make_node(level, low, high)
        };
        self.pop_ref(2);
        let res = res?;

        self.caches.appex.insert(key, res);
        Ok(res)
    }

    /// Existentially quantify every variable *not* in `varset`.
    pub(crate) fn project(&mut self, r: Ref, varset: Ref) -> Result<Ref> {
        if varset.is_const() {
            return Ok(if r.is_zero() { Ref::ZERO } else { Ref::ONE });
        }
        self.load_varset(varset)?;
        self.project_rec(r, varset)
    }

    fn project_rec(&mut self, r: Ref, varset: Ref) -> Result<Ref> {
        if r.is_const() {
            return Ok(r);
        }
        if self.beyond_varset(r) {
            return Ok(Ref::ONE);
        }

        let key = OpKey::binary(r, varset, PROJECT);
        if let Some(&res) = self.caches.quant.get(&key) {
            return Ok(res);
        }

        let level = self.level(r);
        let low = self.project_rec(self.low(r), varset)?;
        self.push_ref(low);
        let high = self.project_rec(self.high(r), varset)?;
        self.push_ref(high);
        let res = if self.varsets.contains(level) {
            self.make_node(level, low, high)
        } else {
            self.or_rec(low, high)
        };
        self.pop_ref(2);
        let res = res?;

        self.caches.quant.insert(key, res);
        Ok(res)
    }

    /// Whether `r` depends on any variable of `varset`.
    pub(crate) fn tests_vars(&mut self, r: Ref, varset: Ref) -> Result<bool> {
        if varset.is_const() {
            return Ok(false);
        }
        self.load_varset(varset)?;
        Ok(self.tests_vars_rec(r, varset))
    }

    fn tests_vars_rec(&mut self, r: Ref, varset: Ref) -> bool {
        if r.is_const() || self.beyond_varset(r) {
            return false;
        }
        let level = self.level(r);
        if self.varsets.contains(level) {
            return true;
        }

        let key = OpKey::binary(r, varset, TESTS_VARS);
        if let Some(&res) = self.caches.quant.get(&key) {
            return res.is_one();
        }
        let res = self.tests_vars_rec(self.low(r), varset) || self.tests_vars_rec(self.high(r), varset);
        self.caches.quant.insert(key, Ref::from_bool(res));
        res
    }

    /// Cofactor `r` by a cube of literals.
    pub(crate) fn restrict(&mut self, r: Ref, cube: Ref) -> Result<Ref> {
        if cube.is_const() {
            return Ok(r);
        }
        self.load_cube(cube)?;
        self.restrict_rec(r, cube)
    }

    fn restrict_rec(&mut self, r: Ref, cube: Ref) -> Result<Ref> {
        if r.is_const() || self.beyond_varset(r) {
            return Ok(r);
        }

        let key = OpKey::binary(r, cube, RESTRICT);
        if let Some(&res) = self.caches.misc.get(&key) {
            return Ok(res);
        }

        let level = self.level(r);
        let res = match self.varsets.polarity(level) {
            Some(true) => self.restrict_rec(self.high(r), cube)?,
            Some(false) => self.restrict_rec(self.low(r), cube)?,
            None => {
                let low = self.restrict_rec(self.low(r), cube)?;
                self.push_ref(low);
                let high = self.restrict_rec(self.high(r), cube)?;
                self.push_ref(high);
                let res = self.make_node(level, low, high);
                self.pop_ref(2);
                res?
            }
        };

        self.caches.misc.insert(key, res);
        Ok(res)
    }
}
