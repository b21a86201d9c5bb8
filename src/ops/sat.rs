//! Satisfying assignments.
//!
//! Every variant returns a *cube*: a BDD with exactly one path to TRUE,
//! built bottom-up with [`Kernel::make_sat_node`].

use crate::bitset::BitSet;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::reference::Ref;

impl Kernel {
    /// Node at `level` whose `use_low` branch is `child` and whose other
    /// branch is FALSE.
    fn make_sat_node(&mut self, level: u32, child: Ref, use_low: bool) -> Result<Ref> {
        debug_assert!(self.level(child) > level);
        self.push_ref(child);
        let res = if use_low {
            self.make_node(level, child, Ref::ZERO)
        } else {
            self.make_node(level, Ref::ZERO, child)
        };
        self.pop_ref(1);
        res
    }

    /// One satisfying path, preferring low branches. Untested variables stay
    /// untested.
    pub(crate) fn sat_one_rec(&mut self, r: Ref) -> Result<Ref> {
        if r.is_const() {
            return Ok(r);
        }
        let use_high = self.low(r).is_zero();
        let next = if use_high { self.high(r) } else { self.low(r) };
        let child = self.sat_one_rec(next)?;
        self.make_sat_node(self.level(r), child, !use_high)
    }

    /// One satisfying assignment that tests every variable; skipped
    /// variables are set to false.
    pub(crate) fn full_sat_one(&mut self, r: Ref) -> Result<Ref> {
        if r.is_zero() {
            return Ok(r);
        }
        let mut res = self.full_sat_one_rec(r)?;
        for level in (0..self.level(r)).rev() {
            res = self.make_sat_node(level, res, true)?;
        }
        Ok(res)
    }

    fn full_sat_one_rec(&mut self, r: Ref) -> Result<Ref> {
        if r.is_const() {
            return Ok(r);
        }
        let level = self.level(r);
        let use_low = !self.low(r).is_zero();
        let next = if use_low { self.low(r) } else { self.high(r) };
        let mut child = self.full_sat_one_rec(next)?;
        for skipped in (level + 1..self.level(child)).rev() {
            child = self.make_sat_node(skipped, child, true)?;
        }
        self.make_sat_node(level, child, use_low)
    }

    /// A full satisfying assignment chosen pseudo-randomly from `seed`.
    ///
    /// The choice only depends on the seed, the levels and the branches
    /// taken, never on node ids, so it is reproducible across managers.
    pub(crate) fn random_full_sat_one(&mut self, r: Ref, seed: i32) -> Result<Ref> {
        if r.is_zero() {
            return Ok(r);
        }
        self.random_full_sat_one_rec(r, 0, seed)
    }

    fn random_full_sat_one_rec(&mut self, r: Ref, level: u32, seed: i32) -> Result<Ref> {
        if level == self.var_num() {
            debug_assert!(r.is_const());
            return Ok(r);
        }

        let mut seed = seed.wrapping_mul(31).wrapping_add(level as i32);
        let prefer_low = seed & 0x1_0000 == 0;

        if level < self.level(r) {
            if prefer_low {
                seed = seed.wrapping_mul(23);
            }
            let next = self.random_full_sat_one_rec(r, level + 1, seed)?;
            return self.make_sat_node(level, next, prefer_low);
        }

        let (low, high) = (self.low(r), self.high(r));
        let use_low = (!low.is_zero() && prefer_low) || high.is_zero();
        if use_low {
            seed = seed.wrapping_mul(23);
        }
        let next = self.random_full_sat_one_rec(if use_low { low } else { high }, level + 1, seed)?;
        self.make_sat_node(level, next, use_low)
    }

    /// One satisfying path that also tests every variable of `varset`;
    /// variables of the set not tested by `r` get polarity `positive`.
    pub(crate) fn sat_one_set(&mut self, r: Ref, varset: Ref, positive: bool) -> Result<Ref> {
        if r.is_zero() {
            return Ok(r);
        }
        self.sat_one_set_rec(r, varset, positive)
    }

    fn sat_one_set_rec(&mut self, r: Ref, varset: Ref, positive: bool) -> Result<Ref> {
        if r.is_const() && varset.is_const() {
            return Ok(r);
        }

        let (level_r, level_v) = (self.level(r), self.level(varset));
        if level_v < level_r {
            let child = self.sat_one_set_rec(r, self.high(varset), positive)?;
            return self.make_sat_node(level_v, child, !positive);
        }

        let next_set = if level_r == level_v { self.high(varset) } else { varset };
        let use_high = self.low(r).is_zero();
        let next = if use_high { self.high(r) } else { self.low(r) };
        let child = self.sat_one_set_rec(next, next_set, positive)?;
        self.make_sat_node(level_r, child, !use_high)
    }

    /// Variables set to true along the path [`sat_one_rec`](Self::sat_one_rec) picks.
    pub(crate) fn min_assignment_bits(&self, r: Ref) -> BitSet {
        let mut bits = BitSet::new(self.var_num() as usize);
        let mut n = r;
        while !n.is_const() {
            if self.low(n).is_zero() {
                bits.insert(self.level_to_var(self.level(n)) as usize);
                n = self.high(n);
            } else {
                n = self.low(n);
            }
        }
        bits
    }

    /// Whether `r` is a cube: exactly one branch is FALSE at every node,
    /// ending in TRUE.
    pub(crate) fn is_assignment(&self, r: Ref) -> bool {
        let mut n = r;
        while !n.is_const() {
            let (low, high) = (self.low(n), self.high(n));
            n = if low.is_zero() {
                high
            } else if high.is_zero() {
                low
            } else {
                return false;
            };
        }
        n.is_one()
    }
}
