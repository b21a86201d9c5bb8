//! Exact counting queries and structural profiles.

use num_bigint::BigUint;

use crate::cache::CountKey;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::reference::Ref;

const SAT_COUNT: u32 = 2;
const PATH_COUNT: u32 = 4;

impl Kernel {
    /// Number of paths from `r` to TRUE.
    pub(crate) fn path_count(&mut self, r: Ref) -> BigUint {
        if r.is_zero() {
            return BigUint::default();
        } else if r.is_one() {
            return BigUint::from(1u32);
        }

        let key = CountKey {
            node: r,
            tag: PATH_COUNT,
        };
        if let Some(res) = self.caches.count.get(&key) {
            return res.clone();
        }
        let res = self.path_count(self.low(r)) + self.path_count(self.high(r));
        self.caches.count.insert(key, res.clone());
        res
    }

    /// Number of assignments to all declared variables that satisfy `r`.
    pub(crate) fn sat_count(&mut self, r: Ref) -> BigUint {
        let below = self.sat_count_rec(r);
        below << self.level(r)
    }

    /// Satisfying assignments of the variables from `level(r)` down.
    fn sat_count_rec(&mut self, r: Ref) -> BigUint {
        if r.is_zero() {
            return BigUint::default();
        } else if r.is_one() {
            return BigUint::from(1u32);
        }

        let key = CountKey {
            node: r,
            tag: SAT_COUNT,
        };
        if let Some(res) = self.caches.count.get(&key) {
            return res.clone();
        }

        let level = self.level(r);
        let (low, high) = (self.low(r), self.high(r));
        let low_count = self.sat_count_rec(low) << (self.level(low) - level - 1);
        let high_count = self.sat_count_rec(high) << (self.level(high) - level - 1);
        let res = low_count + high_count;

        self.caches.count.insert(key, res.clone());
        res
    }

    /// Number of internal nodes reachable from any of `roots`, shared nodes
    /// counted once.
    pub(crate) fn node_count_all(&mut self, roots: &[Ref]) -> usize {
        let count = self.mark_all(roots);
        self.unmark_all(roots);
        count
    }

    /// Number of nodes testing each variable, indexed by variable.
    pub(crate) fn var_profile(&mut self, r: Ref) -> Vec<u32> {
        let mut per_level = vec![0u32; self.var_num() as usize];
        self.mark_with(&[r], |node| per_level[node.level as usize] += 1);
        self.unmark_all(&[r]);

        let mut profile = vec![0u32; self.var_num() as usize];
        for (level, count) in per_level.into_iter().enumerate() {
            profile[self.level_to_var(level as u32) as usize] = count;
        }
        profile
    }

    /// The positive cube of every variable `r` depends on.
    pub(crate) fn support(&mut self, r: Ref) -> Result<Ref> {
        let mut tested = vec![false; self.var_num() as usize];
        self.mark_with(&[r], |node| tested[node.level as usize] = true);
        self.unmark_all(&[r]);

        let mut res = Ref::ONE;
        for level in (0..self.var_num()).rev() {
            if tested[level as usize] {
                res = self.make_node(level, Ref::ZERO, res)?;
            }
        }
        Ok(res)
    }

    /// The positive cube of the given variables.
    pub(crate) fn make_set(&mut self, vars: &[u32]) -> Result<Ref> {
        let mut levels = Vec::with_capacity(vars.len());
        for &var in vars {
            self.check_var(var)?;
            levels.push(self.var_to_level(var));
        }
        levels.sort_unstable();
        levels.dedup();

        let mut res = Ref::ONE;
        for &level in levels.iter().rev() {
            res = self.make_node(level, Ref::ZERO, res)?;
        }
        Ok(res)
    }
}
