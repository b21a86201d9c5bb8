//! Variable substitution through a pairing.

use crate::cache::OpKey;
use crate::error::{BddError, Result};
use crate::kernel::Kernel;
use crate::pairing::PairSlot;
use crate::reference::Ref;

const REPLACE: u64 = 0;
const CORRECTIFY: u64 = 3;
const TRANSFORM: u64 = 4;

impl Kernel {
    /// Substitute every variable of `r` according to the pairing in `slot`.
    pub(crate) fn replace(&mut self, r: Ref, slot: usize) -> Result<Ref> {
        let pair = self.pairing(slot)?;
        self.replace_rec(r, &pair)
    }

    fn replace_rec(&mut self, r: Ref, pair: &PairSlot) -> Result<Ref> {
        if r.is_const() || pair.is_beyond(self.level(r)) {
            return Ok(r);
        }

        let key = OpKey::unary(r, (pair.id as u64) << 3 | REPLACE);
        if let Some(&res) = self.caches.replace.get(&key) {
            return Ok(res);
        }

        let low = self.replace_rec(self.low(r), pair)?;
        self.push_ref(low);
        let high = self.replace_rec(self.high(r), pair)?;
        self.push_ref(high);
        let target = self.level(pair.result[self.level(r) as usize]);
        let res = self.correctify(target, low, high);
        self.pop_ref(2);
        let res = res?;

        self.caches.replace.insert(key, res);
        Ok(res)
    }

    /// Build the node `(level, l, r)` even if `level` is not above the
    /// children, by pushing the test down until the order holds.
    ///
    /// Fails with `Replace` when a child already tests `level`, which means
    /// two variables were mapped onto the same one.
    fn correctify(&mut self, level: u32, l: Ref, r: Ref) -> Result<Ref> {
        let (level_l, level_r) = (self.level(l), self.level(r));
        if level < level_l && level < level_r {
            return self.make_node(level, l, r);
        }
        if level == level_l || level == level_r {
            return Err(BddError::Replace);
        }

        let key = OpKey::binary(l, r, (level as u64) << 3 | CORRECTIFY);
        if let Some(&res) = self.caches.replace.get(&key) {
            return Ok(res);
        }

        let top = level_l.min(level_r);
        let (l0, l1) = self.cofactors(l, top);
        let (r0, r1) = self.cofactors(r, top);
        let low = self.correctify(level, l0, r0)?;
        self.push_ref(low);
        let high = self.correctify(level, l1, r1)?;
        self.push_ref(high);
        let res = self.make_node(top, low, high);
        self.pop_ref(2);
        let res = res?;

        self.caches.replace.insert(key, res);
        Ok(res)
    }

    /// `∃ level. l ∧ r` with every variable shifted one level up, for a
    /// pairing that maps each level onto itself or the level above.
    pub(crate) fn transform(&mut self, l: Ref, r: Ref, slot: usize) -> Result<Ref> {
        if !self.is_valid_for_transform(slot)? {
            return Err(BddError::InvalidTransform);
        }
        let pair = self.pairing(slot)?;
        self.transform_rec(l, r, &pair)
    }

    fn transform_rec(&mut self, l: Ref, r: Ref, pair: &PairSlot) -> Result<Ref> {
        if l.is_zero() || r.is_zero() {
            return Ok(Ref::ZERO);
        }
        let (level_l, level_r) = (self.level(l), self.level(r));
        if pair.is_beyond(level_l) && pair.is_beyond(level_r) {
            return self.and_rec(l, r);
        }

        let key = OpKey::binary(l, r, (pair.id as u64) << 3 | TRANSFORM);
        if let Some(&res) = self.caches.replace.get(&key) {
            return Ok(res);
        }

        let level = level_l.min(level_r);
        let (l0, l1) = self.cofactors(l, level);
        let (r0, r1) = self.cofactors(r, level);
        let low = self.transform_rec(l0, r0, pair)?;
        self.push_ref(low);
        let high = self.transform_rec(l1, r1, pair)?;
        self.push_ref(high);
        debug_assert!(self.level(low) >= level && self.level(high) >= level);

        // A level that the next one is moved onto is erased here.
        let next = level as usize + 1;
        let res = if next < pair.result.len() && self.level(pair.result[next]) == level {
            self.or_rec(low, high)
        } else {
            let target = self.level(pair.result[level as usize]);
            self.make_node(target, low, high)
        };
        self.pop_ref(2);
        let res = res?;

        self.caches.replace.insert(key, res);
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;
    use crate::ops::BddOp;
    use test_log::test;

    fn kernel(vars: u32) -> Kernel {
        let mut k = Kernel::new(BddConfig::default().with_node_capacity(1000));
        k.set_var_num(vars).unwrap();
        k
    }

    fn vars(k: &Kernel, n: u32) -> Vec<Ref> {
        (0..n).map(|v| k.ith_var(v).unwrap()).collect()
    }

    #[test]
    fn test_replace_moves_variable() {
        let mut k = kernel(4);
        let x = vars(&k, 4);
        let f = k.and_rec(x[0], x[1]).unwrap();
        let slot = k.make_pairing();
        k.set_pair(slot, 0, 3).unwrap();
        let res = k.replace(f, slot).unwrap();
        assert_eq!(res, k.and_rec(x[1], x[3]).unwrap());
    }

    #[test]
    fn test_swap_round_trip() {
        let mut k = kernel(3);
        let x = vars(&k, 3);
        // x0 ∧ ¬x1 ∨ x2
        let f = k.apply_rec(BddOp::Diff, x[0], x[1]).unwrap();
        let f = k.or_rec(f, x[2]).unwrap();
        let slot = k.make_pairing();
        k.set_pair(slot, 0, 1).unwrap();
        k.set_pair(slot, 1, 0).unwrap();

        let swapped = k.replace(f, slot).unwrap();
        let expected = k.apply_rec(BddOp::Less, x[0], x[1]).unwrap();
        let expected = k.or_rec(expected, x[2]).unwrap();
        assert_eq!(swapped, expected);
        assert_eq!(k.replace(swapped, slot).unwrap(), f);
    }

    #[test]
    fn test_replace_collision_fails() {
        let mut k = kernel(3);
        let x = vars(&k, 3);
        let f = k.and_rec(x[0], x[1]).unwrap();
        let slot = k.make_pairing();
        k.set_pair(slot, 0, 1).unwrap();
        assert_eq!(k.replace(f, slot), Err(BddError::Replace));
    }

    #[test]
    fn test_identity_pairing_is_noop() {
        let mut k = kernel(3);
        let x = vars(&k, 3);
        let f = k.apply_rec(BddOp::Xor, x[0], x[2]).unwrap();
        let slot = k.make_pairing();
        assert_eq!(k.replace(f, slot).unwrap(), f);
    }

    #[test]
    fn test_transform_is_shifted_relprod() {
        // Variables 0/1 are "current"/"next" of one bit, interleaved.
        let mut k = kernel(4);
        let x = vars(&k, 4);
        let slot = k.make_pairing();
        k.set_pair(slot, 1, 0).unwrap();
        k.set_pair(slot, 3, 2).unwrap();

        // State: x0 ∧ ¬x2. Relation: next bit is the negation of the current one.
        let nx2 = k.nith_var(2).unwrap();
        let state = k.and_rec(x[0], nx2).unwrap();
        let t0 = k.apply_rec(BddOp::Xor, x[0], x[1]).unwrap();
        let t1 = k.apply_rec(BddOp::Xor, x[2], x[3]).unwrap();
        let rel = k.and_rec(t0, t1).unwrap();

        let image = k.transform(state, rel, slot).unwrap();
        let nx0 = k.nith_var(0).unwrap();
        assert_eq!(image, k.and_rec(nx0, x[2]).unwrap());
    }

    #[test]
    fn test_transform_rejects_invalid_pairing() {
        let mut k = kernel(3);
        let x = vars(&k, 3);
        let slot = k.make_pairing();
        k.set_pair(slot, 2, 0).unwrap();
        assert_eq!(k.transform(x[0], x[1], slot), Err(BddError::InvalidTransform));
    }
}
