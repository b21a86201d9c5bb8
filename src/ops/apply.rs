//! Binary apply, negation, if-then-else and the variadic and/or.

use crate::cache::{MultiOpKey, OpKey};
use crate::error::Result;
use crate::kernel::Kernel;
use crate::ops::{BddOp, AND_SAT_TAG, DIFF_SAT_TAG, ITE_TAG, NOT_TAG};
use crate::reference::Ref;

impl Kernel {
    /// Children of `r` with respect to `level`: its own children if `r` sits
    /// at that level, otherwise `r` twice.
    pub(crate) fn cofactors(&self, r: Ref, level: u32) -> (Ref, Ref) {
        if self.level(r) == level {
            (self.low(r), self.high(r))
        } else {
            (r, r)
        }
    }

    /// Recurse on the lowest of the two operand levels and combine the
    /// cofactor results with `step`.
    fn apply_split(
        &mut self,
        l: Ref,
        r: Ref,
        mut step: impl FnMut(&mut Self, Ref, Ref) -> Result<Ref>,
    ) -> Result<Ref> {
        let level = self.level(l).min(self.level(r));
        let (l0, l1) = self.cofactors(l, level);
        let (r0, r1) = self.cofactors(r, level);
        let low = step(self, l0, r0)?;
        self.push_ref(low);
        let high = step(self, l1, r1)?;
        self.push_ref(high);
        let res = self.make_node(level, low, high);
        self.pop_ref(2);
        res
    }

    pub(crate) fn apply_rec(&mut self, op: BddOp, l: Ref, r: Ref) -> Result<Ref> {
        if l.is_const() && r.is_const() {
            return Ok(Ref::from_bool(op.eval(l.is_one(), r.is_one())));
        }

        let (op, l, r) = match op {
            BddOp::And => return self.and_rec(l, r),
            BddOp::Or => return self.or_rec(l, r),
            BddOp::Xor => {
                if l == r {
                    return Ok(Ref::ZERO);
                } else if l.is_zero() {
                    return Ok(r);
                } else if r.is_zero() {
                    return Ok(l);
                } else if l.is_one() {
                    return self.not_rec(r);
                } else if r.is_one() {
                    return self.not_rec(l);
                }
                (op, l.min(r), l.max(r))
            }
            BddOp::Nand => {
                if l == r {
                    return self.not_rec(l);
                } else if l.is_zero() || r.is_zero() {
                    return Ok(Ref::ONE);
                } else if l.is_one() {
                    return self.not_rec(r);
                } else if r.is_one() {
                    return self.not_rec(l);
                }
                (op, l.min(r), l.max(r))
            }
            BddOp::Nor => {
                if l == r {
                    return self.not_rec(l);
                } else if l.is_one() || r.is_one() {
                    return Ok(Ref::ZERO);
                } else if l.is_zero() {
                    return self.not_rec(r);
                } else if r.is_zero() {
                    return self.not_rec(l);
                }
                (op, l.min(r), l.max(r))
            }
            BddOp::Imp => {
                if l == r || l.is_zero() || r.is_one() {
                    return Ok(Ref::ONE);
                } else if l.is_one() {
                    return Ok(r);
                } else if r.is_zero() {
                    return self.not_rec(l);
                }
                (op, l, r)
            }
            BddOp::Biimp => {
                if l == r {
                    return Ok(Ref::ONE);
                } else if l.is_zero() {
                    return self.not_rec(r);
                } else if r.is_zero() {
                    return self.not_rec(l);
                } else if l.is_one() {
                    return Ok(r);
                } else if r.is_one() {
                    return Ok(l);
                }
                (op, l.min(r), l.max(r))
            }
            BddOp::Diff => {
                if l == r || l.is_zero() || r.is_one() {
                    return Ok(Ref::ZERO);
                } else if l.is_one() {
                    return self.not_rec(r);
                } else if r.is_zero() {
                    return Ok(l);
                }
                (op, l, r)
            }
            BddOp::Less => {
                if l == r || l.is_one() || r.is_zero() {
                    return Ok(Ref::ZERO);
                } else if l.is_zero() {
                    return Ok(r);
                } else if r.is_one() {
                    return self.not_rec(l);
                }
                // less(l, r) == diff(r, l)
                (BddOp::Diff, r, l)
            }
            BddOp::InvImp => {
                if l == r || l.is_one() || r.is_zero() {
                    return Ok(Ref::ONE);
                } else if r.is_one() {
                    return Ok(l);
                } else if l.is_zero() {
                    return self.not_rec(r);
                }
                // invimp(l, r) == imp(r, l)
                (BddOp::Imp, r, l)
            }
        };

        let key = OpKey::binary(l, r, op.code() as u64);
        if let Some(&res) = self.caches.apply.get(&key) {
            return Ok(res);
        }
        let res = self.apply_split(l, r, |k, a, b| k.apply_rec(op, a, b))?;
        self.caches.apply.insert(key, res);
        Ok(res)
    }

    pub(crate) fn and_rec(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        if l == r {
            return Ok(l);
        } else if l.is_zero() || r.is_zero() {
            return Ok(Ref::ZERO);
        } else if l.is_one() {
            return Ok(r);
        } else if r.is_one() {
            return Ok(l);
        }
        let (l, r) = (l.min(r), l.max(r));

        let key = OpKey::binary(l, r, BddOp::And.code() as u64);
        if let Some(&res) = self.caches.apply.get(&key) {
            return Ok(res);
        }
        let res = self.apply_split(l, r, Self::and_rec)?;
        self.caches.apply.insert(key, res);
        Ok(res)
    }

    pub(crate) fn or_rec(&mut self, l: Ref, r: Ref) -> Result<Ref> {
        if l == r {
            return Ok(l);
        } else if l.is_one() || r.is_one() {
            return Ok(Ref::ONE);
        } else if l.is_zero() {
            return Ok(r);
        } else if r.is_zero() {
            return Ok(l);
        }
        let (l, r) = (l.min(r), l.max(r));

        let key = OpKey::binary(l, r, BddOp::Or.code() as u64);
        if let Some(&res) = self.caches.apply.get(&key) {
            return Ok(res);
        }
        let res = self.apply_split(l, r, Self::or_rec)?;
        self.caches.apply.insert(key, res);
        Ok(res)
    }

    pub(crate) fn not_rec(&mut self, r: Ref) -> Result<Ref> {
        if r.is_zero() {
            return Ok(Ref::ONE);
        } else if r.is_one() {
            return Ok(Ref::ZERO);
        }

        let key = OpKey::unary(r, NOT_TAG);
        if let Some(&res) = self.caches.apply.get(&key) {
            return Ok(res);
        }

        let low = self.not_rec(self.low(r))?;
        self.push_ref(low);
        let high = self.not_rec(self.high(r))?;
        self.push_ref(high);
        let res = self.make_node(self.level(r), low, high);
        self.pop_ref(2);
        let res = res?;

        self.caches.apply.insert(key, res);
        Ok(res)
    }

    pub(crate) fn ite_rec(&mut self, f: Ref, g: Ref, h: Ref) -> Result<Ref> {
        if f.is_one() {
            return Ok(g);
        } else if f.is_zero() {
            return Ok(h);
        } else if g.is_one() {
            return self.or_rec(f, h);
        } else if g.is_zero() {
            return self.apply_rec(BddOp::Less, f, h);
        } else if h.is_one() {
            return self.apply_rec(BddOp::Imp, f, g);
        } else if h.is_zero() {
            return self.and_rec(f, g);
        } else if g == h {
            return Ok(g);
        }

        let level_f = self.level(f);
        let level_g = self.level(g);
        let level_h = self.level(h);
        if self.low(f).is_zero() && self.high(f).is_one() && level_f < level_g && level_f < level_h {
            // `f` is a single variable above both branches.
            return self.make_node(level_f, h, g);
        }

        let key = MultiOpKey {
            op: ITE_TAG,
            operands: vec![f, g, h],
        };
        if let Some(&res) = self.caches.multiop.get(&key) {
            return Ok(res);
        }

        let level = level_f.min(level_g).min(level_h);
        let (f0, f1) = self.cofactors(f, level);
        let (g0, g1) = self.cofactors(g, level);
        let (h0, h1) = self.cofactors(h, level);
        let low = self.ite_rec(f0, g0, h0)?;
        self.push_ref(low);
        let high = self.ite_rec(f1, g1, h1)?;
        self.push_ref(high);
        let res = self.make_node(level, low, high);
        self.pop_ref(2);
        let res = res?;

        self.caches.multiop.insert(key, res);
        Ok(res)
    }

    /// Disjunction of all `operands`.
    ///
    /// Operands must be non-constant, or the list small enough to be handled
    /// by the binary case. The list is sorted and de-duplicated in place.
    pub(crate) fn or_all_rec(&mut self, operands: Vec<Ref>) -> Result<Ref> {
        self.all_rec(BddOp::Or, operands)
    }

    /// Shared body of and-all (`op == And`) and or-all (`op == Or`).
    ///
    /// For and-all the absorbing element is FALSE and the identity TRUE;
    /// or-all swaps them.
    fn all_rec(&mut self, op: BddOp, mut operands: Vec<Ref>) -> Result<Ref> {
        let is_and = op == BddOp::And;
        let identity = Ref::from_bool(is_and);
        let absorbing = Ref::from_bool(!is_and);

        match operands.len() {
            0 => return Ok(identity),
            1 => return Ok(operands[0]),
            2 if is_and => return self.and_rec(operands[0], operands[1]),
            2 => return self.or_rec(operands[0], operands[1]),
            _ => {}
        }

        operands.sort_unstable();
        operands.dedup();
        if operands.len() < 3 {
            return self.all_rec(op, operands);
        }

        let key = MultiOpKey {
            op: op.code(),
            operands,
        };
        if let Some(&res) = self.caches.multiop.get(&key) {
            return Ok(res);
        }
        let operands = &key.operands;

        let level = operands
            .iter()
            .map(|&r| self.level(r))
            .min()
            .unwrap_or(u32::MAX);
        let low_absorbed = operands
            .iter()
            .any(|&r| self.level(r) == level && self.low(r) == absorbing);
        let high_absorbed = operands
            .iter()
            .any(|&r| self.level(r) == level && self.high(r) == absorbing);

        // Cofactor operand lists, with identity children dropped.
        let branch = |k: &Self, pick_high: bool| -> Vec<Ref> {
            operands
                .iter()
                .filter_map(|&r| {
                    if k.level(r) != level {
                        return Some(r);
                    }
                    let child = if pick_high { k.high(r) } else { k.low(r) };
                    (child != identity).then_some(child)
                })
                .collect()
        };

        let low = if low_absorbed {
            absorbing
        } else {
            let low_operands = branch(self, false);
            let low = self.all_rec(op, low_operands)?;
            self.push_ref(low)
        };
        let high = if high_absorbed {
            absorbing
        } else {
            let high_operands = branch(self, true);
            let high = self.all_rec(op, high_operands)?;
            self.push_ref(high)
        };
        let res = self.make_node(level, low, high);
        self.pop_ref(usize::from(!low_absorbed) + usize::from(!high_absorbed));
        let res = res?;

        self.caches.multiop.insert(key, res);
        Ok(res)
    }

    /// Public entry of and-all/or-all: drops identities, short-circuits on
    /// the absorbing element, then recurses.
    pub(crate) fn all_of(&mut self, op: BddOp, operands: &[Ref]) -> Result<Ref> {
        let identity = Ref::from_bool(op == BddOp::And);
        let absorbing = Ref::from_bool(op != BddOp::And);
        if operands.contains(&absorbing) {
            return Ok(absorbing);
        }
        let mut filtered: Vec<Ref> = operands.iter().copied().filter(|&r| r != identity).collect();
        filtered.sort_unstable();
        filtered.dedup();
        self.all_rec(op, filtered)
    }

    /// Whether `l ∧ r` is satisfiable, without building it.
    pub(crate) fn and_sat_rec(&mut self, l: Ref, r: Ref) -> bool {
        if l.is_zero() || r.is_zero() {
            return false;
        } else if l.is_one() || r.is_one() || l == r {
            return true;
        }
        let (l, r) = (l.min(r), l.max(r));

        let key = OpKey::binary(l, r, AND_SAT_TAG);
        if let Some(&res) = self.caches.apply.get(&key) {
            return res.is_one();
        }
        let level = self.level(l).min(self.level(r));
        let (l0, l1) = self.cofactors(l, level);
        let (r0, r1) = self.cofactors(r, level);
        let res = self.and_sat_rec(l0, r0) || self.and_sat_rec(l1, r1);
        self.caches.apply.insert(key, Ref::from_bool(res));
        res
    }

    /// Whether `l ∧ ¬r` is satisfiable, without building it.
    pub(crate) fn diff_sat_rec(&mut self, l: Ref, r: Ref) -> bool {
        if l.is_zero() || r.is_one() || l == r {
            return false;
        } else if l.is_one() || r.is_zero() {
            return true;
        }

        let key = OpKey::binary(l, r, DIFF_SAT_TAG);
        if let Some(&res) = self.caches.apply.get(&key) {
            return res.is_one();
        }
        let level = self.level(l).min(self.level(r));
        let (l0, l1) = self.cofactors(l, level);
        let (r0, r1) = self.cofactors(r, level);
        let res = self.diff_sat_rec(l0, r0) || self.diff_sat_rec(l1, r1);
        self.caches.apply.insert(key, Ref::from_bool(res));
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;
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
    fn test_apply_matches_truth_tables() {
        let mut k = kernel(2);
        let x = vars(&k, 2);
        for op in BddOp::ALL {
            let res = k.apply_rec(op, x[0], x[1]).unwrap();
            // Walk every assignment and compare with the operator's table.
            for a in [false, true] {
                for b in [false, true] {
                    let mut node = res;
                    while !node.is_const() {
                        let value = if k.level(node) == 0 { a } else { b };
                        node = if value { k.high(node) } else { k.low(node) };
                    }
                    assert_eq!(node.is_one(), op.eval(a, b), "{} on ({}, {})", op, a, b);
                }
            }
        }
    }

    #[test]
    fn test_complement_laws() {
        let mut k = kernel(3);
        let x = vars(&k, 3);
        let f = k.or_rec(x[0], x[2]).unwrap();
        let nf = k.not_rec(f).unwrap();
        assert_eq!(k.and_rec(f, nf).unwrap(), Ref::ZERO);
        assert_eq!(k.or_rec(f, nf).unwrap(), Ref::ONE);
        assert_eq!(k.not_rec(nf).unwrap(), f);
    }

    #[test]
    fn test_less_and_invimp_rewrite() {
        let mut k = kernel(2);
        let x = vars(&k, 2);
        let less = k.apply_rec(BddOp::Less, x[0], x[1]).unwrap();
        let diff = k.apply_rec(BddOp::Diff, x[1], x[0]).unwrap();
        assert_eq!(less, diff);
        let invimp = k.apply_rec(BddOp::InvImp, x[0], x[1]).unwrap();
        let imp = k.apply_rec(BddOp::Imp, x[1], x[0]).unwrap();
        assert_eq!(invimp, imp);
    }

    #[test]
    fn test_ite_degenerate_cases() {
        let mut k = kernel(3);
        let x = vars(&k, 3);
        assert_eq!(k.ite_rec(Ref::ONE, x[1], x[2]).unwrap(), x[1]);
        assert_eq!(k.ite_rec(Ref::ZERO, x[1], x[2]).unwrap(), x[2]);
        assert_eq!(k.ite_rec(x[0], x[1], x[1]).unwrap(), x[1]);
        let and = k.and_rec(x[0], x[1]).unwrap();
        assert_eq!(k.ite_rec(x[0], x[1], Ref::ZERO).unwrap(), and);
    }

    #[test]
    fn test_ite_matches_expansion() {
        let mut k = kernel(3);
        let x = vars(&k, 3);
        // ite(x1, x0, x2) where the condition is not the top variable.
        let res = k.ite_rec(x[1], x[0], x[2]).unwrap();
        let then = k.and_rec(x[1], x[0]).unwrap();
        let nx1 = k.not_rec(x[1]).unwrap();
        let other = k.and_rec(nx1, x[2]).unwrap();
        let expected = k.or_rec(then, other).unwrap();
        assert_eq!(res, expected);
    }

    #[test]
    fn test_and_all_equals_fold() {
        let mut k = kernel(4);
        let x = vars(&k, 4);
        let a = k.or_rec(x[0], x[3]).unwrap();
        let b = k.or_rec(x[1], x[2]).unwrap();
        let c = k.apply_rec(BddOp::Xor, x[0], x[2]).unwrap();

        let all = k.all_of(BddOp::And, &[c, a, b, a, Ref::ONE]).unwrap();
        let ab = k.and_rec(a, b).unwrap();
        let folded = k.and_rec(ab, c).unwrap();
        assert_eq!(all, folded);

        let any = k.all_of(BddOp::Or, &[c, a, b, Ref::ZERO]).unwrap();
        let ab = k.or_rec(a, b).unwrap();
        let folded = k.or_rec(ab, c).unwrap();
        assert_eq!(any, folded);
    }

    #[test]
    fn test_all_of_edge_cases() {
        let mut k = kernel(2);
        let x = vars(&k, 2);
        assert_eq!(k.all_of(BddOp::And, &[]).unwrap(), Ref::ONE);
        assert_eq!(k.all_of(BddOp::Or, &[]).unwrap(), Ref::ZERO);
        assert_eq!(k.all_of(BddOp::And, &[x[0], Ref::ZERO]).unwrap(), Ref::ZERO);
        assert_eq!(k.all_of(BddOp::Or, &[x[0], Ref::ONE]).unwrap(), Ref::ONE);
        assert_eq!(k.all_of(BddOp::And, &[x[1], x[1]]).unwrap(), x[1]);
    }

    #[test]
    fn test_sat_checks() {
        let mut k = kernel(2);
        let x = vars(&k, 2);
        let nx0 = k.not_rec(x[0]).unwrap();
        assert!(!k.and_sat_rec(x[0], nx0));
        assert!(k.and_sat_rec(x[0], x[1]));
        assert!(!k.diff_sat_rec(x[0], x[0]));
        assert!(k.diff_sat_rec(x[0], x[1]));
        let both = k.and_rec(x[0], x[1]).unwrap();
        assert!(!k.diff_sat_rec(both, x[0]));
    }
}
