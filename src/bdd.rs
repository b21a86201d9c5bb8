//! Reference-counted BDD handles.
//!
//! A [`Bdd`] names one node of a [`BddManager`] and holds an external
//! reference on it: cloning takes another reference, dropping releases it.
//! Nodes without external references are reclaimed by the next collection.
//!
//! Every operation returns a fresh handle and leaves its operands untouched.
//! The `*_with` variants instead overwrite `self` and consume the other
//! operand, which keeps the number of live handles down in long loops.
//!
//! ```
//! use netbdd::manager::BddManager;
//!
//! let mgr = BddManager::init(1000, 1000);
//! mgr.set_var_num(3).unwrap();
//! let x = mgr.ith_var(0).unwrap();
//! let y = mgr.ith_var(1).unwrap();
//!
//! // De Morgan
//! let lhs = x.and(&y).unwrap().not().unwrap();
//! let rhs = x.not().unwrap().or(&y.not().unwrap()).unwrap();
//! assert_eq!(lhs, rhs);
//!
//! // ∃x. x ∧ y == y
//! let vars = mgr.make_set(&[0]).unwrap();
//! assert_eq!(x.and(&y).unwrap().exist(&vars).unwrap(), y);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use num_bigint::BigUint;

use crate::bitset::BitSet;
use crate::error::{BddError, Result};
use crate::kernel::Kernel;
use crate::manager::BddManager;
use crate::ops::BddOp;
use crate::pairing::Pairing;
use crate::reference::Ref;
use crate::types::{Level, Var};

pub struct Bdd<'m> {
    manager: &'m BddManager,
    node: Ref,
}

impl<'m> Bdd<'m> {
    /// Wrap `node`, whose external reference the caller already took.
    pub(crate) fn from_raw(manager: &'m BddManager, node: Ref) -> Self {
        Self { manager, node }
    }

    pub fn manager(&self) -> &'m BddManager {
        self.manager
    }

    pub(crate) fn node(&self) -> Ref {
        self.node
    }

    /// Raw node id. Stable while this handle lives.
    pub fn id(&self) -> u32 {
        self.node.get()
    }

    pub fn is_zero(&self) -> bool {
        self.node.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.node.is_one()
    }

    pub fn is_const(&self) -> bool {
        self.node.is_const()
    }

    /// Release the handle now. Equivalent to dropping it.
    pub fn free(self) {}

    fn unary(&self, op: impl FnOnce(&mut Kernel, Ref) -> Result<Ref>) -> Result<Bdd<'m>> {
        let r = self.node;
        self.manager.build(|k| {
            k.check(r)?;
            op(k, r)
        })
    }

    fn binary(
        &self,
        other: &Bdd<'m>,
        op: impl FnOnce(&mut Kernel, Ref, Ref) -> Result<Ref>,
    ) -> Result<Bdd<'m>> {
        self.manager.check_owner(other)?;
        let (l, r) = (self.node, other.node);
        self.manager.build(|k| {
            k.check(l)?;
            k.check(r)?;
            op(k, l, r)
        })
    }

    fn query<T>(&self, op: impl FnOnce(&mut Kernel, Ref) -> Result<T>) -> Result<T> {
        let r = self.node;
        self.manager.with_kernel(|k| {
            k.check(r)?;
            op(k, r)
        })
    }

    fn internal(&self) -> Result<()> {
        if self.node.is_const() {
            Err(BddError::IllegalBdd { node: self.id() })
        } else {
            Ok(())
        }
    }

    // ─── Structure ──────────────────────────────────────────────────────────

    /// Variable tested at the root. Fails on constants.
    pub fn var(&self) -> Result<Var> {
        self.internal()?;
        self.query(|k, r| Ok(Var::new(k.level_to_var(k.level(r)))))
    }

    /// Level of the root. Fails on constants.
    pub fn level(&self) -> Result<Level> {
        self.internal()?;
        self.query(|k, r| Ok(Level::new(k.level(r))))
    }

    /// The else-branch of the root. Fails on constants.
    pub fn low(&self) -> Result<Bdd<'m>> {
        self.internal()?;
        self.unary(|k, r| Ok(k.low(r)))
    }

    /// The then-branch of the root. Fails on constants.
    pub fn high(&self) -> Result<Bdd<'m>> {
        self.internal()?;
        self.unary(|k, r| Ok(k.high(r)))
    }

    // ─── Boolean operators ──────────────────────────────────────────────────

    pub fn not(&self) -> Result<Bdd<'m>> {
        self.unary(|k, r| k.not_rec(r))
    }

    /// Combine with `other` under `op`.
    pub fn apply(&self, other: &Bdd<'m>, op: BddOp) -> Result<Bdd<'m>> {
        self.binary(other, |k, l, r| k.apply_rec(op, l, r))
    }

    /// Like [`apply`](Self::apply), with the operator given by its numeric
    /// code (see [`BddOp::code`]). Unknown codes fail with `Operator`.
    pub fn apply_code(&self, other: &Bdd<'m>, code: i32) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::from_code(code)?)
    }

    pub fn and(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.binary(other, |k, l, r| k.and_rec(l, r))
    }

    pub fn or(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.binary(other, |k, l, r| k.or_rec(l, r))
    }

    pub fn xor(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::Xor)
    }

    pub fn nand(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::Nand)
    }

    pub fn nor(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::Nor)
    }

    /// `self → other`
    pub fn imp(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::Imp)
    }

    /// `self ↔ other`
    pub fn biimp(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::Biimp)
    }

    /// `self ∧ ¬other`
    pub fn diff(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::Diff)
    }

    /// `¬self ∧ other`
    pub fn less(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::Less)
    }

    /// `other → self`
    pub fn inv_imp(&self, other: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.apply(other, BddOp::InvImp)
    }

    /// `if self then then_ else else_`
    pub fn ite(&self, then_: &Bdd<'m>, else_: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.manager.check_owner(then_)?;
        self.manager.check_owner(else_)?;
        let (f, g, h) = (self.node, then_.node, else_.node);
        self.manager.build(|k| {
            k.check(f)?;
            k.check(g)?;
            k.check(h)?;
            k.ite_rec(f, g, h)
        })
    }

    /// Whether `self ∧ other` is satisfiable.
    pub fn and_sat(&self, other: &Bdd<'m>) -> Result<bool> {
        self.manager.check_owner(other)?;
        let r = other.node;
        self.query(|k, l| {
            k.check(r)?;
            Ok(k.and_sat_rec(l, r))
        })
    }

    /// Whether `self ∧ ¬other` is satisfiable.
    pub fn diff_sat(&self, other: &Bdd<'m>) -> Result<bool> {
        self.manager.check_owner(other)?;
        let r = other.node;
        self.query(|k, l| {
            k.check(r)?;
            Ok(k.diff_sat_rec(l, r))
        })
    }

    // ─── In-place variants ──────────────────────────────────────────────────

    pub fn not_with(&mut self) -> Result<()> {
        *self = self.not()?;
        Ok(())
    }

    pub fn apply_with(&mut self, other: Bdd<'m>, op: BddOp) -> Result<()> {
        *self = self.apply(&other, op)?;
        Ok(())
    }

    pub fn and_with(&mut self, other: Bdd<'m>) -> Result<()> {
        *self = self.and(&other)?;
        Ok(())
    }

    pub fn or_with(&mut self, other: Bdd<'m>) -> Result<()> {
        *self = self.or(&other)?;
        Ok(())
    }

    pub fn xor_with(&mut self, other: Bdd<'m>) -> Result<()> {
        self.apply_with(other, BddOp::Xor)
    }

    pub fn imp_with(&mut self, other: Bdd<'m>) -> Result<()> {
        self.apply_with(other, BddOp::Imp)
    }

    pub fn biimp_with(&mut self, other: Bdd<'m>) -> Result<()> {
        self.apply_with(other, BddOp::Biimp)
    }

    pub fn diff_with(&mut self, other: Bdd<'m>) -> Result<()> {
        self.apply_with(other, BddOp::Diff)
    }

    pub fn replace_with(&mut self, pair: &Pairing<'m>) -> Result<()> {
        *self = self.replace(pair)?;
        Ok(())
    }

    pub fn exist_with(&mut self, varset: &Bdd<'m>) -> Result<()> {
        *self = self.exist(varset)?;
        Ok(())
    }

    pub fn for_all_with(&mut self, varset: &Bdd<'m>) -> Result<()> {
        *self = self.for_all(varset)?;
        Ok(())
    }

    // ─── Quantification ─────────────────────────────────────────────────────

    /// `∃ varset. self`
    pub fn exist(&self, varset: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.binary(varset, |k, r, vs| k.exist(r, vs))
    }

    /// `∀ varset. self`
    pub fn for_all(&self, varset: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.binary(varset, |k, r, vs| k.forall(r, vs))
    }

    /// Existentially quantify every variable not in `varset`.
    pub fn project(&self, varset: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.binary(varset, |k, r, vs| k.project(r, vs))
    }

    /// Cofactor by a cube of literals.
    pub fn restrict(&self, cube: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.binary(cube, |k, r, c| k.restrict(r, c))
    }

    /// Whether `self` depends on any variable of `varset`.
    pub fn tests_vars(&self, varset: &Bdd<'m>) -> Result<bool> {
        self.manager.check_owner(varset)?;
        let vs = varset.node;
        self.query(|k, r| {
            k.check(vs)?;
            k.tests_vars(r, vs)
        })
    }

    fn app_quant(
        &self,
        other: &Bdd<'m>,
        op: BddOp,
        varset: &Bdd<'m>,
        is_all: bool,
    ) -> Result<Bdd<'m>> {
        self.manager.check_owner(other)?;
        self.manager.check_owner(varset)?;
        let (l, r, vs) = (self.node, other.node, varset.node);
        self.manager.build(|k| {
            k.check(l)?;
            k.check(r)?;
            k.check(vs)?;
            k.app_quant(l, r, op, vs, is_all)
        })
    }

    /// `∃ varset. self op other`, without building `self op other`.
    pub fn apply_ex(&self, other: &Bdd<'m>, op: BddOp, varset: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.app_quant(other, op, varset, false)
    }

    /// `∀ varset. self op other`, without building `self op other`.
    pub fn apply_all(&self, other: &Bdd<'m>, op: BddOp, varset: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.app_quant(other, op, varset, true)
    }

    /// Relational product `∃ varset. self ∧ other`.
    pub fn rel_prod(&self, other: &Bdd<'m>, varset: &Bdd<'m>) -> Result<Bdd<'m>> {
        self.app_quant(other, BddOp::And, varset, false)
    }

    // ─── Substitution ───────────────────────────────────────────────────────

    /// Rename variables as mapped by `pair`.
    pub fn replace(&self, pair: &Pairing<'m>) -> Result<Bdd<'m>> {
        self.check_pairing(pair)?;
        let slot = pair.slot();
        self.unary(|k, r| k.replace(r, slot))
    }

    /// Image of `self` under the relation `rel`, renamed back by `pair`.
    ///
    /// `pair` must map every level onto itself or the level just above it;
    /// otherwise this fails with `InvalidTransform`.
    pub fn transform(&self, rel: &Bdd<'m>, pair: &Pairing<'m>) -> Result<Bdd<'m>> {
        self.check_pairing(pair)?;
        let slot = pair.slot();
        self.binary(rel, |k, l, r| k.transform(l, r, slot))
    }

    fn check_pairing(&self, pair: &Pairing<'m>) -> Result<()> {
        if std::ptr::eq(self.manager, pair.manager()) {
            Ok(())
        } else {
            Err(BddError::Replace)
        }
    }

    // ─── Satisfying assignments ─────────────────────────────────────────────

    /// Some satisfying cube, preferring false for each tested variable.
    pub fn sat_one(&self) -> Result<Bdd<'m>> {
        self.unary(|k, r| k.sat_one_rec(r))
    }

    /// A satisfying assignment of every declared variable.
    pub fn full_sat_one(&self) -> Result<Bdd<'m>> {
        self.unary(|k, r| k.full_sat_one(r))
    }

    /// A full satisfying assignment chosen deterministically from `seed`.
    pub fn random_full_sat_one(&self, seed: i32) -> Result<Bdd<'m>> {
        self.unary(|k, r| k.random_full_sat_one(r, seed))
    }

    /// A satisfying cube that also tests every variable of `varset`, giving
    /// the variables `self` does not constrain the value `polarity`.
    pub fn sat_one_set(&self, varset: &Bdd<'m>, polarity: bool) -> Result<Bdd<'m>> {
        self.binary(varset, |k, r, vs| k.sat_one_set(r, vs, polarity))
    }

    /// Variables set to true in [`sat_one`](Self::sat_one).
    pub fn min_assignment_bits(&self) -> Result<BitSet> {
        self.query(|k, r| Ok(k.min_assignment_bits(r)))
    }

    /// Whether `self` is a single cube.
    pub fn is_assignment(&self) -> Result<bool> {
        self.query(|k, r| Ok(k.is_assignment(r)))
    }

    // ─── Counting ───────────────────────────────────────────────────────────

    pub fn path_count(&self) -> Result<BigUint> {
        self.query(|k, r| Ok(k.path_count(r)))
    }

    /// Satisfying assignments over all declared variables.
    pub fn sat_count(&self) -> Result<BigUint> {
        self.query(|k, r| Ok(k.sat_count(r)))
    }

    /// Internal nodes reachable from the root.
    pub fn node_count(&self) -> Result<usize> {
        self.query(|k, r| Ok(k.node_count_all(&[r])))
    }

    /// Nodes testing each variable, indexed by variable.
    pub fn var_profile(&self) -> Result<Vec<u32>> {
        self.query(|k, r| Ok(k.var_profile(r)))
    }

    /// The set of variables `self` depends on.
    pub fn support(&self) -> Result<Bdd<'m>> {
        self.unary(|k, r| k.support(r))
    }
}

impl Clone for Bdd<'_> {
    fn clone(&self) -> Self {
        self.manager.retain(self.node);
        self.manager.wrap(self.node)
    }
}

impl Drop for Bdd<'_> {
    fn drop(&mut self) {
        self.manager.release(self.node);
    }
}

impl PartialEq for Bdd<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && std::ptr::eq(self.manager, other.manager)
    }
}

impl Eq for Bdd<'_> {}

impl Hash for Bdd<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}

impl fmt::Debug for Bdd<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bdd({})", self.node)
    }
}

impl fmt::Display for Bdd<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn manager(vars: u32) -> BddManager {
        let mgr = BddManager::init(1000, 1000);
        mgr.set_var_num(vars).unwrap();
        mgr
    }

    #[test]
    fn test_boolean_laws() {
        let mgr = manager(3);
        let x = mgr.ith_var(0).unwrap();
        let y = mgr.ith_var(1).unwrap();

        assert!(x.and(&x.not().unwrap()).unwrap().is_zero());
        assert!(x.or(&x.not().unwrap()).unwrap().is_one());
        assert_eq!(x.not().unwrap().not().unwrap(), x);
        assert_eq!(mgr.nith_var(0).unwrap(), x.not().unwrap());

        let lhs = x.or(&y).unwrap().not().unwrap();
        let rhs = x.not().unwrap().and(&y.not().unwrap()).unwrap();
        assert_eq!(lhs, rhs);

        assert_eq!(mgr.one().ite(&x, &y).unwrap(), x);
        assert_eq!(mgr.zero().ite(&x, &y).unwrap(), y);
    }

    #[test]
    fn test_named_operators_match_apply() {
        let mgr = manager(2);
        let x = mgr.ith_var(0).unwrap();
        let y = mgr.ith_var(1).unwrap();
        assert_eq!(x.xor(&y).unwrap(), x.apply(&y, BddOp::Xor).unwrap());
        assert_eq!(x.imp(&y).unwrap(), x.not().unwrap().or(&y).unwrap());
        assert_eq!(x.inv_imp(&y).unwrap(), y.imp(&x).unwrap());
        assert_eq!(x.less(&y).unwrap(), y.diff(&x).unwrap());
        assert_eq!(x.nand(&y).unwrap(), x.and(&y).unwrap().not().unwrap());
        assert_eq!(x.nor(&y).unwrap(), x.or(&y).unwrap().not().unwrap());
        assert_eq!(x.biimp(&y).unwrap(), x.xor(&y).unwrap().not().unwrap());
    }

    #[test]
    fn test_in_place_variants() {
        let mgr = manager(3);
        let mut f = mgr.ith_var(0).unwrap();
        f.and_with(mgr.ith_var(1).unwrap()).unwrap();
        f.or_with(mgr.ith_var(2).unwrap()).unwrap();
        let x: Vec<_> = (0..3).map(|v| mgr.ith_var(v).unwrap()).collect();
        let expected = x[0].and(&x[1]).unwrap().or(&x[2]).unwrap();
        assert_eq!(f, expected);
        f.not_with().unwrap();
        assert_eq!(f, expected.not().unwrap());
    }

    #[test]
    fn test_apply_code() {
        let mgr = manager(2);
        let x = mgr.ith_var(0).unwrap();
        let y = mgr.ith_var(1).unwrap();
        assert_eq!(x.apply_code(&y, BddOp::Or.code() as i32).unwrap(), x.or(&y).unwrap());
        assert_eq!(
            x.apply_code(&y, 42).unwrap_err(),
            BddError::Operator { code: 42 }
        );
    }

    #[test]
    fn test_exist_with() {
        let mgr = manager(3);
        let mut f = mgr.ith_var(0).unwrap().and(&mgr.ith_var(1).unwrap()).unwrap();
        f.exist_with(&mgr.make_set(&[0]).unwrap()).unwrap();
        assert_eq!(f, mgr.ith_var(1).unwrap());
        f.for_all_with(&mgr.make_set(&[1]).unwrap()).unwrap();
        assert!(f.is_zero());
    }

    #[test]
    fn test_structure_accessors() {
        let mgr = manager(3);
        let x = mgr.ith_var(1).unwrap();
        assert_eq!(x.var().unwrap(), Var::new(1));
        assert_eq!(x.level().unwrap(), Level::new(1));
        assert!(x.low().unwrap().is_zero());
        assert!(x.high().unwrap().is_one());
        assert!(mgr.one().var().is_err());
    }

    #[test]
    fn test_handles_keep_nodes_alive() {
        let mgr = manager(4);
        let x: Vec<_> = (0..4).map(|v| mgr.ith_var(v).unwrap()).collect();
        let f = x[0].xor(&x[1]).unwrap().and(&x[2]).unwrap();
        let baseline = mgr.node_num();

        let copies: Vec<_> = (0..5).map(|_| f.clone()).collect();
        drop(copies);
        mgr.collect_garbage();
        assert!(mgr.node_num() <= baseline);
        assert!(f.sat_count().is_ok());

        drop(f);
        mgr.collect_garbage();
        assert!(mgr.node_num() < baseline);
    }

    #[test]
    fn test_queries() {
        let mgr = manager(3);
        let x = mgr.ith_var(0).unwrap();
        let y = mgr.ith_var(1).unwrap();
        let f = x.and(&y).unwrap();
        assert_eq!(f.sat_count().unwrap(), BigUint::from(2u32));
        assert_eq!(f.node_count().unwrap(), 2);
        assert_eq!(f.var_profile().unwrap(), vec![1, 1, 0]);
        assert!(f.is_assignment().unwrap());
        assert!(f.and_sat(&x).unwrap());
        assert!(!f.diff_sat(&x).unwrap());
        assert_eq!(f.support().unwrap(), mgr.make_set(&[0, 1]).unwrap());
        assert_eq!(f.min_assignment_bits().unwrap().iter().collect::<Vec<_>>(), vec![0, 1]);
    }
}
