//! Variable pairings for `replace` and `transform`.
//!
//! A pairing maps every level to a replacement node: the variable node of
//! the substitute variable, or an arbitrary BDD. Each mutation gives the
//! pairing a fresh id so that replace-cache entries computed under its old
//! contents are never hit again.

use std::collections::HashSet;
use std::fmt;

use log::{debug, warn};

use crate::bdd::Bdd;
use crate::error::{BddError, Result};
use crate::kernel::Kernel;
use crate::manager::BddManager;
use crate::reference::Ref;

/// Number of pairing ids available before renumbering.
const PAIR_ID_LIMIT: u32 = u32::MAX >> 3;

/// Contents of one registered pairing.
#[derive(Debug, Clone)]
pub(crate) struct PairSlot {
    pub id: u32,
    /// Deepest level mapped to something other than itself.
    pub last: Option<u32>,
    /// Replacement node per level.
    pub result: Vec<Ref>,
}

impl PairSlot {
    /// Whether `level` lies below every level this pairing touches.
    pub fn is_beyond(&self, level: u32) -> bool {
        self.last.map_or(true, |last| level > last)
    }
}

/// Every live pairing of a manager.
#[derive(Debug)]
pub(crate) struct PairRegistry {
    slots: Vec<Option<PairSlot>>,
    vacant: Vec<usize>,
    next_id: u32,
    pub(crate) id_limit: u32,
    valid_transform: HashSet<u32>,
}

impl Default for PairRegistry {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            next_id: 0,
            id_limit: PAIR_ID_LIMIT,
            valid_transform: HashSet::new(),
        }
    }
}

impl PairRegistry {
    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    pub fn get(&self, slot: usize) -> Option<&PairSlot> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, slot: usize) -> Option<&mut PairSlot> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Hand out a fresh id. Returns `true` as the second component when the
    /// id space ran out and every live pairing was renumbered.
    fn fresh_id(&mut self) -> (u32, bool) {
        self.next_id += 1;
        if self.next_id < self.id_limit {
            return (self.next_id, false);
        }
        warn!("Pairing ids exhausted, renumbering {} pairings", self.len());
        self.next_id = 0;
        for slot in self.slots.iter_mut().flatten() {
            slot.id = self.next_id;
            self.next_id += 1;
        }
        self.valid_transform.clear();
        (self.next_id, true)
    }

    fn insert(&mut self, slot: PairSlot) -> usize {
        match self.vacant.pop() {
            Some(i) => {
                self.slots[i] = Some(slot);
                i
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    fn remove(&mut self, slot: usize) -> Option<PairSlot> {
        let removed = self.slots.get_mut(slot)?.take();
        if removed.is_some() {
            self.vacant.push(slot);
        }
        removed
    }

    /// Extend every pairing with identity entries for levels `old..num`.
    pub fn grow(&mut self, old: u32, num: u32, var_at: impl Fn(u32) -> Ref) {
        for slot in self.slots.iter_mut().flatten() {
            slot.result.extend((old..num).map(&var_at));
        }
    }
}

impl Kernel {
    fn identity_pairing(&self) -> Vec<Ref> {
        (0..self.var_num()).map(|level| self.level_var(level)).collect()
    }

    fn fresh_pair_id(&mut self) -> u32 {
        let (id, renumbered) = self.pairs.fresh_id();
        if renumbered {
            self.caches.replace.reset();
        }
        id
    }

    fn pair_mut(&mut self, slot: usize) -> Result<&mut PairSlot> {
        self.pairs.get_mut(slot).ok_or(BddError::Replace)
    }

    /// Snapshot of a pairing, taken before a replace or transform runs.
    pub(crate) fn pairing(&self, slot: usize) -> Result<PairSlot> {
        self.pairs.get(slot).cloned().ok_or(BddError::Replace)
    }

    pub(crate) fn make_pairing(&mut self) -> usize {
        let result = self.identity_pairing();
        let id = self.fresh_pair_id();
        self.pairs.insert(PairSlot {
            id,
            last: None,
            result,
        })
    }

    /// Map `old_var` to `replacement`, which must already carry a reference
    /// owned by the pairing.
    fn set_pair_entry(&mut self, slot: usize, old_var: u32, replacement: Ref) -> Result<()> {
        self.check_var(old_var)?;
        let level = self.var_to_level(old_var);
        let id = self.fresh_pair_id();
        let pair = self.pair_mut(slot)?;
        let previous = std::mem::replace(&mut pair.result[level as usize], replacement);
        pair.id = id;
        pair.last = Some(pair.last.map_or(level, |last| last.max(level)));
        self.delref(previous)
    }

    pub(crate) fn set_pair(&mut self, slot: usize, old_var: u32, new_var: u32) -> Result<()> {
        self.check_var(old_var)?;
        let replacement = self.ith_var(new_var)?;
        self.set_pair_entry(slot, old_var, replacement)
    }

    pub(crate) fn set_pair_bdd(&mut self, slot: usize, old_var: u32, replacement: Ref) -> Result<()> {
        self.check_var(old_var)?;
        self.check(replacement)?;
        self.addref(replacement);
        if let Err(err) = self.set_pair_entry(slot, old_var, replacement) {
            self.delref(replacement)?;
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn reset_pairing(&mut self, slot: usize) -> Result<()> {
        let identity = self.identity_pairing();
        let id = self.fresh_pair_id();
        let pair = self.pair_mut(slot)?;
        let previous = std::mem::replace(&mut pair.result, identity);
        pair.id = id;
        pair.last = None;
        previous.into_iter().try_for_each(|r| self.delref(r))
    }

    pub(crate) fn free_pairing(&mut self, slot: usize) -> Result<()> {
        match self.pairs.remove(slot) {
            Some(pair) => pair.result.into_iter().try_for_each(|r| self.delref(r)),
            None => Ok(()),
        }
    }

    /// Whether every level maps to itself or to the level right above it.
    ///
    /// The answer is remembered per pairing id.
    pub(crate) fn is_valid_for_transform(&mut self, slot: usize) -> Result<bool> {
        let pair = self.pairs.get(slot).ok_or(BddError::Replace)?;
        if self.pairs.valid_transform.contains(&pair.id) {
            return Ok(true);
        }
        let valid = pair.result.iter().enumerate().all(|(i, &r)| {
            let level = self.level(r) as usize;
            level == i || level + 1 == i
        });
        if valid {
            let id = pair.id;
            self.pairs.valid_transform.insert(id);
        }
        Ok(valid)
    }
}

/// A mutable substitution map, registered with its manager until dropped.
///
/// ```
/// use netbdd::manager::BddManager;
///
/// let mgr = BddManager::init(1000, 1000);
/// mgr.set_var_num(4).unwrap();
/// let mut pair = mgr.make_pair();
/// pair.set(0, 2).unwrap();
/// let x0 = mgr.ith_var(0).unwrap();
/// assert_eq!(x0.replace(&pair).unwrap(), mgr.ith_var(2).unwrap());
/// ```
pub struct Pairing<'m> {
    manager: &'m BddManager,
    slot: usize,
}

impl<'m> Pairing<'m> {
    pub(crate) fn new(manager: &'m BddManager, slot: usize) -> Self {
        Self { manager, slot }
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub fn manager(&self) -> &'m BddManager {
        self.manager
    }

    /// Substitute variable `new_var` for `old_var`.
    pub fn set(&mut self, old_var: u32, new_var: u32) -> Result<()> {
        self.manager
            .with_kernel(|k| k.set_pair(self.slot, old_var, new_var))
    }

    /// Substitute every `(old, new)` pair in turn.
    pub fn set_pairs(&mut self, pairs: &[(u32, u32)]) -> Result<()> {
        pairs.iter().try_for_each(|&(old, new)| self.set(old, new))
    }

    /// Map `old_var` to the node `replacement`. `replace` renames to the
    /// variable tested at its root; the pairing holds a reference on it.
    pub fn set_bdd(&mut self, old_var: u32, replacement: &Bdd<'m>) -> Result<()> {
        self.manager.check_owner(replacement)?;
        self.manager
            .with_kernel(|k| k.set_pair_bdd(self.slot, old_var, replacement.node()))
    }

    /// Restore the identity mapping.
    pub fn reset(&mut self) -> Result<()> {
        self.manager.with_kernel(|k| k.reset_pairing(self.slot))
    }

    pub fn is_valid_for_transform(&self) -> Result<bool> {
        self.manager
            .with_kernel(|k| k.is_valid_for_transform(self.slot))
    }
}

impl Drop for Pairing<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.manager.with_kernel(|k| k.free_pairing(self.slot)) {
            debug!("Failed to release pairing #{}: {}", self.slot, err);
        }
    }
}

impl fmt::Debug for Pairing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pairing#{}{}", self.slot, self)
    }
}

/// Lists the non-identity entries as `{old=new, ...}`, with `new` a variable
/// (`x3`) or a node (`@17`).
impl fmt::Display for Pairing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.manager.inspect(|k| {
            let Some(pair) = k.pairs.get(self.slot) else {
                return Vec::new();
            };
            pair.result
                .iter()
                .enumerate()
                .filter(|&(level, &r)| r != k.level_var(level as u32))
                .map(|(level, &r)| {
                    let old = k.level_to_var(level as u32);
                    let target = k.level(r);
                    let new = if target < k.var_num() && k.level_var(target) == r {
                        format!("x{}", k.level_to_var(target))
                    } else {
                        format!("{}", r)
                    };
                    format!("{}={}", old, new)
                })
                .collect::<Vec<_>>()
        });
        write!(f, "{{{}}}", entries.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BddConfig;
    use test_log::test;

    fn kernel(vars: u32) -> Kernel {
        let mut k = Kernel::new(BddConfig::default().with_node_capacity(100));
        k.set_var_num(vars).unwrap();
        k
    }

    #[test]
    fn test_new_pairing_is_identity() {
        let mut k = kernel(3);
        let slot = k.make_pairing();
        let pair = k.pairing(slot).unwrap();
        assert_eq!(pair.last, None);
        assert!(pair.is_beyond(0));
        for level in 0..3 {
            assert_eq!(pair.result[level as usize], k.level_var(level));
        }
    }

    #[test]
    fn test_set_updates_id_and_watermark() {
        let mut k = kernel(4);
        let slot = k.make_pairing();
        let id = k.pairing(slot).unwrap().id;
        k.set_pair(slot, 1, 3).unwrap();
        let pair = k.pairing(slot).unwrap();
        assert_ne!(pair.id, id);
        assert_eq!(pair.last, Some(1));
        assert_eq!(pair.result[1], k.ith_var(3).unwrap());

        assert!(matches!(
            k.set_pair(slot, 7, 0),
            Err(BddError::UnknownVariable { var: 7, .. })
        ));
    }

    #[test]
    fn test_set_bdd_holds_reference() {
        let mut k = kernel(3);
        let x1 = k.ith_var(1).unwrap();
        let x2 = k.ith_var(2).unwrap();
        let f = k.and_rec(x1, x2).unwrap();
        let slot = k.make_pairing();
        k.set_pair_bdd(slot, 0, f).unwrap();
        assert_eq!(k.refcount(f), 1);
        k.reset_pairing(slot).unwrap();
        assert_eq!(k.refcount(f), 0);
        assert_eq!(k.pairing(slot).unwrap().last, None);
    }

    #[test]
    fn test_grow_extends_identity() {
        let mut k = kernel(2);
        let slot = k.make_pairing();
        k.set_var_num(4).unwrap();
        let pair = k.pairing(slot).unwrap();
        assert_eq!(pair.result.len(), 4);
        assert_eq!(pair.result[3], k.ith_var(3).unwrap());
    }

    #[test]
    fn test_id_exhaustion_renumbers_and_resets_replace_cache() {
        use crate::cache::OpKey;

        let mut k = kernel(2);
        k.pairs.id_limit = 4;
        let a = k.make_pairing();
        let b = k.make_pairing();
        k.caches.replace.insert(OpKey::unary(Ref::new(2), 8), Ref::ONE);
        k.set_pair(a, 0, 1).unwrap();
        k.set_pair(b, 0, 1).unwrap();

        let ia = k.pairing(a).unwrap().id;
        let ib = k.pairing(b).unwrap().id;
        assert_ne!(ia, ib);
        assert!(ia < 4 && ib < 4);
        assert!(k.caches.replace.is_empty());
    }

    #[test]
    fn test_transform_validity() {
        let mut k = kernel(3);
        let slot = k.make_pairing();
        assert!(k.is_valid_for_transform(slot).unwrap());
        k.set_pair(slot, 1, 0).unwrap();
        assert!(k.is_valid_for_transform(slot).unwrap());
        k.set_pair(slot, 2, 0).unwrap();
        assert!(!k.is_valid_for_transform(slot).unwrap());
    }

    #[test]
    fn test_free_pairing_releases_slot() {
        let mut k = kernel(2);
        let a = k.make_pairing();
        k.free_pairing(a).unwrap();
        assert_eq!(k.pairs.len(), 0);
        assert!(k.pairing(a).is_err());
        let b = k.make_pairing();
        assert_eq!(a, b);
    }
}
