//! End-to-end tests of the public manager and handle API.

use netbdd::bdd::Bdd;
use netbdd::config::BddConfig;
use netbdd::error::BddError;
use netbdd::manager::BddManager;
use netbdd::ops::BddOp;
use num_bigint::BigUint;
use test_log::test;

fn manager(vars: u32) -> BddManager {
    let mgr = BddManager::init(1000, 1000);
    mgr.set_var_num(vars).unwrap();
    mgr
}

fn vars(mgr: &BddManager) -> Vec<Bdd<'_>> {
    (0..mgr.var_num()).map(|v| mgr.ith_var(v).unwrap()).collect()
}

/// Exactly `k` of the given literals are true.
fn exactly<'m>(mgr: &'m BddManager, xs: &[Bdd<'m>], k: usize) -> Bdd<'m> {
    // counts[j] holds "exactly j of the literals seen so far".
    let mut counts = vec![mgr.one()];
    for x in xs {
        let nx = x.not().unwrap();
        let mut next = Vec::with_capacity(counts.len() + 1);
        for j in 0..=counts.len() {
            let stay = match counts.get(j) {
                Some(c) => c.and(&nx).unwrap(),
                None => mgr.zero(),
            };
            let step = match j.checked_sub(1).and_then(|i| counts.get(i)) {
                Some(c) => c.and(x).unwrap(),
                None => mgr.zero(),
            };
            next.push(stay.or(&step).unwrap());
        }
        counts = next;
    }
    counts.swap_remove(k)
}

// ─── Basic functions ────────────────────────────────────────────────────────────

#[test]
fn conjunction_counts() {
    let mgr = manager(3);
    let x = vars(&mgr);
    let f = x[0].and(&x[1]).unwrap();
    assert_eq!(f.sat_count().unwrap(), BigUint::from(2u32));
    assert_eq!(f.path_count().unwrap(), BigUint::from(1u32));
    // Counts internal nodes only, so the TRUE/FALSE terminals are not
    // included: two nodes here, not three.
    assert_eq!(f.node_count().unwrap(), 2);
}

#[test]
fn xor_full_assignment_tests_every_variable() {
    let mgr = manager(3);
    let x = vars(&mgr);
    let f = x[0].xor(&x[1]).unwrap();
    let sat = f.full_sat_one().unwrap();
    assert!(sat.is_assignment().unwrap());
    assert_eq!(sat.support().unwrap(), mgr.make_set(&[0, 1, 2]).unwrap());
    assert!(sat.imp(&f).unwrap().is_one());
    assert_eq!(sat.sat_count().unwrap(), BigUint::from(1u32));
}

#[test]
fn and_all_matches_chained_and() {
    let mgr = manager(3);
    let x = vars(&mgr);
    let chained = x[0].and(&x[1]).unwrap().and(&x[2]).unwrap();
    assert_eq!(mgr.and_all(&x).unwrap(), chained);
    let chained = x[0].or(&x[1]).unwrap().or(&x[2]).unwrap();
    assert_eq!(mgr.or_all(&x).unwrap(), chained);
}

#[test]
fn apply_code_covers_every_operator() {
    let mgr = manager(2);
    let x = vars(&mgr);
    for op in BddOp::ALL {
        assert_eq!(
            x[0].apply_code(&x[1], op.code() as i32).unwrap(),
            x[0].apply(&x[1], op).unwrap()
        );
    }
    assert!(matches!(
        x[0].apply_code(&x[1], 17),
        Err(BddError::Operator { code: 17 })
    ));
}

#[test]
fn exactly_two_of_six() {
    let mgr = manager(6);
    let x = vars(&mgr);
    let f = exactly(&mgr, &x, 2);
    assert_eq!(f.sat_count().unwrap(), BigUint::from(15u32));
    assert!(f.path_count().unwrap() <= f.sat_count().unwrap());
}

// ─── Quantification ─────────────────────────────────────────────────────────────

#[test]
fn exist_is_disjunction_of_cofactors() {
    let mgr = manager(4);
    let x = vars(&mgr);
    let f = exactly(&mgr, &x, 2);
    let vs = mgr.make_set(&[1]).unwrap();

    let pos = f.restrict(&x[1]).unwrap();
    let neg = f.restrict(&mgr.nith_var(1).unwrap()).unwrap();
    assert_eq!(f.exist(&vs).unwrap(), pos.or(&neg).unwrap());
    assert_eq!(f.for_all(&vs).unwrap(), pos.and(&neg).unwrap());
}

#[test]
fn forall_is_dual_of_exist() {
    let mgr = manager(5);
    let x = vars(&mgr);
    let f = x[0].xor(&x[2]).unwrap().or(&x[3].and(&x[4]).unwrap()).unwrap();
    let vs = mgr.make_set(&[2, 4]).unwrap();
    let lhs = f.for_all(&vs).unwrap();
    let rhs = f.not().unwrap().exist(&vs).unwrap().not().unwrap();
    assert_eq!(lhs, rhs);
}

#[test]
fn rel_prod_and_apply_quantifiers() {
    let mgr = manager(4);
    let x = vars(&mgr);
    let f = x[0].or(&x[1]).unwrap();
    let g = x[1].xor(&x[2]).unwrap().and(&x[3]).unwrap();
    let vs = mgr.make_set(&[1, 3]).unwrap();

    let conj = f.and(&g).unwrap();
    assert_eq!(f.rel_prod(&g, &vs).unwrap(), conj.exist(&vs).unwrap());

    for op in [BddOp::Or, BddOp::Xor, BddOp::Imp] {
        let combined = f.apply(&g, op).unwrap();
        assert_eq!(f.apply_ex(&g, op, &vs).unwrap(), combined.exist(&vs).unwrap());
        assert_eq!(f.apply_all(&g, op, &vs).unwrap(), combined.for_all(&vs).unwrap());
    }
}

#[test]
fn project_keeps_only_listed_variables() {
    let mgr = manager(3);
    let x = vars(&mgr);
    let f = x[0].and(&x[1]).unwrap().and(&x[2]).unwrap();
    let kept = mgr.make_set(&[1]).unwrap();
    assert_eq!(f.project(&kept).unwrap(), x[1]);
    assert!(f.tests_vars(&kept).unwrap());
    assert!(!x[0].tests_vars(&kept).unwrap());
}

#[test]
fn malformed_varset_is_rejected() {
    let mgr = manager(3);
    let x = vars(&mgr);
    let not_a_set = x[0].or(&x[1]).unwrap();
    assert!(matches!(x[2].exist(&not_a_set), Err(BddError::VarSet)));
}

// ─── Substitution ───────────────────────────────────────────────────────────────

#[test]
fn swap_pairing_round_trips() {
    let mgr = manager(3);
    let x = vars(&mgr);
    let f = x[0].and(&x[1].not().unwrap()).unwrap();
    let swap = mgr.make_pair_from(&[(0, 1), (1, 0)]).unwrap();

    let g = f.replace(&swap).unwrap();
    assert_eq!(g, x[1].and(&x[0].not().unwrap()).unwrap());
    assert_eq!(g.replace(&swap).unwrap(), f);

    let mut h = f.clone();
    h.replace_with(&swap).unwrap();
    assert_eq!(h, g);
}

#[test]
fn transform_computes_successor_states() {
    // Even variables are the current state, odd ones the next state.
    let mgr = manager(4);
    let x = vars(&mgr);
    let next_to_current = mgr.make_pair_from(&[(1, 0), (3, 2)]).unwrap();
    assert!(next_to_current.is_valid_for_transform().unwrap());

    // Bit 0 flips, bit 1 is kept.
    let rel = x[0].xor(&x[1]).unwrap().and(&x[2].biimp(&x[3]).unwrap()).unwrap();
    let state = x[0].and(&x[2]).unwrap();
    let image = state.transform(&rel, &next_to_current).unwrap();
    assert_eq!(image, x[0].not().unwrap().and(&x[2]).unwrap());

    // Same result through rel_prod and replace.
    let current = mgr.make_set(&[0, 2]).unwrap();
    let via_relprod = state
        .rel_prod(&rel, &current)
        .unwrap()
        .replace(&next_to_current)
        .unwrap();
    assert_eq!(image, via_relprod);
}

// ─── Memory management ──────────────────────────────────────────────────────────

#[test]
fn dropped_handles_are_reclaimed() {
    let mgr = manager(8);
    let x = vars(&mgr);
    mgr.collect_garbage();
    let baseline = mgr.node_num();

    let f = exactly(&mgr, &x, 3);
    assert!(mgr.node_num() > baseline);
    drop(f);
    mgr.collect_garbage();
    assert_eq!(mgr.node_num(), baseline);
    assert!(mgr.gc_count() >= 2);
}

#[test]
fn small_table_grows_and_agrees_with_large_one() {
    let small = BddManager::with_config(
        BddConfig::default()
            .with_node_capacity(50)
            .with_cache_capacity(10),
    );
    small.set_var_num(10).unwrap();
    let initial = small.node_table_size();

    let large = manager(10);

    let build = |mgr: &BddManager| -> (Vec<BigUint>, usize) {
        let x = vars(mgr);
        // Keep every pairwise conjunction alive so collection cannot help.
        let mut pairs = Vec::new();
        for i in 0..x.len() {
            for j in i + 1..x.len() {
                pairs.push(x[i].and(&x[j]).unwrap());
            }
        }
        let f = exactly(mgr, &x, 3);
        let g = mgr.or_all(&pairs).unwrap();
        let counts = vec![f.sat_count().unwrap(), g.sat_count().unwrap()];
        let size = mgr.node_count_all(&[f, g]).unwrap();
        (counts, size)
    };

    let (small_counts, small_size) = build(&small);
    let (large_counts, large_size) = build(&large);
    assert_eq!(small_counts, large_counts);
    assert_eq!(small_size, large_size);
    assert_eq!(small_counts[0], BigUint::from(120u32));
    assert!(small.node_table_size() > initial);
    assert!(!small.is_failed());
}

#[test]
fn bounded_table_fails_cleanly() {
    let mgr = BddManager::with_config(
        BddConfig::default()
            .with_node_capacity(30)
            .with_max_node_capacity(30),
    );
    mgr.set_var_num(8).unwrap();
    let x = vars(&mgr);
    let mut held = Vec::new();
    let mut failure = None;
    'outer: for i in 0..x.len() {
        for j in i + 1..x.len() {
            match x[i].and(&x[j]) {
                Ok(f) => held.push(f),
                Err(err) => {
                    failure = Some(err);
                    break 'outer;
                }
            }
        }
    }
    assert!(matches!(failure, Some(BddError::NodeNum { .. })));
    assert!(mgr.is_failed());
}
