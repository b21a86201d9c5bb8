//! # netbdd: a reference-counted BDD engine
//!
//! **`netbdd`** represents Boolean functions as **Binary Decision Diagrams**
//! and is built for symbolic packet-header analysis: ACL predicates,
//! reachability sets and transfer relations are encoded over header bits and
//! combined, quantified and renamed instead of enumerated.
//!
//! ## Architecture
//!
//! - **Manager**: a [`BddManager`][crate::manager::BddManager] owns the node
//!   table, seven operation caches and the variable order. Every operation
//!   locks it for its whole duration.
//! - **Handles**: a [`Bdd`][crate::bdd::Bdd] is an external reference to one
//!   node. Cloning bumps the node's reference count, dropping releases it.
//! - **Collection**: when the table runs out of free slots, a mark-sweep
//!   pass reclaims nodes that no handle (and no in-flight operation) can
//!   reach; if too little was freed, the table grows to the next prime size.
//! - **Node ids**: ids 0 and 1 are the constants FALSE and TRUE. There are no
//!   complement edges, so equal functions always have equal ids.
//!
//! ## Basic Usage
//!
//! ```rust
//! use netbdd::manager::BddManager;
//!
//! let mgr = BddManager::init(10_000, 1_000);
//! mgr.set_var_num(4).unwrap();
//!
//! let x0 = mgr.ith_var(0).unwrap();
//! let x1 = mgr.ith_var(1).unwrap();
//! let f = x0.and(&x1.not().unwrap()).unwrap();
//!
//! assert!(!f.is_zero());
//! assert_eq!(f.sat_count().unwrap(), 4u32.into());
//!
//! // Rename x0 to x2.
//! let mut pair = mgr.make_pair();
//! pair.set(0, 2).unwrap();
//! let g = f.replace(&pair).unwrap();
//! assert_eq!(g, mgr.ith_var(2).unwrap().and(&mgr.nith_var(1).unwrap()).unwrap());
//! ```
//!
//! ## Core Components
//!
//! - **[`manager`]** and **[`bdd`]**: the public API.
//! - **[`ops`]**: the recursive algorithms (apply, quantification,
//!   replacement, satisfying assignments, counting).
//! - **[`pairing`]**: substitution maps for `replace` and `transform`.
//! - **[`table`]** and **[`cache`]**: the unique table and memoization.
//! - **[`debug`]**: read-only dumps and statistics.

pub mod bdd;
pub mod bitset;
pub mod cache;
pub mod config;
pub mod debug;
pub mod error;
mod gc;
mod kernel;
pub mod manager;
pub mod node;
pub mod ops;
pub mod pairing;
pub mod reference;
pub mod table;
pub mod types;
pub mod utils;

pub use kernel::{GcStats, MAX_VAR};
