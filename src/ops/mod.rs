//! Recursive BDD algorithms.
//!
//! Each submodule adds an `impl Kernel` block for one algorithm family.
//! All `*_rec` functions assume the caller already started a top-level
//! operation (see [`Kernel::run`](crate::kernel::Kernel)), keep their own
//! intermediate results on the root stack, and return nodes that are not
//! yet externally referenced.

pub mod apply;
pub mod count;
pub mod quant;
pub mod replace;
pub mod sat;

use std::fmt;

use crate::error::{BddError, Result};

/// Binary Boolean connectives.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BddOp {
    And,
    Xor,
    Or,
    Nand,
    Nor,
    /// `l → r`
    Imp,
    /// `l ↔ r`
    Biimp,
    /// `l ∧ ¬r`
    Diff,
    /// `¬l ∧ r`
    Less,
    /// `r → l`
    InvImp,
}

/// Cache tag of negation, which shares the apply cache.
pub(crate) const NOT_TAG: u64 = 10;
/// Cache tag of `and_sat`.
pub(crate) const AND_SAT_TAG: u64 = 12;
/// Cache tag of `diff_sat`.
pub(crate) const DIFF_SAT_TAG: u64 = 13;
/// Multi-op cache tag of if-then-else.
pub(crate) const ITE_TAG: u32 = 14;

impl BddOp {
    pub const ALL: [BddOp; 10] = [
        BddOp::And,
        BddOp::Xor,
        BddOp::Or,
        BddOp::Nand,
        BddOp::Nor,
        BddOp::Imp,
        BddOp::Biimp,
        BddOp::Diff,
        BddOp::Less,
        BddOp::InvImp,
    ];

    /// Stable operator code.
    pub const fn code(self) -> u32 {
        match self {
            BddOp::And => 0,
            BddOp::Xor => 1,
            BddOp::Or => 2,
            BddOp::Nand => 3,
            BddOp::Nor => 4,
            BddOp::Imp => 5,
            BddOp::Biimp => 6,
            BddOp::Diff => 7,
            BddOp::Less => 8,
            BddOp::InvImp => 9,
        }
    }

    /// Operator for a numeric code.
    pub fn from_code(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(BddError::Operator { code })
    }

    /// Truth table, indexed by `l << 1 | r`.
    const fn table(self) -> [bool; 4] {
        match self {
            BddOp::And => [false, false, false, true],
            BddOp::Xor => [false, true, true, false],
            BddOp::Or => [false, true, true, true],
            BddOp::Nand => [true, true, true, false],
            BddOp::Nor => [true, false, false, false],
            BddOp::Imp => [true, true, false, true],
            BddOp::Biimp => [true, false, false, true],
            BddOp::Diff => [false, false, true, false],
            BddOp::Less => [false, true, false, false],
            BddOp::InvImp => [true, false, true, true],
        }
    }

    /// Result of the operator on two constants.
    pub const fn eval(self, l: bool, r: bool) -> bool {
        self.table()[((l as usize) << 1) | r as usize]
    }

    /// Whether swapping the operands leaves the result unchanged.
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            BddOp::And | BddOp::Xor | BddOp::Or | BddOp::Nand | BddOp::Nor | BddOp::Biimp
        )
    }
}

impl fmt::Display for BddOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BddOp::And => "and",
            BddOp::Xor => "xor",
            BddOp::Or => "or",
            BddOp::Nand => "nand",
            BddOp::Nor => "nor",
            BddOp::Imp => "imp",
            BddOp::Biimp => "biimp",
            BddOp::Diff => "diff",
            BddOp::Less => "less",
            BddOp::InvImp => "invimp",
        };
        write!(f, "{}", name)
    }
}
