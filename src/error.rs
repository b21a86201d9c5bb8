//! Engine errors.
//!
//! Every variant carries a stable negative numeric [code](BddError::code).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BddError {
    /// Out of memory while growing a table.
    Memory,
    /// A variable index outside `0..var_num`.
    UnknownVariable { var: u32, var_num: u32 },
    /// A numeric argument outside its allowed range.
    Range { what: &'static str, value: i64 },
    /// Releasing a reference to a node that holds none.
    Deref { node: u32 },
    /// A variable count outside `1..=MAX_VAR`.
    VarNum { requested: u32 },
    /// An operator code outside the known set.
    Operator { code: i32 },
    /// A variable set that is not a positive cube.
    VarSet,
    /// Trying to lower the number of declared variables.
    DecreaseVarNum { current: u32, requested: u32 },
    /// A replacement that would test a variable twice on one path.
    Replace,
    /// No free node ids remain after collection and growth.
    NodeNum { size: usize },
    /// A node id that does not name a live node.
    IllegalBdd { node: u32 },
    /// Mismatched lengths of parallel variable/BDD lists.
    BitVectorSize { left: usize, right: usize },
    /// A pairing that is not a one-level shift was passed to `transform`.
    InvalidTransform,
}

impl BddError {
    /// Stable numeric code of this error.
    pub fn code(&self) -> i32 {
        match self {
            BddError::Memory => -1,
            BddError::UnknownVariable { .. } => -2,
            BddError::Range { .. } => -3,
            BddError::Deref { .. } => -4,
            BddError::VarNum { .. } => -10,
            BddError::Operator { .. } => -12,
            BddError::VarSet => -13,
            BddError::DecreaseVarNum { .. } => -15,
            BddError::Replace => -16,
            BddError::NodeNum { .. } => -17,
            BddError::IllegalBdd { .. } => -18,
            BddError::BitVectorSize { .. } => -20,
            BddError::InvalidTransform => -23,
        }
    }

    /// Whether the engine is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BddError::Memory | BddError::NodeNum { .. })
    }
}

impl fmt::Display for BddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BddError::Memory => write!(f, "Out of memory"),
            BddError::UnknownVariable { var, var_num } => {
                write!(f, "Unknown variable x{} (declared: {})", var, var_num)
            }
            BddError::Range { what, value } => write!(f, "Value out of range: {} = {}", what, value),
            BddError::Deref { node } => {
                write!(f, "Removing external reference to unknown node @{}", node)
            }
            BddError::VarNum { requested } => {
                write!(f, "Number of variables out of range: {}", requested)
            }
            BddError::Operator { code } => write!(f, "Unknown operator: {}", code),
            BddError::VarSet => write!(f, "Illegal variable set"),
            BddError::DecreaseVarNum { current, requested } => write!(
                f,
                "Trying to decrease the number of variables from {} to {}",
                current, requested
            ),
            BddError::Replace => write!(f, "Trying to replace with variables already in the bdd"),
            BddError::NodeNum { size } => {
                write!(f, "Node table full: no free nodes left among {}", size)
            }
            BddError::IllegalBdd { node } => {
                write!(f, "Unknown BDD - @{} was not in node table", node)
            }
            BddError::BitVectorSize { left, right } => {
                write!(f, "Mismatch in bitvector size: {} vs {}", left, right)
            }
            BddError::InvalidTransform => write!(f, "Input pairing is not valid for transform"),
        }
    }
}

impl std::error::Error for BddError {}

pub type Result<T, E = BddError> = std::result::Result<T, E>;
