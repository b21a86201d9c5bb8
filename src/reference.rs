use std::fmt::{Display, Formatter};

/// Index of a node in the node table.
///
/// Ids 0 and 1 are the FALSE and TRUE terminals. There are no complemented
/// edges: negation builds a new node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ref(u32);

impl Ref {
    pub const ZERO: Ref = Ref(0);
    pub const ONE: Ref = Ref(1);
    /// In-band sentinel. A node whose `low` is `INVALID` is a dead slot.
    pub const INVALID: Ref = Ref(u32::MAX);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the raw id.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Return the index of the reference.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_one(self) -> bool {
        self.0 == 1
    }

    pub const fn is_const(self) -> bool {
        self.0 < 2
    }

    pub const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }

    /// Terminal for a Boolean value.
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Ref::ZERO => write!(f, "@0"),
            Ref::ONE => write!(f, "@1"),
            Ref::INVALID => write!(f, "@invalid"),
            Ref(i) => write!(f, "@{}", i),
        }
    }
}
