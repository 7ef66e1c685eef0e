use crate::ir::{ValueId, ValueKind};

/// The content of a local variable or operand stack slot.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Entry {
    /// A value of the given kind.
    #[display("{_0}:{_1}")]
    Value(ValueId, ValueKind),
    /// The second slot of a `long` or `double`.
    #[display("<top>")]
    Top,
    /// No value, e.g., an unassigned or invalidated local.
    #[display("<empty>")]
    Empty,
}

impl Entry {
    /// The value held by the slot, if any.
    #[must_use]
    pub const fn value(self) -> Option<ValueId> {
        match self {
            Self::Value(value, _) => Some(value),
            Self::Top | Self::Empty => None,
        }
    }

    /// The kind of the value held by the slot, if any.
    #[must_use]
    pub const fn kind(self) -> Option<ValueKind> {
        match self {
            Self::Value(_, kind) => Some(kind),
            Self::Top | Self::Empty => None,
        }
    }

    pub(super) const fn is_double_word(self) -> bool {
        matches!(self, Self::Value(_, kind) if kind.is_double_word())
    }
}
