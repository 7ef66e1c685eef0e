use std::{
    fmt::Display,
    hash::{Hash, Hasher},
    sync::Arc,
};

use super::{BlockId, FrameState, Instruction};
use crate::{
    bytecode::ProgramCounter,
    types::{ClassRef, FieldType, PrimitiveType, ReturnType},
};

/// An identifier of a value node in an [`IrGraph`](super::IrGraph).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[display("v{_0}")]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    /// The position of the value in [`IrGraph::values`](super::IrGraph::values).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The computational kind of a value, i.e., what it holds at runtime.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ValueKind {
    /// `int` and the narrower integral types.
    #[display("int")]
    Int,
    /// `long`.
    #[display("long")]
    Long,
    /// `float`.
    #[display("float")]
    Float,
    /// `double`.
    #[display("double")]
    Double,
    /// A reference.
    #[display("object")]
    Object,
    /// A machine word, e.g., a pointer to the interpreter frame.
    #[display("word")]
    Word,
    /// A return address pushed by `jsr`.
    #[display("address")]
    ReturnAddress,
    /// No value.
    #[display("void")]
    Void,
}

impl ValueKind {
    /// Checks whether the value takes two local variable or operand stack slots.
    #[must_use]
    pub const fn is_double_word(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }

    /// The kind of values of a primitive type.
    #[must_use]
    pub const fn of_primitive(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Boolean
            | PrimitiveType::Char
            | PrimitiveType::Byte
            | PrimitiveType::Short
            | PrimitiveType::Int => Self::Int,
            PrimitiveType::Long => Self::Long,
            PrimitiveType::Float => Self::Float,
            PrimitiveType::Double => Self::Double,
        }
    }
}

impl From<&FieldType> for ValueKind {
    fn from(value: &FieldType) -> Self {
        match value {
            FieldType::Base(primitive) => Self::of_primitive(*primitive),
            FieldType::Object(_) | FieldType::Array(_) => Self::Object,
        }
    }
}

impl From<&ReturnType> for ValueKind {
    fn from(value: &ReturnType) -> Self {
        match value {
            ReturnType::Some(field_type) => field_type.into(),
            ReturnType::Void => Self::Void,
        }
    }
}

/// A compile-time constant.
///
/// Floating point constants are compared by their bits, so `NaN` equals itself and `0.0`
/// differs from `-0.0`.
#[derive(Debug, Clone)]
pub enum Constant {
    /// An `int`.
    Int(i32),
    /// A `long`.
    Long(i64),
    /// A `float`.
    Float(f32),
    /// A `double`.
    Double(f64),
    /// The `null` reference.
    Null,
    /// A string literal.
    String(String),
    /// A class literal.
    Class(ClassRef),
    /// The return address of a `jsr`, i.e., the instruction after it.
    ReturnAddress(ProgramCounter),
}

impl Constant {
    /// The kind of the constant.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Float(_) => ValueKind::Float,
            Self::Double(_) => ValueKind::Double,
            Self::Null | Self::String(_) | Self::Class(_) => ValueKind::Object,
            Self::ReturnAddress(_) => ValueKind::ReturnAddress,
        }
    }

    /// Checks whether the constant is a reference that is not `null`.
    #[must_use]
    pub const fn is_non_null_object(&self) -> bool {
        matches!(self, Self::String(_) | Self::Class(_))
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(lhs), Self::Int(rhs)) => lhs == rhs,
            (Self::Long(lhs), Self::Long(rhs)) => lhs == rhs,
            (Self::Float(lhs), Self::Float(rhs)) => lhs.to_bits() == rhs.to_bits(),
            (Self::Double(lhs), Self::Double(rhs)) => lhs.to_bits() == rhs.to_bits(),
            (Self::Null, Self::Null) => true,
            (Self::String(lhs), Self::String(rhs)) => lhs == rhs,
            (Self::Class(lhs), Self::Class(rhs)) => lhs == rhs,
            (Self::ReturnAddress(lhs), Self::ReturnAddress(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Int(it) => it.hash(state),
            Self::Long(it) => it.hash(state),
            Self::Float(it) => it.to_bits().hash(state),
            Self::Double(it) => it.to_bits().hash(state),
            Self::Null => {}
            Self::String(it) => it.hash(state),
            Self::Class(it) => it.hash(state),
            Self::ReturnAddress(it) => it.hash(state),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(it) => write!(f, "{it}"),
            Self::Long(it) => write!(f, "{it}L"),
            Self::Float(it) => write!(f, "{it:?}F"),
            Self::Double(it) => write!(f, "{it:?}D"),
            Self::Null => write!(f, "null"),
            Self::String(it) => write!(f, "{it:?}"),
            Self::Class(it) => write!(f, "{it}.class"),
            Self::ReturnAddress(it) => write!(f, "ret_addr {it}"),
        }
    }
}

/// A node of the value graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// The kind of the produced value, [`ValueKind::Void`] if nothing is produced.
    pub kind: ValueKind,
    /// What the node computes.
    pub instruction: Instruction,
    /// The bytecode position the node was translated from.
    /// Phis and parameters have none.
    pub bci: Option<ProgramCounter>,
    /// The block the node is appended to. Phis and parameters are not appended.
    pub block: Option<BlockId>,
    /// The frame state right before the node executes,
    /// recorded for nodes that can trap or have side effects.
    pub state_before: Option<Arc<FrameState>>,
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.instruction)
    }
}
