use itertools::Itertools;

use super::{BlockId, Constant, ValueId, ValueKind};
use crate::types::{ClassRef, FieldRef, FieldType, MethodRef, PrimitiveType};

/// The slot of a frame state a phi merges.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum PhiSlot {
    /// A local variable.
    #[display("local[{_0}]")]
    Local(u16),
    /// An operand stack slot, counted from the bottom.
    #[display("stack[{_0}]")]
    Stack(u16),
}

/// A binary arithmetic operation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ArithmeticOp {
    /// `x + y`
    #[display("+")]
    Add,
    /// `x - y`
    #[display("-")]
    Sub,
    /// `x * y`
    #[display("*")]
    Mul,
    /// `x / y`
    #[display("/")]
    Div,
    /// `x % y`
    #[display("%")]
    Rem,
}

impl ArithmeticOp {
    /// Checks whether `x op y` equals `y op x`.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul)
    }
}

/// A bitwise operation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum LogicOp {
    /// `x & y`
    #[display("&")]
    And,
    /// `x | y`
    #[display("|")]
    Or,
    /// `x ^ y`
    #[display("^")]
    Xor,
}

/// A shift operation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ShiftOp {
    /// `x << y`
    #[display("<<")]
    Shl,
    /// `x >> y`
    #[display(">>")]
    Shr,
    /// `x >>> y`
    #[display(">>>")]
    UShr,
}

/// A three-way comparison pushing -1, 0, or 1.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum CompareOp {
    /// `lcmp`
    #[display("lcmp")]
    LCmp,
    /// `fcmpl`, NaN compares as less.
    #[display("fcmpl")]
    FCmpL,
    /// `fcmpg`, NaN compares as greater.
    #[display("fcmpg")]
    FCmpG,
    /// `dcmpl`, NaN compares as less.
    #[display("dcmpl")]
    DCmpL,
    /// `dcmpg`, NaN compares as greater.
    #[display("dcmpg")]
    DCmpG,
}

/// A primitive conversion.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[allow(missing_docs)]
pub enum Conversion {
    #[display("i2l")]
    I2L,
    #[display("i2f")]
    I2F,
    #[display("i2d")]
    I2D,
    #[display("l2i")]
    L2I,
    #[display("l2f")]
    L2F,
    #[display("l2d")]
    L2D,
    #[display("f2i")]
    F2I,
    #[display("f2l")]
    F2L,
    #[display("f2d")]
    F2D,
    #[display("d2i")]
    D2I,
    #[display("d2l")]
    D2L,
    #[display("d2f")]
    D2F,
    #[display("i2b")]
    I2B,
    #[display("i2c")]
    I2C,
    #[display("i2s")]
    I2S,
}

/// The element type accessed by an array load or store.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[allow(missing_docs)]
pub enum ElementType {
    #[display("int")]
    Int,
    #[display("long")]
    Long,
    #[display("float")]
    Float,
    #[display("double")]
    Double,
    #[display("object")]
    Object,
    /// `byte` or `boolean`, both accessed by `baload` and `bastore`.
    #[display("byte")]
    Byte,
    #[display("char")]
    Char,
    #[display("short")]
    Short,
}

/// How an invocation is dispatched.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[allow(missing_docs)]
pub enum InvokeKind {
    #[display("invokestatic")]
    Static,
    #[display("invokespecial")]
    Special,
    #[display("invokevirtual")]
    Virtual,
    #[display("invokeinterface")]
    Interface,
}

impl InvokeKind {
    /// Checks whether the callee takes a receiver.
    #[must_use]
    pub const fn has_receiver(self) -> bool {
        !matches!(self, Self::Static)
    }
}

/// A method of the JDK whose call is replaced by a dedicated node.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[allow(missing_docs)]
pub enum Intrinsic {
    #[display("Math.abs(D)")]
    DoubleAbs,
    #[display("Math.abs(F)")]
    FloatAbs,
    #[display("Math.abs(I)")]
    IntAbs,
    #[display("Math.abs(J)")]
    LongAbs,
    #[display("Math.sqrt")]
    Sqrt,
    #[display("Math.sin")]
    Sin,
    #[display("Math.cos")]
    Cos,
    #[display("Math.tan")]
    Tan,
    #[display("Math.log")]
    Log,
    #[display("Math.log10")]
    Log10,
    #[display("Float.floatToRawIntBits")]
    FloatToRawIntBits,
    #[display("Float.intBitsToFloat")]
    IntBitsToFloat,
    #[display("Double.doubleToRawLongBits")]
    DoubleToRawLongBits,
    #[display("Double.longBitsToDouble")]
    LongBitsToDouble,
    #[display("System.currentTimeMillis")]
    CurrentTimeMillis,
    #[display("System.nanoTime")]
    NanoTime,
    #[display("System.arraycopy")]
    ArrayCopy,
    #[display("Object.getClass")]
    GetClass,
    #[display("Object.hashCode")]
    HashCode,
    #[display("Thread.currentThread")]
    CurrentThread,
    /// Registers a newly constructed object for finalization.
    #[display("register_finalizer")]
    RegisterFinalizer,
}

/// The operation a value node performs.
#[derive(Debug, PartialEq, Clone, derive_more::Display)]
pub enum Instruction {
    /// A constant.
    #[display("{_0}")]
    Constant(Constant),
    /// A parameter of the root method.
    #[display("{}{index}", if *receiver { "this@" } else { "arg@" })]
    Local {
        /// The local variable slot holding the parameter at entry.
        index: u16,
        /// Whether this is the receiver of an instance method.
        receiver: bool,
    },
    /// The value of a slot that depends on the predecessor control arrived from.
    #[display("phi {block}.{slot}({})", operands.iter().join(", "))]
    Phi {
        /// The block whose entry state holds the phi.
        block: BlockId,
        /// The slot of the entry state.
        slot: PhiSlot,
        /// The distinct values flowing in, in the order they were merged.
        operands: Vec<ValueId>,
    },
    /// `x op y` for numeric operands.
    #[display("{x} {op} {y}")]
    Arithmetic {
        /// The operation.
        op: ArithmeticOp,
        /// The left operand.
        x: ValueId,
        /// The right operand.
        y: ValueId,
    },
    /// `x op y` for integral operands.
    #[display("{x} {op} {y}")]
    Logic {
        /// The operation.
        op: LogicOp,
        /// The left operand.
        x: ValueId,
        /// The right operand.
        y: ValueId,
    },
    /// `x op y` where `y` is the `int` shift distance.
    #[display("{x} {op} {y}")]
    Shift {
        /// The operation.
        op: ShiftOp,
        /// The shifted value.
        x: ValueId,
        /// The distance.
        y: ValueId,
    },
    /// `-x`
    #[display("-{x}")]
    Negate {
        /// The operand.
        x: ValueId,
    },
    /// A primitive conversion.
    #[display("{op} {x}")]
    Convert {
        /// The conversion.
        op: Conversion,
        /// The converted value.
        x: ValueId,
    },
    /// A three-way comparison.
    #[display("{op} {x}, {y}")]
    Compare {
        /// The comparison.
        op: CompareOp,
        /// The left operand.
        x: ValueId,
        /// The right operand.
        y: ValueId,
    },
    /// Reads a field, a static field if `object` is [`None`].
    #[display("{}", object.map_or_else(|| field.to_string(), |it| format!("{it}.{}", field.name)))]
    LoadField {
        /// The object holding the field.
        object: Option<ValueId>,
        /// The field.
        field: FieldRef,
        /// Whether the field was resolved when the graph was built.
        resolved: bool,
    },
    /// Writes a field, a static field if `object` is [`None`].
    #[display("{} = {value}", object.map_or_else(|| field.to_string(), |it| format!("{it}.{}", field.name)))]
    StoreField {
        /// The object holding the field.
        object: Option<ValueId>,
        /// The field.
        field: FieldRef,
        /// The stored value.
        value: ValueId,
        /// Whether the field was resolved when the graph was built.
        resolved: bool,
    },
    /// Reads an array element.
    #[display("{array}[{index}]")]
    LoadIndexed {
        /// The array.
        array: ValueId,
        /// The index.
        index: ValueId,
        /// The element type.
        element: ElementType,
    },
    /// Writes an array element.
    #[display("{array}[{index}] = {value}")]
    StoreIndexed {
        /// The array.
        array: ValueId,
        /// The index.
        index: ValueId,
        /// The stored value.
        value: ValueId,
        /// The element type.
        element: ElementType,
    },
    /// The length of an array.
    #[display("{array}.length")]
    ArrayLength {
        /// The array.
        array: ValueId,
    },
    /// Allocates an instance of a class.
    #[display("new {class}")]
    NewInstance {
        /// The instantiated class.
        class: ClassRef,
    },
    /// Allocates an array of a primitive type.
    #[display("new {element}[{length}]")]
    NewTypeArray {
        /// The element type.
        element: PrimitiveType,
        /// The length.
        length: ValueId,
    },
    /// Allocates an array of references.
    #[display("new {element}[{length}]")]
    NewObjectArray {
        /// The element type.
        element: FieldType,
        /// The length.
        length: ValueId,
    },
    /// Allocates a multi-dimensional array.
    #[display("new {array_type}({})", dimensions.iter().join(", "))]
    NewMultiArray {
        /// The type of the allocated array.
        array_type: FieldType,
        /// The lengths of the allocated dimensions, outermost first.
        dimensions: Vec<ValueId>,
    },
    /// Casts `object` to `target`.
    #[display("checkcast {object} as {target}")]
    CheckCast {
        /// The target type.
        target: FieldType,
        /// The object.
        object: ValueId,
    },
    /// Tests whether `object` is an instance of `target`.
    #[display("{object} instanceof {target}")]
    InstanceOf {
        /// The tested type.
        target: FieldType,
        /// The object.
        object: ValueId,
    },
    /// Acquires the monitor of `object`.
    #[display("monitorenter {object} #{lock}")]
    MonitorEnter {
        /// The object.
        object: ValueId,
        /// The depth of the lock stack after acquiring.
        lock: usize,
    },
    /// Releases the monitor of `object`.
    #[display("monitorexit {object} #{lock}")]
    MonitorExit {
        /// The object.
        object: ValueId,
        /// The depth of the lock stack before releasing.
        lock: usize,
    },
    /// A method call that is neither inlined nor replaced by an intrinsic.
    #[display("{kind} {target}({})", arguments.iter().join(", "))]
    Invoke {
        /// How the call is dispatched after devirtualization.
        kind: InvokeKind,
        /// The called method.
        target: MethodRef,
        /// The arguments, starting with the receiver for instance methods.
        arguments: Vec<ValueId>,
        /// Whether the target was resolved when the graph was built.
        resolved: bool,
    },
    /// A call replaced by a dedicated operation.
    #[display("intrinsic {intrinsic}({})", arguments.iter().join(", "))]
    Intrinsic {
        /// The operation.
        intrinsic: Intrinsic,
        /// The arguments, starting with the receiver for instance methods.
        arguments: Vec<ValueId>,
        /// Whether the operation leaves memory untouched.
        preserves_state: bool,
        /// Whether the operation may throw.
        can_trap: bool,
    },
    /// Throws `NullPointerException` if `object` is `null`.
    #[display("null_check {object}")]
    NullCheck {
        /// The checked reference.
        object: ValueId,
    },
    /// The exception caught by the handler entered by the block.
    #[display("exception_object")]
    ExceptionObject,
    /// The interpreter frame an on-stack-replacement entry starts from.
    #[display("osr_buffer")]
    OsrEntry,
    /// Reads a local variable out of the interpreter frame.
    #[display("{buffer}.local[{index}]")]
    OsrLocal {
        /// The frame, an [`Instruction::OsrEntry`].
        buffer: ValueId,
        /// The local variable slot.
        index: u16,
    },
}

impl Instruction {
    /// The value nodes used as operands.
    #[must_use]
    pub fn inputs(&self) -> Vec<ValueId> {
        match self {
            Self::Constant(_)
            | Self::Local { .. }
            | Self::NewInstance { .. }
            | Self::ExceptionObject
            | Self::OsrEntry
            | Self::LoadField { object: None, .. } => Vec::new(),
            Self::Phi { operands, .. } => operands.clone(),
            Self::Arithmetic { x, y, .. }
            | Self::Logic { x, y, .. }
            | Self::Shift { x, y, .. }
            | Self::Compare { x, y, .. } => vec![*x, *y],
            Self::Negate { x } | Self::Convert { x, .. } => vec![*x],
            Self::LoadField {
                object: Some(object),
                ..
            }
            | Self::CheckCast { object, .. }
            | Self::InstanceOf { object, .. }
            | Self::MonitorEnter { object, .. }
            | Self::MonitorExit { object, .. }
            | Self::NullCheck { object } => vec![*object],
            Self::StoreField { object, value, .. } => object.iter().copied().chain([*value]).collect(),
            Self::LoadIndexed { array, index, .. } => vec![*array, *index],
            Self::StoreIndexed {
                array,
                index,
                value,
                ..
            } => vec![*array, *index, *value],
            Self::ArrayLength { array } => vec![*array],
            Self::NewTypeArray { length, .. } | Self::NewObjectArray { length, .. } => {
                vec![*length]
            }
            Self::NewMultiArray { dimensions, .. } => dimensions.clone(),
            Self::Invoke { arguments, .. } | Self::Intrinsic { arguments, .. } => arguments.clone(),
            Self::OsrLocal { buffer, .. } => vec![*buffer],
        }
    }

    /// Checks whether executing the node, producing a value of `kind`, may throw an exception.
    ///
    /// Only integral division and remainder trap; floating-point ones yield NaN or infinity.
    #[must_use]
    pub fn can_trap(&self, kind: ValueKind) -> bool {
        match self {
            Self::Arithmetic {
                op: ArithmeticOp::Div | ArithmeticOp::Rem,
                ..
            } => matches!(kind, ValueKind::Int | ValueKind::Long),
            Self::Intrinsic { can_trap, .. } => *can_trap,
            Self::LoadField { .. }
            | Self::StoreField { .. }
            | Self::LoadIndexed { .. }
            | Self::StoreIndexed { .. }
            | Self::ArrayLength { .. }
            | Self::NewInstance { .. }
            | Self::NewTypeArray { .. }
            | Self::NewObjectArray { .. }
            | Self::NewMultiArray { .. }
            | Self::CheckCast { .. }
            | Self::MonitorEnter { .. }
            | Self::MonitorExit { .. }
            | Self::Invoke { .. }
            | Self::NullCheck { .. } => true,
            _ => false,
        }
    }

    /// Checks whether the node may write memory observed by other nodes.
    /// Field loads cached before such a node are stale after it.
    #[must_use]
    pub const fn kills_memory(&self) -> bool {
        match self {
            Self::Invoke { .. } | Self::MonitorEnter { .. } | Self::MonitorExit { .. } => true,
            Self::Intrinsic {
                preserves_state, ..
            } => !*preserves_state,
            _ => false,
        }
    }
}
