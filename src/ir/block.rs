use std::sync::Arc;

use bitflags::bitflags;
use itertools::Itertools;

use super::{FrameState, ValueId};
use crate::bytecode::ProgramCounter;

/// An identifier of a basic block in an [`IrGraph`](super::IrGraph).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[display("B{_0}")]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// The position of the block in [`IrGraph::blocks`](super::IrGraph::blocks).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Properties of a basic block.
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
    pub struct BlockFlags: u16 {
        /// The block is the entry for normal invocations.
        const STANDARD_ENTRY = 1 << 0;
        /// The block is the entry for on-stack replacement.
        const OSR_ENTRY = 1 << 1;
        /// The block starts an exception handler.
        const EXCEPTION_ENTRY = 1 << 2;
        /// The block starts a subroutine called with `jsr`.
        const SUBROUTINE_ENTRY = 1 << 3;
        /// The block is the target of a back edge.
        const LOOP_HEADER = 1 << 4;
        /// The block waits on a work list.
        const ON_WORK_LIST = 1 << 5;
        /// The bytecode of the block has been translated.
        const WAS_VISITED = 1 << 6;
        /// The block releases the monitor of a synchronized method and rethrows.
        const DEFAULT_EXCEPTION_HANDLER = 1 << 7;
        /// The block was inserted to split a critical edge.
        const CRITICAL_EDGE_SPLIT = 1 << 8;
    }
}

/// A comparison used by conditional branches.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Condition {
    /// `x == y`
    #[display("==")]
    Equal,
    /// `x != y`
    #[display("!=")]
    NotEqual,
    /// `x < y`
    #[display("<")]
    LessThan,
    /// `x >= y`
    #[display(">=")]
    GreaterOrEqual,
    /// `x > y`
    #[display(">")]
    GreaterThan,
    /// `x <= y`
    #[display("<=")]
    LessOrEqual,
}

impl Condition {
    /// The condition that holds exactly when `self` does not.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::LessThan => Self::GreaterOrEqual,
            Self::GreaterOrEqual => Self::LessThan,
            Self::GreaterThan => Self::LessOrEqual,
            Self::LessOrEqual => Self::GreaterThan,
        }
    }

    /// The condition `c` such that `y c x` is `x self y`.
    #[must_use]
    pub const fn mirror(self) -> Self {
        match self {
            Self::Equal => Self::Equal,
            Self::NotEqual => Self::NotEqual,
            Self::LessThan => Self::GreaterThan,
            Self::GreaterOrEqual => Self::LessOrEqual,
            Self::GreaterThan => Self::LessThan,
            Self::LessOrEqual => Self::GreaterOrEqual,
        }
    }

    /// Evaluates the condition on two integers.
    #[must_use]
    pub fn holds<T: Ord>(self, x: &T, y: &T) -> bool {
        match self {
            Self::Equal => x == y,
            Self::NotEqual => x != y,
            Self::LessThan => x < y,
            Self::GreaterOrEqual => x >= y,
            Self::GreaterThan => x > y,
            Self::LessOrEqual => x <= y,
        }
    }
}

/// The instruction ending a basic block.
#[derive(Debug, PartialEq, Eq, Clone, derive_more::Display)]
pub enum Terminator {
    /// Jumps to `successor`.
    #[display("goto {successor}")]
    Goto {
        /// The target.
        successor: BlockId,
        /// Whether the jump may pause for a safepoint, i.e., it is a backward branch.
        safepoint: bool,
    },
    /// Jumps to `true_successor` if `x condition y`, otherwise to `false_successor`.
    #[display("if {x} {condition} {y} then {true_successor} else {false_successor}")]
    If {
        /// The left operand.
        x: ValueId,
        /// The comparison.
        condition: Condition,
        /// The right operand.
        y: ValueId,
        /// The target if the condition holds.
        true_successor: BlockId,
        /// The target otherwise.
        false_successor: BlockId,
        /// Whether either target lies before the branch in the bytecode.
        backward: bool,
    },
    /// Jumps to `successors[value - low]` or to the last successor if out of range.
    #[display("tableswitch {value} [{}]", successors.iter().join(", "))]
    TableSwitch {
        /// The switched value.
        value: ValueId,
        /// The key of the first case.
        low: i32,
        /// The case targets followed by the default target.
        successors: Vec<BlockId>,
        /// Whether any target lies before the switch in the bytecode.
        backward: bool,
    },
    /// Jumps to the target of the matching key or to the last successor.
    #[display("lookupswitch {value} [{}]", successors.iter().join(", "))]
    LookupSwitch {
        /// The switched value.
        value: ValueId,
        /// The case keys.
        keys: Vec<i32>,
        /// The case targets followed by the default target.
        successors: Vec<BlockId>,
        /// Whether any target lies before the switch in the bytecode.
        backward: bool,
    },
    /// Returns from the compiled method.
    #[display("return{}", value.map(|it| format!(" {it}")).unwrap_or_default())]
    Return {
        /// The returned value, [`None`] for `void` methods.
        value: Option<ValueId>,
    },
    /// Throws `exception`.
    #[display("throw {exception}")]
    Throw {
        /// The thrown object.
        exception: ValueId,
    },
    /// Ends the synthetic start block and selects the entry.
    #[display("base {standard_entry}{}", osr_entry.map(|it| format!(", osr {it}")).unwrap_or_default())]
    Base {
        /// The entry of normal invocations.
        standard_entry: BlockId,
        /// The entry of on-stack replacement.
        osr_entry: Option<BlockId>,
    },
}

impl Terminator {
    /// The blocks control may continue at, in case order with defaults last.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Goto { successor, .. } => vec![*successor],
            Self::If {
                true_successor,
                false_successor,
                ..
            } => vec![*true_successor, *false_successor],
            Self::TableSwitch { successors, .. } | Self::LookupSwitch { successors, .. } => {
                successors.clone()
            }
            Self::Return { .. } | Self::Throw { .. } => Vec::new(),
            Self::Base {
                standard_entry,
                osr_entry,
            } => std::iter::once(*standard_entry).chain(*osr_entry).collect(),
        }
    }

    /// The values used as operands.
    #[must_use]
    pub fn inputs(&self) -> Vec<ValueId> {
        match self {
            Self::If { x, y, .. } => vec![*x, *y],
            Self::TableSwitch { value, .. } | Self::LookupSwitch { value, .. } => vec![*value],
            Self::Return { value } => value.iter().copied().collect(),
            Self::Throw { exception } => vec![*exception],
            Self::Goto { .. } | Self::Base { .. } => Vec::new(),
        }
    }

    /// Checks whether the terminator leaves the method.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(self, Self::Return { .. } | Self::Throw { .. })
    }
}

/// The end of a basic block with the frame state control leaves it with.
#[derive(Debug, PartialEq, Clone)]
pub struct BlockEnd {
    /// Where the block ends.
    pub terminator: Terminator,
    /// The bytecode position of the ending instruction, [`None`] for synthetic blocks.
    pub bci: Option<ProgramCounter>,
    /// The state after the ending instruction consumed its operands.
    pub state_after: Arc<FrameState>,
}

/// A basic block of the built graph.
#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    /// The identifier.
    pub id: BlockId,
    /// The bytecode position of the first instruction.
    pub bci: ProgramCounter,
    /// The properties.
    pub flags: BlockFlags,
    /// The reverse post-order number assigned by the block map, if the block was discovered there.
    pub depth_first_number: Option<u32>,
    /// The blocks control may arrive from, including blocks throwing to this handler.
    pub predecessors: Vec<BlockId>,
    /// The handlers entered when an instruction of this block throws.
    pub exception_handlers: Vec<BlockId>,
    /// The appended value nodes in execution order.
    pub instructions: Vec<ValueId>,
    /// The ending instruction, set once the block is translated.
    pub end: Option<BlockEnd>,
    /// The merged frame state at entry.
    pub state_before: Option<FrameState>,
}

impl Block {
    pub(crate) fn new(id: BlockId, bci: ProgramCounter) -> Self {
        Self {
            id,
            bci,
            flags: BlockFlags::empty(),
            depth_first_number: None,
            predecessors: Vec::new(),
            exception_handlers: Vec::new(),
            instructions: Vec::new(),
            end: None,
            state_before: None,
        }
    }

    /// Checks a flag.
    #[must_use]
    pub const fn is(&self, flag: BlockFlags) -> bool {
        self.flags.contains(flag)
    }

    /// The blocks control may continue at through the terminator.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        self.end
            .as_ref()
            .map(|it| it.terminator.successors())
            .unwrap_or_default()
    }

    pub(crate) fn add_predecessor(&mut self, predecessor: BlockId) {
        self.predecessors.push(predecessor);
    }

    pub(crate) fn add_predecessor_once(&mut self, predecessor: BlockId) {
        if !self.predecessors.contains(&predecessor) {
            self.predecessors.push(predecessor);
        }
    }

    pub(crate) fn add_exception_handler(&mut self, handler: BlockId) {
        if !self.exception_handlers.contains(&handler) {
            self.exception_handlers.push(handler);
        }
    }
}
