//! The high-level intermediate representation produced by the graph builder.
//!
//! A method becomes an [`IrGraph`] of [`Block`]s. Each block holds the [`Value`] nodes it
//! executes in order and ends with a [`Terminator`]. Values at control-flow joins are
//! [`Instruction::Phi`] nodes owned by the entry [`FrameState`] of the joining block.
mod assumptions;
mod block;
pub(crate) mod frame_state;
mod graph;
mod instruction;
mod value;

#[cfg(feature = "petgraph")]
#[cfg_attr(docsrs, doc(cfg(feature = "petgraph")))]
pub mod petgraph;

pub use assumptions::{Assumption, Assumptions};
pub use block::{Block, BlockEnd, BlockFlags, BlockId, Condition, Terminator};
pub use frame_state::{Entry, FrameState, FrameStateError};
pub use graph::IrGraph;
pub use instruction::{
    ArithmeticOp, CompareOp, Conversion, ElementType, Instruction, Intrinsic, InvokeKind,
    LogicOp, PhiSlot, ShiftOp,
};
pub use value::{Constant, Value, ValueId, ValueKind};
