use crate::{
    block_map::{BlockMapError, MalformedCode},
    bytecode::{ProgramCounter, ScanError},
    ir::{BlockId, FrameStateError},
    types::MethodRef,
};

/// A reason to give up compiling a method.
///
/// The caller is expected to keep running the method by other means, e.g., in the interpreter.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum Bailout {
    /// The instruction is outside the supported subset.
    #[error("Unsupported bytecode {opcode:#04x} at {pc}")]
    UnsupportedBytecode {
        /// Where the instruction is.
        pc: ProgramCounter,
        /// The opcode.
        opcode: u8,
    },
    /// A `monitorexit` without a matching `monitorenter`.
    #[error("Monitor stack underflow at {0}")]
    MonitorStackUnderflow(ProgramCounter),
    /// A subroutine calls itself.
    #[error("Recursive jsr at {0}")]
    RecursiveJsr(ProgramCounter),
    /// A `ret` that is not inside a subroutine.
    #[error("ret outside of a subroutine at {0}")]
    RetOutsideSubroutine(ProgramCounter),
    /// Nested subroutines disagree on the local holding their return address.
    #[error("Return address local {local} conflicts at {pc}")]
    ReturnAddressConflict {
        /// Where the conflict is detected.
        pc: ProgramCounter,
        /// The local.
        local: u16,
    },
    /// The on-stack-replacement entry is at a position with a non-empty operand stack.
    #[error("OSR entry at {0} with a non-empty stack")]
    OsrWithNonEmptyStack(ProgramCounter),
    /// The on-stack-replacement entry is inside a subroutine.
    #[error("OSR entry at {0} inside a jsr")]
    OsrInJsr(ProgramCounter),
    /// Too many nodes were appended.
    #[error("Method and/or inlining is too large")]
    TooLarge,
    /// The state flowing into a block does not fit its entry state.
    #[error("Block join failed at {block}: {source}")]
    BlockJoinFailed {
        /// The block being entered.
        block: BlockId,
        /// The underlying error.
        source: FrameStateError,
    },
    /// An instruction of an exception handler is covered by the handler itself.
    #[error("Exception handler covers itself at {0}")]
    HandlerCoversItself(ProgramCounter),
    /// The call disagrees with the resolved target about being static.
    #[error("Call to {0} will cause link error")]
    LinkError(MethodRef),
    /// A constant pool entry is missing or of the wrong kind.
    #[error("Unresolvable constant pool entry #{index} at {pc}")]
    UnresolvableConstant {
        /// The referencing instruction.
        pc: ProgramCounter,
        /// The constant pool index.
        index: u16,
    },
    /// The compiled method has no bytecode.
    #[error("Method {0} has no code")]
    MissingMethodBody(MethodRef),
    /// The compiled method is itself replaced by an intrinsic and never runs its bytecode.
    #[error("Method {0} is an intrinsic")]
    IntrinsicRoot(MethodRef),
}

/// An error raised while building the graph of a method.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum BuildError {
    /// The builder gave up on the method.
    #[error(transparent)]
    Bailout(#[from] Bailout),
    /// The bytecode cannot be decoded.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// An instruction does not fit the abstract frame it runs in.
    #[error("Invalid frame state: {0}")]
    FrameState(#[from] FrameStateError),
    /// The bytecode is structurally invalid.
    #[error(transparent)]
    Malformed(#[from] MalformedCode),
}

impl From<BlockMapError> for BuildError {
    fn from(value: BlockMapError) -> Self {
        match value {
            BlockMapError::Scan(it) => Self::Scan(it),
            BlockMapError::Malformed(it) => Self::Malformed(it),
        }
    }
}

impl BuildError {
    /// The message a compilation driver reports when falling back.
    #[must_use]
    pub fn bailout_reason(&self) -> String {
        self.to_string()
    }

    /// Gets the bailout, if the error is one.
    #[must_use]
    pub const fn as_bailout(&self) -> Option<&Bailout> {
        match self {
            Self::Bailout(it) => Some(it),
            _ => None,
        }
    }
}
