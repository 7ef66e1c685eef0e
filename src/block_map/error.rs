use crate::bytecode::{ProgramCounter, ScanError};

/// A structural defect of the bytecode that a verifier would reject.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum MalformedCode {
    /// The method has no code.
    #[error("The code is empty")]
    EmptyCode,
    /// Control reaches the end of the code without a return, throw, or jump.
    #[error("Control falls off the end of the code")]
    FallsOffEnd,
    /// A branch target or handler lies outside the code.
    #[error("The block start {0} is outside the code")]
    TargetOutOfRange(ProgramCounter),
    /// A branch target or handler does not start an instruction.
    #[error("The block start {0} is inside an instruction")]
    TargetInsideInstruction(ProgramCounter),
}

/// An error raised while discovering the blocks of a method.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum BlockMapError {
    /// The bytecode cannot be decoded.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// The bytecode is structurally invalid.
    #[error(transparent)]
    Malformed(#[from] MalformedCode),
}
