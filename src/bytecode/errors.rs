use super::{InvalidOffset, ProgramCounter};

/// An error raised while decoding or encoding bytecode.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum ScanError {
    /// The code ends in the middle of an instruction.
    #[error("Unexpected end of code while decoding the instruction at {0}")]
    UnexpectedEnd(ProgramCounter),
    /// The opcode is not a known JVM opcode.
    #[error("Unknown opcode {opcode:#04x} at {pc}")]
    UnknownOpcode {
        /// Where the opcode was found.
        pc: ProgramCounter,
        /// The opcode.
        opcode: u8,
    },
    /// The instruction following `wide` cannot be widened.
    #[error("Opcode {opcode:#04x} cannot follow wide at {pc}")]
    InvalidWideOpcode {
        /// Where the `wide` prefix was found.
        pc: ProgramCounter,
        /// The widened opcode.
        opcode: u8,
    },
    /// A `tableswitch` with `low > high`.
    #[error("Malformed tableswitch at {0}")]
    MalformedSwitch(ProgramCounter),
    /// A branch target or instruction position outside the addressable range.
    #[error("Invalid offset at {pc}: {source}")]
    InvalidOffset {
        /// The instruction with the offending offset.
        pc: ProgramCounter,
        /// The underlying error.
        source: InvalidOffset,
    },
}
