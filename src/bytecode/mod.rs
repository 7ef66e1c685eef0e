//! Decoding and encoding of JVM bytecode.
mod assemble;
mod errors;
mod instruction;
mod pc;
mod stream;

pub use assemble::assemble;
pub use errors::ScanError;
pub use instruction::{LocalStore, RawInstruction, WideInstruction};
pub use pc::{InvalidOffset, ProgramCounter};
pub use stream::{BytecodeStream, Decoded, decode_at};
