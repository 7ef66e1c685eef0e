use trait_gen::trait_gen;

use super::{ProgramCounter, RawInstruction, ScanError, WideInstruction};

/// A decoded instruction together with its position in the code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Decoded {
    /// Where the instruction starts.
    pub pc: ProgramCounter,
    /// The instruction.
    pub instruction: RawInstruction,
    /// Where the next instruction starts.
    pub next_pc: ProgramCounter,
}

impl Decoded {
    /// The target of a branch with the given offset relative to this instruction.
    /// # Errors
    /// See [`ScanError::InvalidOffset`].
    pub fn branch_target(&self, offset: i32) -> Result<ProgramCounter, ScanError> {
        self.pc.offset(offset).map_err(|source| ScanError::InvalidOffset {
            pc: self.pc,
            source,
        })
    }
}

/// A cursor over the bytecode of a method decoding one instruction at a time.
#[derive(Debug, Clone)]
pub struct BytecodeStream<'c> {
    code: &'c [u8],
    cursor: usize,
}

impl<'c> BytecodeStream<'c> {
    /// Creates a stream positioned at the entry point.
    #[must_use]
    pub const fn new(code: &'c [u8]) -> Self {
        Self { code, cursor: 0 }
    }

    /// Creates a stream positioned at `pc`.
    #[must_use]
    pub const fn at(code: &'c [u8], pc: ProgramCounter) -> Self {
        Self {
            code,
            cursor: pc.index(),
        }
    }

    /// The position of the next instruction to decode.
    #[must_use]
    pub fn position(&self) -> ProgramCounter {
        ProgramCounter::try_from(self.cursor).unwrap_or(ProgramCounter::from(u16::MAX))
    }

    /// Checks whether the whole code has been consumed.
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.cursor >= self.code.len()
    }

    /// Decodes the instruction at the cursor without advancing.
    /// # Errors
    /// See [`ScanError`].
    pub fn peek(&self) -> Result<Decoded, ScanError> {
        decode_at(self.code, self.position())
    }
}

impl Iterator for BytecodeStream<'_> {
    type Item = Result<Decoded, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_at_end() {
            return None;
        }
        let decoded = self.peek();
        match &decoded {
            Ok(it) => self.cursor = it.next_pc.index(),
            Err(_) => self.cursor = self.code.len(),
        }
        Some(decoded)
    }
}

struct CodeReader<'c> {
    code: &'c [u8],
    position: usize,
    start: ProgramCounter,
}

impl CodeReader<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8], ScanError> {
        let end = self.position + len;
        let bytes = self
            .code
            .get(self.position..end)
            .ok_or(ScanError::UnexpectedEnd(self.start))?;
        self.position = end;
        Ok(bytes)
    }

    fn decode_value<T: Decodable>(&mut self) -> Result<T, ScanError> {
        T::decode(self)
    }
}

trait Decodable: Sized {
    fn decode(reader: &mut CodeReader<'_>) -> Result<Self, ScanError>;
}

#[trait_gen(T -> u8, u16, u32, i8, i16, i32)]
impl Decodable for T {
    fn decode(reader: &mut CodeReader<'_>) -> Result<Self, ScanError> {
        let mut buf = [0u8; std::mem::size_of::<T>()];
        buf.copy_from_slice(reader.take(std::mem::size_of::<T>())?);
        Ok(T::from_be_bytes(buf))
    }
}

/// Decodes the instruction starting at `pc`.
/// # Errors
/// - [`ScanError::UnexpectedEnd`] if the code ends inside the instruction.
/// - [`ScanError::UnknownOpcode`] or [`ScanError::InvalidWideOpcode`] on an undefined opcode.
/// - [`ScanError::MalformedSwitch`] if a `tableswitch` has inverted bounds.
#[allow(clippy::too_many_lines)]
pub fn decode_at(code: &[u8], pc: ProgramCounter) -> Result<Decoded, ScanError> {
    #[allow(clippy::enum_glob_use)]
    use RawInstruction::*;

    let mut reader = CodeReader {
        code,
        position: pc.index(),
        start: pc,
    };
    let opcode: u8 = reader.decode_value()?;
    let instruction = match opcode {
        0x00 => Nop,
        0x01 => AConstNull,
        0x02 => IConstM1,
        0x03 => IConst0,
        0x04 => IConst1,
        0x05 => IConst2,
        0x06 => IConst3,
        0x07 => IConst4,
        0x08 => IConst5,
        0x09 => LConst0,
        0x0a => LConst1,
        0x0b => FConst0,
        0x0c => FConst1,
        0x0d => FConst2,
        0x0e => DConst0,
        0x0f => DConst1,
        0x10 => BiPush {
            value: reader.decode_value()?,
        },
        0x11 => SiPush {
            value: reader.decode_value()?,
        },
        0x12 => Ldc {
            index: reader.decode_value()?,
        },
        0x13 => LdcW {
            index: reader.decode_value()?,
        },
        0x14 => Ldc2W {
            index: reader.decode_value()?,
        },
        0x15 => ILoad {
            index: reader.decode_value()?,
        },
        0x16 => LLoad {
            index: reader.decode_value()?,
        },
        0x17 => FLoad {
            index: reader.decode_value()?,
        },
        0x18 => DLoad {
            index: reader.decode_value()?,
        },
        0x19 => ALoad {
            index: reader.decode_value()?,
        },
        0x1a => ILoad0,
        0x1b => ILoad1,
        0x1c => ILoad2,
        0x1d => ILoad3,
        0x1e => LLoad0,
        0x1f => LLoad1,
        0x20 => LLoad2,
        0x21 => LLoad3,
        0x22 => FLoad0,
        0x23 => FLoad1,
        0x24 => FLoad2,
        0x25 => FLoad3,
        0x26 => DLoad0,
        0x27 => DLoad1,
        0x28 => DLoad2,
        0x29 => DLoad3,
        0x2a => ALoad0,
        0x2b => ALoad1,
        0x2c => ALoad2,
        0x2d => ALoad3,
        0x2e => IALoad,
        0x2f => LALoad,
        0x30 => FALoad,
        0x31 => DALoad,
        0x32 => AALoad,
        0x33 => BALoad,
        0x34 => CALoad,
        0x35 => SALoad,
        0x36 => IStore {
            index: reader.decode_value()?,
        },
        0x37 => LStore {
            index: reader.decode_value()?,
        },
        0x38 => FStore {
            index: reader.decode_value()?,
        },
        0x39 => DStore {
            index: reader.decode_value()?,
        },
        0x3a => AStore {
            index: reader.decode_value()?,
        },
        0x3b => IStore0,
        0x3c => IStore1,
        0x3d => IStore2,
        0x3e => IStore3,
        0x3f => LStore0,
        0x40 => LStore1,
        0x41 => LStore2,
        0x42 => LStore3,
        0x43 => FStore0,
        0x44 => FStore1,
        0x45 => FStore2,
        0x46 => FStore3,
        0x47 => DStore0,
        0x48 => DStore1,
        0x49 => DStore2,
        0x4a => DStore3,
        0x4b => AStore0,
        0x4c => AStore1,
        0x4d => AStore2,
        0x4e => AStore3,
        0x4f => IAStore,
        0x50 => LAStore,
        0x51 => FAStore,
        0x52 => DAStore,
        0x53 => AAStore,
        0x54 => BAStore,
        0x55 => CAStore,
        0x56 => SAStore,
        0x57 => Pop,
        0x58 => Pop2,
        0x59 => Dup,
        0x5a => DupX1,
        0x5b => DupX2,
        0x5c => Dup2,
        0x5d => Dup2X1,
        0x5e => Dup2X2,
        0x5f => Swap,
        0x60 => IAdd,
        0x61 => LAdd,
        0x62 => FAdd,
        0x63 => DAdd,
        0x64 => ISub,
        0x65 => LSub,
        0x66 => FSub,
        0x67 => DSub,
        0x68 => IMul,
        0x69 => LMul,
        0x6a => FMul,
        0x6b => DMul,
        0x6c => IDiv,
        0x6d => LDiv,
        0x6e => FDiv,
        0x6f => DDiv,
        0x70 => IRem,
        0x71 => LRem,
        0x72 => FRem,
        0x73 => DRem,
        0x74 => INeg,
        0x75 => LNeg,
        0x76 => FNeg,
        0x77 => DNeg,
        0x78 => IShl,
        0x79 => LShl,
        0x7a => IShr,
        0x7b => LShr,
        0x7c => IUShr,
        0x7d => LUShr,
        0x7e => IAnd,
        0x7f => LAnd,
        0x80 => IOr,
        0x81 => LOr,
        0x82 => IXor,
        0x83 => LXor,
        0x84 => IInc {
            index: reader.decode_value()?,
            constant: reader.decode_value()?,
        },
        0x85 => I2L,
        0x86 => I2F,
        0x87 => I2D,
        0x88 => L2I,
        0x89 => L2F,
        0x8a => L2D,
        0x8b => F2I,
        0x8c => F2L,
        0x8d => F2D,
        0x8e => D2I,
        0x8f => D2L,
        0x90 => D2F,
        0x91 => I2B,
        0x92 => I2C,
        0x93 => I2S,
        0x94 => LCmp,
        0x95 => FCmpL,
        0x96 => FCmpG,
        0x97 => DCmpL,
        0x98 => DCmpG,
        0x99 => IfEq {
            offset: reader.decode_value()?,
        },
        0x9a => IfNe {
            offset: reader.decode_value()?,
        },
        0x9b => IfLt {
            offset: reader.decode_value()?,
        },
        0x9c => IfGe {
            offset: reader.decode_value()?,
        },
        0x9d => IfGt {
            offset: reader.decode_value()?,
        },
        0x9e => IfLe {
            offset: reader.decode_value()?,
        },
        0x9f => IfICmpEq {
            offset: reader.decode_value()?,
        },
        0xa0 => IfICmpNe {
            offset: reader.decode_value()?,
        },
        0xa1 => IfICmpLt {
            offset: reader.decode_value()?,
        },
        0xa2 => IfICmpGe {
            offset: reader.decode_value()?,
        },
        0xa3 => IfICmpGt {
            offset: reader.decode_value()?,
        },
        0xa4 => IfICmpLe {
            offset: reader.decode_value()?,
        },
        0xa5 => IfACmpEq {
            offset: reader.decode_value()?,
        },
        0xa6 => IfACmpNe {
            offset: reader.decode_value()?,
        },
        0xa7 => Goto {
            offset: reader.decode_value()?,
        },
        0xa8 => Jsr {
            offset: reader.decode_value()?,
        },
        0xa9 => Ret {
            index: reader.decode_value()?,
        },
        0xaa => {
            while reader.position % 4 != 0 {
                let _padding: u8 = reader.decode_value()?;
            }
            let default = reader.decode_value()?;
            let low: i32 = reader.decode_value()?;
            let high: i32 = reader.decode_value()?;
            if low > high {
                return Err(ScanError::MalformedSwitch(pc));
            }
            let offsets = (low..=high)
                .map(|_| reader.decode_value())
                .collect::<Result<_, _>>()?;
            TableSwitch {
                default,
                low,
                high,
                offsets,
            }
        }
        0xab => {
            while reader.position % 4 != 0 {
                let _padding: u8 = reader.decode_value()?;
            }
            let default = reader.decode_value()?;
            let npairs: u32 = reader.decode_value()?;
            let pairs = (0..npairs)
                .map(|_| -> Result<(i32, i32), ScanError> {
                    Ok((reader.decode_value()?, reader.decode_value()?))
                })
                .collect::<Result<_, _>>()?;
            LookupSwitch { default, pairs }
        }
        0xac => IReturn,
        0xad => LReturn,
        0xae => FReturn,
        0xaf => DReturn,
        0xb0 => AReturn,
        0xb1 => Return,
        0xb2 => GetStatic {
            index: reader.decode_value()?,
        },
        0xb3 => PutStatic {
            index: reader.decode_value()?,
        },
        0xb4 => GetField {
            index: reader.decode_value()?,
        },
        0xb5 => PutField {
            index: reader.decode_value()?,
        },
        0xb6 => InvokeVirtual {
            index: reader.decode_value()?,
        },
        0xb7 => InvokeSpecial {
            index: reader.decode_value()?,
        },
        0xb8 => InvokeStatic {
            index: reader.decode_value()?,
        },
        0xb9 => {
            let index = reader.decode_value()?;
            let count = reader.decode_value()?;
            let _zero: u8 = reader.decode_value()?;
            InvokeInterface { index, count }
        }
        0xba => {
            let index = reader.decode_value()?;
            let _zero: u16 = reader.decode_value()?;
            InvokeDynamic { index }
        }
        0xbb => New {
            index: reader.decode_value()?,
        },
        0xbc => NewArray {
            atype: reader.decode_value()?,
        },
        0xbd => ANewArray {
            index: reader.decode_value()?,
        },
        0xbe => ArrayLength,
        0xbf => AThrow,
        0xc0 => CheckCast {
            index: reader.decode_value()?,
        },
        0xc1 => InstanceOf {
            index: reader.decode_value()?,
        },
        0xc2 => MonitorEnter,
        0xc3 => MonitorExit,
        0xc4 => {
            let wide_opcode: u8 = reader.decode_value()?;
            let wide = match wide_opcode {
                0x15 => WideInstruction::ILoad {
                    index: reader.decode_value()?,
                },
                0x16 => WideInstruction::LLoad {
                    index: reader.decode_value()?,
                },
                0x17 => WideInstruction::FLoad {
                    index: reader.decode_value()?,
                },
                0x18 => WideInstruction::DLoad {
                    index: reader.decode_value()?,
                },
                0x19 => WideInstruction::ALoad {
                    index: reader.decode_value()?,
                },
                0x36 => WideInstruction::IStore {
                    index: reader.decode_value()?,
                },
                0x37 => WideInstruction::LStore {
                    index: reader.decode_value()?,
                },
                0x38 => WideInstruction::FStore {
                    index: reader.decode_value()?,
                },
                0x39 => WideInstruction::DStore {
                    index: reader.decode_value()?,
                },
                0x3a => WideInstruction::AStore {
                    index: reader.decode_value()?,
                },
                0x84 => WideInstruction::IInc {
                    index: reader.decode_value()?,
                    constant: reader.decode_value()?,
                },
                0xa9 => WideInstruction::Ret {
                    index: reader.decode_value()?,
                },
                opcode => return Err(ScanError::InvalidWideOpcode { pc, opcode }),
            };
            Wide(wide)
        }
        0xc5 => MultiANewArray {
            index: reader.decode_value()?,
            dimensions: reader.decode_value()?,
        },
        0xc6 => IfNull {
            offset: reader.decode_value()?,
        },
        0xc7 => IfNonNull {
            offset: reader.decode_value()?,
        },
        0xc8 => GotoW {
            offset: reader.decode_value()?,
        },
        0xc9 => JsrW {
            offset: reader.decode_value()?,
        },
        opcode => return Err(ScanError::UnknownOpcode { pc, opcode }),
    };
    let next_pc = ProgramCounter::try_from(reader.position)
        .map_err(|source| ScanError::InvalidOffset { pc, source })?;
    Ok(Decoded {
        pc,
        instruction,
        next_pc,
    })
}
