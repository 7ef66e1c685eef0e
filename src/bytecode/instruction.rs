use crate::macros::see_jvm_spec;

use super::ProgramCounter;

/// A JVM instruction as it is encoded in the bytecode, with constant pool indices unresolved.
#[doc = see_jvm_spec!(6, 5)]
#[repr(u8)]
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RawInstruction {
    Nop = 0x00,
    AConstNull = 0x01,
    IConstM1 = 0x02,
    IConst0 = 0x03,
    IConst1 = 0x04,
    IConst2 = 0x05,
    IConst3 = 0x06,
    IConst4 = 0x07,
    IConst5 = 0x08,
    LConst0 = 0x09,
    LConst1 = 0x0A,
    FConst0 = 0x0B,
    FConst1 = 0x0C,
    FConst2 = 0x0D,
    DConst0 = 0x0E,
    DConst1 = 0x0F,
    BiPush { value: i8 } = 0x10,
    SiPush { value: i16 } = 0x11,
    Ldc { index: u8 } = 0x12,
    LdcW { index: u16 } = 0x13,
    Ldc2W { index: u16 } = 0x14,
    ILoad { index: u8 } = 0x15,
    LLoad { index: u8 } = 0x16,
    FLoad { index: u8 } = 0x17,
    DLoad { index: u8 } = 0x18,
    ALoad { index: u8 } = 0x19,
    ILoad0 = 0x1A,
    ILoad1 = 0x1B,
    ILoad2 = 0x1C,
    ILoad3 = 0x1D,
    LLoad0 = 0x1E,
    LLoad1 = 0x1F,
    LLoad2 = 0x20,
    LLoad3 = 0x21,
    FLoad0 = 0x22,
    FLoad1 = 0x23,
    FLoad2 = 0x24,
    FLoad3 = 0x25,
    DLoad0 = 0x26,
    DLoad1 = 0x27,
    DLoad2 = 0x28,
    DLoad3 = 0x29,
    ALoad0 = 0x2A,
    ALoad1 = 0x2B,
    ALoad2 = 0x2C,
    ALoad3 = 0x2D,
    IALoad = 0x2E,
    LALoad = 0x2F,
    FALoad = 0x30,
    DALoad = 0x31,
    AALoad = 0x32,
    BALoad = 0x33,
    CALoad = 0x34,
    SALoad = 0x35,
    IStore { index: u8 } = 0x36,
    LStore { index: u8 } = 0x37,
    FStore { index: u8 } = 0x38,
    DStore { index: u8 } = 0x39,
    AStore { index: u8 } = 0x3A,
    IStore0 = 0x3B,
    IStore1 = 0x3C,
    IStore2 = 0x3D,
    IStore3 = 0x3E,
    LStore0 = 0x3F,
    LStore1 = 0x40,
    LStore2 = 0x41,
    LStore3 = 0x42,
    FStore0 = 0x43,
    FStore1 = 0x44,
    FStore2 = 0x45,
    FStore3 = 0x46,
    DStore0 = 0x47,
    DStore1 = 0x48,
    DStore2 = 0x49,
    DStore3 = 0x4A,
    AStore0 = 0x4B,
    AStore1 = 0x4C,
    AStore2 = 0x4D,
    AStore3 = 0x4E,
    IAStore = 0x4F,
    LAStore = 0x50,
    FAStore = 0x51,
    DAStore = 0x52,
    AAStore = 0x53,
    BAStore = 0x54,
    CAStore = 0x55,
    SAStore = 0x56,
    Pop = 0x57,
    Pop2 = 0x58,
    Dup = 0x59,
    DupX1 = 0x5A,
    DupX2 = 0x5B,
    Dup2 = 0x5C,
    Dup2X1 = 0x5D,
    Dup2X2 = 0x5E,
    Swap = 0x5F,
    IAdd = 0x60,
    LAdd = 0x61,
    FAdd = 0x62,
    DAdd = 0x63,
    ISub = 0x64,
    LSub = 0x65,
    FSub = 0x66,
    DSub = 0x67,
    IMul = 0x68,
    LMul = 0x69,
    FMul = 0x6A,
    DMul = 0x6B,
    IDiv = 0x6C,
    LDiv = 0x6D,
    FDiv = 0x6E,
    DDiv = 0x6F,
    IRem = 0x70,
    LRem = 0x71,
    FRem = 0x72,
    DRem = 0x73,
    INeg = 0x74,
    LNeg = 0x75,
    FNeg = 0x76,
    DNeg = 0x77,
    IShl = 0x78,
    LShl = 0x79,
    IShr = 0x7A,
    LShr = 0x7B,
    IUShr = 0x7C,
    LUShr = 0x7D,
    IAnd = 0x7E,
    LAnd = 0x7F,
    IOr = 0x80,
    LOr = 0x81,
    IXor = 0x82,
    LXor = 0x83,
    IInc { index: u8, constant: i8 } = 0x84,
    I2L = 0x85,
    I2F = 0x86,
    I2D = 0x87,
    L2I = 0x88,
    L2F = 0x89,
    L2D = 0x8A,
    F2I = 0x8B,
    F2L = 0x8C,
    F2D = 0x8D,
    D2I = 0x8E,
    D2L = 0x8F,
    D2F = 0x90,
    I2B = 0x91,
    I2C = 0x92,
    I2S = 0x93,
    LCmp = 0x94,
    FCmpL = 0x95,
    FCmpG = 0x96,
    DCmpL = 0x97,
    DCmpG = 0x98,
    IfEq { offset: i16 } = 0x99,
    IfNe { offset: i16 } = 0x9A,
    IfLt { offset: i16 } = 0x9B,
    IfGe { offset: i16 } = 0x9C,
    IfGt { offset: i16 } = 0x9D,
    IfLe { offset: i16 } = 0x9E,
    IfICmpEq { offset: i16 } = 0x9F,
    IfICmpNe { offset: i16 } = 0xA0,
    IfICmpLt { offset: i16 } = 0xA1,
    IfICmpGe { offset: i16 } = 0xA2,
    IfICmpGt { offset: i16 } = 0xA3,
    IfICmpLe { offset: i16 } = 0xA4,
    IfACmpEq { offset: i16 } = 0xA5,
    IfACmpNe { offset: i16 } = 0xA6,
    Goto { offset: i16 } = 0xA7,
    Jsr { offset: i16 } = 0xA8,
    Ret { index: u8 } = 0xA9,
    TableSwitch {
        default: i32,
        low: i32,
        high: i32,
        offsets: Vec<i32>,
    } = 0xAA,
    LookupSwitch {
        default: i32,
        pairs: Vec<(i32, i32)>,
    } = 0xAB,
    IReturn = 0xAC,
    LReturn = 0xAD,
    FReturn = 0xAE,
    DReturn = 0xAF,
    AReturn = 0xB0,
    Return = 0xB1,
    GetStatic { index: u16 } = 0xB2,
    PutStatic { index: u16 } = 0xB3,
    GetField { index: u16 } = 0xB4,
    PutField { index: u16 } = 0xB5,
    InvokeVirtual { index: u16 } = 0xB6,
    InvokeSpecial { index: u16 } = 0xB7,
    InvokeStatic { index: u16 } = 0xB8,
    InvokeInterface { index: u16, count: u8 } = 0xB9,
    InvokeDynamic { index: u16 } = 0xBA,
    New { index: u16 } = 0xBB,
    NewArray { atype: u8 } = 0xBC,
    ANewArray { index: u16 } = 0xBD,
    ArrayLength = 0xBE,
    AThrow = 0xBF,
    CheckCast { index: u16 } = 0xC0,
    InstanceOf { index: u16 } = 0xC1,
    MonitorEnter = 0xC2,
    MonitorExit = 0xC3,
    Wide(WideInstruction) = 0xC4,
    MultiANewArray { index: u16, dimensions: u8 } = 0xC5,
    IfNull { offset: i16 } = 0xC6,
    IfNonNull { offset: i16 } = 0xC7,
    GotoW { offset: i32 } = 0xC8,
    JsrW { offset: i32 } = 0xC9,
}

/// An instruction following the `wide` prefix, whose local variable index takes two bytes.
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Eq, Clone)]
#[repr(u8)]
pub enum WideInstruction {
    ILoad { index: u16 } = 0x15,
    LLoad { index: u16 } = 0x16,
    FLoad { index: u16 } = 0x17,
    DLoad { index: u16 } = 0x18,
    ALoad { index: u16 } = 0x19,
    IStore { index: u16 } = 0x36,
    LStore { index: u16 } = 0x37,
    FStore { index: u16 } = 0x38,
    DStore { index: u16 } = 0x39,
    AStore { index: u16 } = 0x3A,
    IInc { index: u16, constant: i16 } = 0x84,
    Ret { index: u16 } = 0xA9,
}

/// A local variable slot written by a store-family instruction or `iinc`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LocalStore {
    /// The slot being written.
    pub index: u16,
    /// Whether the written value is a `long` or `double`, which also occupies `index + 1`.
    pub double_word: bool,
}

impl LocalStore {
    const fn single(index: u16) -> Self {
        Self {
            index,
            double_word: false,
        }
    }

    const fn double(index: u16) -> Self {
        Self {
            index,
            double_word: true,
        }
    }
}

/// The number of padding bytes following a switch opcode at `pc`.
pub(super) const fn switch_padding(pc: ProgramCounter) -> u16 {
    let after_opcode = pc.index() + 1;
    ((4 - after_opcode % 4) % 4) as u16
}

impl RawInstruction {
    /// Gets the opcode.
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        // SAFETY: `Self` is `repr(u8)`, so the discriminant is stored in the first byte.
        unsafe { *std::ptr::from_ref(self).cast::<u8>() }
    }

    /// Checks whether executing this instruction may raise an exception.
    /// Returns may trap because of monitor release and finalizer registration.
    #[must_use]
    pub const fn can_trap(&self) -> bool {
        #[allow(clippy::enum_glob_use)]
        use RawInstruction::*;
        matches!(
            self,
            Ldc { .. }
                | LdcW { .. }
                | Ldc2W { .. }
                | IALoad
                | LALoad
                | FALoad
                | DALoad
                | AALoad
                | BALoad
                | CALoad
                | SALoad
                | IAStore
                | LAStore
                | FAStore
                | DAStore
                | AAStore
                | BAStore
                | CAStore
                | SAStore
                | IDiv
                | LDiv
                | IRem
                | LRem
                | IReturn
                | LReturn
                | FReturn
                | DReturn
                | AReturn
                | Return
                | GetStatic { .. }
                | PutStatic { .. }
                | GetField { .. }
                | PutField { .. }
                | InvokeVirtual { .. }
                | InvokeSpecial { .. }
                | InvokeStatic { .. }
                | InvokeInterface { .. }
                | InvokeDynamic { .. }
                | New { .. }
                | NewArray { .. }
                | ANewArray { .. }
                | ArrayLength
                | AThrow
                | CheckCast { .. }
                | InstanceOf { .. }
                | MonitorEnter
                | MonitorExit
                | MultiANewArray { .. }
        )
    }

    /// The local variable slot written by this instruction, if any.
    #[must_use]
    pub const fn local_store(&self) -> Option<LocalStore> {
        #[allow(clippy::enum_glob_use)]
        use RawInstruction::*;
        let store = match self {
            IStore { index } | FStore { index } | AStore { index } | IInc { index, .. } => {
                LocalStore::single(*index as u16)
            }
            LStore { index } | DStore { index } => LocalStore::double(*index as u16),
            IStore0 | FStore0 | AStore0 => LocalStore::single(0),
            IStore1 | FStore1 | AStore1 => LocalStore::single(1),
            IStore2 | FStore2 | AStore2 => LocalStore::single(2),
            IStore3 | FStore3 | AStore3 => LocalStore::single(3),
            LStore0 | DStore0 => LocalStore::double(0),
            LStore1 | DStore1 => LocalStore::double(1),
            LStore2 | DStore2 => LocalStore::double(2),
            LStore3 | DStore3 => LocalStore::double(3),
            Wide(wide) => match wide {
                WideInstruction::IStore { index }
                | WideInstruction::FStore { index }
                | WideInstruction::AStore { index }
                | WideInstruction::IInc { index, .. } => LocalStore::single(*index),
                WideInstruction::LStore { index } | WideInstruction::DStore { index } => {
                    LocalStore::double(*index)
                }
                _ => return None,
            },
            _ => return None,
        };
        Some(store)
    }

    /// Returns the number of bytes the instruction occupies when placed at `pc`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn encoded_len(&self, pc: ProgramCounter) -> u16 {
        #[allow(clippy::enum_glob_use)]
        use RawInstruction::*;

        match self {
            BiPush { .. }
            | Ldc { .. }
            | ILoad { .. }
            | LLoad { .. }
            | FLoad { .. }
            | DLoad { .. }
            | ALoad { .. }
            | IStore { .. }
            | LStore { .. }
            | FStore { .. }
            | DStore { .. }
            | AStore { .. }
            | NewArray { .. }
            | Ret { .. } => 2,

            SiPush { .. }
            | LdcW { .. }
            | Ldc2W { .. }
            | IInc { .. }
            | IfEq { .. }
            | IfNe { .. }
            | IfLt { .. }
            | IfGe { .. }
            | IfGt { .. }
            | IfLe { .. }
            | IfICmpEq { .. }
            | IfICmpNe { .. }
            | IfICmpLt { .. }
            | IfICmpGe { .. }
            | IfICmpGt { .. }
            | IfICmpLe { .. }
            | IfACmpEq { .. }
            | IfACmpNe { .. }
            | IfNull { .. }
            | IfNonNull { .. }
            | Goto { .. }
            | Jsr { .. }
            | GetStatic { .. }
            | PutStatic { .. }
            | GetField { .. }
            | PutField { .. }
            | InvokeVirtual { .. }
            | InvokeSpecial { .. }
            | InvokeStatic { .. }
            | New { .. }
            | ANewArray { .. }
            | CheckCast { .. }
            | InstanceOf { .. } => 3,

            MultiANewArray { .. } => 4,

            InvokeInterface { .. } | InvokeDynamic { .. } | GotoW { .. } | JsrW { .. } => 5,

            Wide(WideInstruction::IInc { .. }) => 6,
            Wide(_) => 4,

            // opcode, padding, default, low, high, and one offset per case
            TableSwitch { offsets, .. } => 1 + switch_padding(pc) + 12 + 4 * offsets.len() as u16,
            // opcode, padding, default, npairs, and one (key, offset) pair per case
            LookupSwitch { pairs, .. } => 1 + switch_padding(pc) + 8 + 8 * pairs.len() as u16,

            _ => 1,
        }
    }
}

impl WideInstruction {
    /// Gets the opcode of the modified instruction.
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        // SAFETY: `Self` is `repr(u8)`, so the discriminant is stored in the first byte.
        unsafe { *std::ptr::from_ref(self).cast::<u8>() }
    }
}
