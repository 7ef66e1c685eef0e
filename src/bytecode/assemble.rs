use num_traits::ToBytes;

use super::{ProgramCounter, RawInstruction, ScanError, WideInstruction, instruction::switch_padding};

/// Encodes a sequence of instructions into bytecode, laying them out back to back from offset 0.
///
/// Switch padding is computed from the running offset, so the result decodes back into
/// the same instructions with [`BytecodeStream`](super::BytecodeStream).
/// # Errors
/// - [`ScanError::InvalidOffset`] if the code exceeds the maximum code length.
/// - [`ScanError::MalformedSwitch`] if a `tableswitch` does not have one offset per key.
pub fn assemble<'a, I>(instructions: I) -> Result<Vec<u8>, ScanError>
where
    I: IntoIterator<Item = &'a RawInstruction>,
{
    let mut code = Vec::new();
    for instruction in instructions {
        let pc = ProgramCounter::try_from(code.len()).map_err(|source| {
            ScanError::InvalidOffset {
                pc: ProgramCounter::from(u16::MAX),
                source,
            }
        })?;
        encode_one(&mut code, pc, instruction)?;
    }
    Ok(code)
}

fn put<T>(code: &mut Vec<u8>, value: T)
where
    T: ToBytes,
{
    code.extend_from_slice(value.to_be_bytes().as_ref());
}

#[allow(clippy::too_many_lines)]
fn encode_one(
    code: &mut Vec<u8>,
    pc: ProgramCounter,
    instruction: &RawInstruction,
) -> Result<(), ScanError> {
    #[allow(clippy::enum_glob_use)]
    use RawInstruction::*;

    code.push(instruction.opcode());
    match instruction {
        BiPush { value } => put(code, *value),
        SiPush { value } => put(code, *value),
        Ldc { index } => put(code, *index),
        LdcW { index } | Ldc2W { index } => put(code, *index),
        ILoad { index }
        | LLoad { index }
        | FLoad { index }
        | DLoad { index }
        | ALoad { index }
        | IStore { index }
        | LStore { index }
        | FStore { index }
        | DStore { index }
        | AStore { index }
        | Ret { index } => put(code, *index),
        IInc { index, constant } => {
            put(code, *index);
            put(code, *constant);
        }
        IfEq { offset }
        | IfNe { offset }
        | IfLt { offset }
        | IfGe { offset }
        | IfGt { offset }
        | IfLe { offset }
        | IfICmpEq { offset }
        | IfICmpNe { offset }
        | IfICmpLt { offset }
        | IfICmpGe { offset }
        | IfICmpGt { offset }
        | IfICmpLe { offset }
        | IfACmpEq { offset }
        | IfACmpNe { offset }
        | IfNull { offset }
        | IfNonNull { offset }
        | Goto { offset }
        | Jsr { offset } => put(code, *offset),
        GotoW { offset } | JsrW { offset } => put(code, *offset),
        TableSwitch {
            default,
            low,
            high,
            offsets,
        } => {
            let expected = i64::from(*high) - i64::from(*low) + 1;
            if i64::try_from(offsets.len()).ok() != Some(expected) {
                return Err(ScanError::MalformedSwitch(pc));
            }
            code.resize(code.len() + usize::from(switch_padding(pc)), 0);
            put(code, *default);
            put(code, *low);
            put(code, *high);
            offsets.iter().for_each(|it| put(code, *it));
        }
        LookupSwitch { default, pairs } => {
            code.resize(code.len() + usize::from(switch_padding(pc)), 0);
            put(code, *default);
            let npairs =
                u32::try_from(pairs.len()).map_err(|_| ScanError::MalformedSwitch(pc))?;
            put(code, npairs);
            let mut sorted = pairs.clone();
            sorted.sort_by_key(|(key, _)| *key);
            for (key, offset) in sorted {
                put(code, key);
                put(code, offset);
            }
        }
        GetStatic { index }
        | PutStatic { index }
        | GetField { index }
        | PutField { index }
        | InvokeVirtual { index }
        | InvokeSpecial { index }
        | InvokeStatic { index }
        | New { index }
        | ANewArray { index }
        | CheckCast { index }
        | InstanceOf { index } => put(code, *index),
        InvokeInterface { index, count } => {
            put(code, *index);
            put(code, *count);
            code.push(0);
        }
        InvokeDynamic { index } => {
            put(code, *index);
            put(code, 0u16);
        }
        NewArray { atype } => put(code, *atype),
        MultiANewArray { index, dimensions } => {
            put(code, *index);
            put(code, *dimensions);
        }
        Wide(wide) => {
            code.push(wide.opcode());
            match wide {
                WideInstruction::ILoad { index }
                | WideInstruction::LLoad { index }
                | WideInstruction::FLoad { index }
                | WideInstruction::DLoad { index }
                | WideInstruction::ALoad { index }
                | WideInstruction::IStore { index }
                | WideInstruction::LStore { index }
                | WideInstruction::FStore { index }
                | WideInstruction::DStore { index }
                | WideInstruction::AStore { index }
                | WideInstruction::Ret { index } => put(code, *index),
                WideInstruction::IInc { index, constant } => {
                    put(code, *index);
                    put(code, *constant);
                }
            }
        }
        // Only the opcode
        _ => {}
    }
    Ok(())
}
