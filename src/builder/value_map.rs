use std::collections::HashMap;

use crate::ir::{
    ArithmeticOp, CompareOp, Constant, Conversion, Instruction, LogicOp, ShiftOp, ValueId,
    ValueKind,
};

/// The shape of a pure instruction, with the operands of commutative operations ordered.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
enum Key {
    Constant(Constant),
    Arithmetic(ArithmeticOp, ValueKind, ValueId, ValueId),
    Logic(LogicOp, ValueKind, ValueId, ValueId),
    Shift(ShiftOp, ValueKind, ValueId, ValueId),
    Negate(ValueKind, ValueId),
    Convert(Conversion, ValueId),
    Compare(CompareOp, ValueId, ValueId),
    ArrayLength(ValueId),
}

const fn ordered(x: ValueId, y: ValueId) -> (ValueId, ValueId) {
    if x.0 <= y.0 { (x, y) } else { (y, x) }
}

impl Key {
    fn of(kind: ValueKind, instruction: &Instruction) -> Option<Self> {
        let key = match instruction {
            Instruction::Constant(constant) => Self::Constant(constant.clone()),
            Instruction::Arithmetic {
                op: ArithmeticOp::Div | ArithmeticOp::Rem,
                ..
            } => return None,
            &Instruction::Arithmetic { op, x, y } => {
                let (x, y) = if op.is_commutative() {
                    ordered(x, y)
                } else {
                    (x, y)
                };
                Self::Arithmetic(op, kind, x, y)
            }
            &Instruction::Logic { op, x, y } => {
                let (x, y) = ordered(x, y);
                Self::Logic(op, kind, x, y)
            }
            &Instruction::Shift { op, x, y } => Self::Shift(op, kind, x, y),
            &Instruction::Negate { x } => Self::Negate(kind, x),
            &Instruction::Convert { op, x } => Self::Convert(op, x),
            &Instruction::Compare { op, x, y } => Self::Compare(op, x, y),
            &Instruction::ArrayLength { array } => Self::ArrayLength(array),
            _ => return None,
        };
        Some(key)
    }
}

/// Block-local value numbering of pure instructions.
#[derive(Debug, Default)]
pub(super) struct ValueMap {
    values: HashMap<Key, ValueId>,
}

impl ValueMap {
    /// Finds a previously appended node computing the same value.
    pub fn find(&self, kind: ValueKind, instruction: &Instruction) -> Option<ValueId> {
        Key::of(kind, instruction).and_then(|key| self.values.get(&key).copied())
    }

    /// Records an appended node. Nodes that are not pure are ignored.
    pub fn insert(&mut self, kind: ValueKind, instruction: &Instruction, value: ValueId) {
        if let Some(key) = Key::of(kind, instruction) {
            self.values.entry(key).or_insert(value);
        }
    }

    /// Forgets every recorded node.
    pub fn kill(&mut self) {
        self.values.clear();
    }
}
