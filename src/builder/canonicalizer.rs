//! Constant folding and algebraic simplification applied to every appended node.
use std::cmp::Ordering;

use num_traits::{PrimInt, Signed, WrappingAdd, WrappingMul, WrappingNeg, WrappingSub};

use crate::ir::{
    ArithmeticOp, CompareOp, Condition, Constant, Conversion, Instruction, IrGraph, LogicOp,
    ShiftOp, ValueId,
};

/// The simplest form of a node.
#[derive(Debug, PartialEq, Clone)]
pub(super) enum Canonical {
    /// The node cannot be simplified.
    Keep,
    /// The node computes a constant.
    Constant(Constant),
    /// The node computes an existing value.
    Value(ValueId),
}

trait Integral: PrimInt + Signed + WrappingAdd + WrappingSub + WrappingMul + WrappingNeg {}

impl<T> Integral for T where
    T: PrimInt + Signed + WrappingAdd + WrappingSub + WrappingMul + WrappingNeg
{
}

fn fold_arithmetic<T: Integral>(op: ArithmeticOp, x: T, y: T) -> Option<T> {
    let minus_one = -T::one();
    match op {
        ArithmeticOp::Add => Some(x.wrapping_add(&y)),
        ArithmeticOp::Sub => Some(x.wrapping_sub(&y)),
        ArithmeticOp::Mul => Some(x.wrapping_mul(&y)),
        ArithmeticOp::Div | ArithmeticOp::Rem if y.is_zero() => None,
        ArithmeticOp::Div if y == minus_one => Some(x.wrapping_neg()),
        ArithmeticOp::Rem if y == minus_one => Some(T::zero()),
        ArithmeticOp::Div => Some(x / y),
        ArithmeticOp::Rem => Some(x % y),
    }
}

fn fold_logic<T: PrimInt>(op: LogicOp, x: T, y: T) -> T {
    match op {
        LogicOp::And => x & y,
        LogicOp::Or => x | y,
        LogicOp::Xor => x ^ y,
    }
}

#[allow(clippy::cast_sign_loss)]
fn fold_shift<T: PrimInt>(op: ShiftOp, x: T, distance: i32) -> T {
    let width = T::zero().count_zeros();
    let distance = (distance as u32) & (width - 1);
    match op {
        ShiftOp::Shl => x.unsigned_shl(distance),
        ShiftOp::Shr => x.signed_shr(distance),
        ShiftOp::UShr => x.unsigned_shr(distance),
    }
}

fn three_way<T: PartialOrd>(x: T, y: T, unordered: i32) -> i32 {
    match x.partial_cmp(&y) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None => unordered,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn fold_conversion(op: Conversion, x: &Constant) -> Option<Constant> {
    #[allow(clippy::enum_glob_use)]
    use Conversion::*;
    let folded = match (op, x) {
        (I2L, &Constant::Int(it)) => Constant::Long(it.into()),
        (I2F, &Constant::Int(it)) => Constant::Float(it as f32),
        (I2D, &Constant::Int(it)) => Constant::Double(it.into()),
        (I2B, &Constant::Int(it)) => Constant::Int(i32::from(it as i8)),
        (I2C, &Constant::Int(it)) => Constant::Int(i32::from(it as u16)),
        (I2S, &Constant::Int(it)) => Constant::Int(i32::from(it as i16)),
        (L2I, &Constant::Long(it)) => Constant::Int(it as i32),
        (L2F, &Constant::Long(it)) => Constant::Float(it as f32),
        (L2D, &Constant::Long(it)) => Constant::Double(it as f64),
        (F2I, &Constant::Float(it)) => Constant::Int(it as i32),
        (F2L, &Constant::Float(it)) => Constant::Long(it as i64),
        (F2D, &Constant::Float(it)) => Constant::Double(it.into()),
        (D2I, &Constant::Double(it)) => Constant::Int(it as i32),
        (D2L, &Constant::Double(it)) => Constant::Long(it as i64),
        (D2F, &Constant::Double(it)) => Constant::Float(it as f32),
        _ => return None,
    };
    Some(folded)
}

fn constant(graph: &IrGraph, value: ValueId) -> Option<&Constant> {
    match &graph.value(value).instruction {
        Instruction::Constant(it) => Some(it),
        _ => None,
    }
}

fn is_integral(constant: Option<&Constant>, expected: i64) -> bool {
    match constant {
        Some(&Constant::Int(it)) => i64::from(it) == expected,
        Some(&Constant::Long(it)) => it == expected,
        _ => false,
    }
}

/// Simplifies `instruction` given the nodes already in `graph`.
pub(super) fn canonicalize(graph: &IrGraph, instruction: &Instruction) -> Canonical {
    match *instruction {
        Instruction::Arithmetic { op, x, y } => {
            let (cx, cy) = (constant(graph, x), constant(graph, y));
            let folded = match (cx, cy) {
                (Some(&Constant::Int(a)), Some(&Constant::Int(b))) => {
                    fold_arithmetic(op, a, b).map(Constant::Int)
                }
                (Some(&Constant::Long(a)), Some(&Constant::Long(b))) => {
                    fold_arithmetic(op, a, b).map(Constant::Long)
                }
                _ => None,
            };
            if let Some(folded) = folded {
                return Canonical::Constant(folded);
            }
            match op {
                ArithmeticOp::Add | ArithmeticOp::Sub if is_integral(cy, 0) => Canonical::Value(x),
                ArithmeticOp::Add if is_integral(cx, 0) => Canonical::Value(y),
                ArithmeticOp::Mul | ArithmeticOp::Div if is_integral(cy, 1) => {
                    Canonical::Value(x)
                }
                ArithmeticOp::Mul if is_integral(cx, 1) => Canonical::Value(y),
                _ => Canonical::Keep,
            }
        }
        Instruction::Logic { op, x, y } => {
            let (cx, cy) = (constant(graph, x), constant(graph, y));
            match (cx, cy) {
                (Some(&Constant::Int(a)), Some(&Constant::Int(b))) => {
                    return Canonical::Constant(Constant::Int(fold_logic(op, a, b)));
                }
                (Some(&Constant::Long(a)), Some(&Constant::Long(b))) => {
                    return Canonical::Constant(Constant::Long(fold_logic(op, a, b)));
                }
                _ => {}
            }
            let identity = match op {
                LogicOp::Or | LogicOp::Xor => 0,
                LogicOp::And => -1,
            };
            if is_integral(cy, identity) {
                Canonical::Value(x)
            } else if is_integral(cx, identity) {
                Canonical::Value(y)
            } else {
                Canonical::Keep
            }
        }
        Instruction::Shift { op, x, y } => match (constant(graph, x), constant(graph, y)) {
            (Some(&Constant::Int(a)), Some(&Constant::Int(b))) => {
                Canonical::Constant(Constant::Int(fold_shift(op, a, b)))
            }
            (Some(&Constant::Long(a)), Some(&Constant::Int(b))) => {
                Canonical::Constant(Constant::Long(fold_shift(op, a, b)))
            }
            (_, Some(&Constant::Int(0))) => Canonical::Value(x),
            _ => Canonical::Keep,
        },
        Instruction::Negate { x } => match constant(graph, x) {
            Some(&Constant::Int(it)) => Canonical::Constant(Constant::Int(it.wrapping_neg())),
            Some(&Constant::Long(it)) => Canonical::Constant(Constant::Long(it.wrapping_neg())),
            Some(&Constant::Float(it)) => Canonical::Constant(Constant::Float(-it)),
            Some(&Constant::Double(it)) => Canonical::Constant(Constant::Double(-it)),
            _ => Canonical::Keep,
        },
        Instruction::Convert { op, x } => constant(graph, x)
            .and_then(|it| fold_conversion(op, it))
            .map_or(Canonical::Keep, Canonical::Constant),
        Instruction::Compare { op, x, y } => {
            let result = match (op, constant(graph, x), constant(graph, y)) {
                (CompareOp::LCmp, Some(&Constant::Long(a)), Some(&Constant::Long(b))) => {
                    three_way(a, b, 0)
                }
                (CompareOp::FCmpL, Some(&Constant::Float(a)), Some(&Constant::Float(b))) => {
                    three_way(a, b, -1)
                }
                (CompareOp::FCmpG, Some(&Constant::Float(a)), Some(&Constant::Float(b))) => {
                    three_way(a, b, 1)
                }
                (CompareOp::DCmpL, Some(&Constant::Double(a)), Some(&Constant::Double(b))) => {
                    three_way(a, b, -1)
                }
                (CompareOp::DCmpG, Some(&Constant::Double(a)), Some(&Constant::Double(b))) => {
                    three_way(a, b, 1)
                }
                _ => return Canonical::Keep,
            };
            Canonical::Constant(Constant::Int(result))
        }
        _ => Canonical::Keep,
    }
}

/// Evaluates `x condition y` if both operands are constants.
pub(super) fn fold_condition(
    graph: &IrGraph,
    x: ValueId,
    condition: Condition,
    y: ValueId,
) -> Option<bool> {
    match (constant(graph, x)?, constant(graph, y)?) {
        (Constant::Int(a), Constant::Int(b)) => Some(condition.holds(a, b)),
        (Constant::Null, Constant::Null) => match condition {
            Condition::Equal => Some(true),
            Condition::NotEqual => Some(false),
            _ => None,
        },
        (Constant::Null, it) | (it, Constant::Null) if it.is_non_null_object() => {
            match condition {
                Condition::Equal => Some(false),
                Condition::NotEqual => Some(true),
                _ => None,
            }
        }
        _ => None,
    }
}
