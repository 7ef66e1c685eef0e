//! JDK methods whose calls are replaced by dedicated nodes.
use crate::{
    ir::{Constant, Intrinsic},
    types::MethodRef,
};

/// How a recognized method behaves.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(super) struct IntrinsicInfo {
    pub intrinsic: Intrinsic,
    /// The call leaves memory untouched.
    pub preserves_state: bool,
    pub can_trap: bool,
    /// The result on constant arguments is known at compile time.
    pub foldable: bool,
}

const fn entry(
    class: &'static str,
    name: &'static str,
    descriptor: &'static str,
    intrinsic: Intrinsic,
    preserves_state: bool,
    can_trap: bool,
    foldable: bool,
) -> (&'static str, &'static str, &'static str, IntrinsicInfo) {
    (
        class,
        name,
        descriptor,
        IntrinsicInfo {
            intrinsic,
            preserves_state,
            can_trap,
            foldable,
        },
    )
}

const MATH: &str = "java/lang/Math";
const SYSTEM: &str = "java/lang/System";
const OBJECT: &str = "java/lang/Object";

#[rustfmt::skip]
static INTRINSICS: &[(&str, &str, &str, IntrinsicInfo)] = &[
    entry(MATH, "abs", "(D)D", Intrinsic::DoubleAbs, true, false, true),
    entry(MATH, "abs", "(F)F", Intrinsic::FloatAbs, true, false, true),
    entry(MATH, "abs", "(I)I", Intrinsic::IntAbs, true, false, true),
    entry(MATH, "abs", "(J)J", Intrinsic::LongAbs, true, false, true),
    entry(MATH, "sqrt", "(D)D", Intrinsic::Sqrt, true, false, true),
    entry(MATH, "sin", "(D)D", Intrinsic::Sin, true, false, false),
    entry(MATH, "cos", "(D)D", Intrinsic::Cos, true, false, false),
    entry(MATH, "tan", "(D)D", Intrinsic::Tan, true, false, false),
    entry(MATH, "log", "(D)D", Intrinsic::Log, true, false, false),
    entry(MATH, "log10", "(D)D", Intrinsic::Log10, true, false, false),
    entry("java/lang/Float", "floatToRawIntBits", "(F)I", Intrinsic::FloatToRawIntBits, true, false, true),
    entry("java/lang/Float", "intBitsToFloat", "(I)F", Intrinsic::IntBitsToFloat, true, false, true),
    entry("java/lang/Double", "doubleToRawLongBits", "(D)J", Intrinsic::DoubleToRawLongBits, true, false, true),
    entry("java/lang/Double", "longBitsToDouble", "(J)D", Intrinsic::LongBitsToDouble, true, false, true),
    entry(SYSTEM, "currentTimeMillis", "()J", Intrinsic::CurrentTimeMillis, true, false, false),
    entry(SYSTEM, "nanoTime", "()J", Intrinsic::NanoTime, true, false, false),
    entry(SYSTEM, "arraycopy", "(Ljava/lang/Object;ILjava/lang/Object;II)V", Intrinsic::ArrayCopy, false, true, false),
    entry(OBJECT, "getClass", "()Ljava/lang/Class;", Intrinsic::GetClass, true, true, false),
    entry(OBJECT, "hashCode", "()I", Intrinsic::HashCode, true, true, false),
    entry("java/lang/Thread", "currentThread", "()Ljava/lang/Thread;", Intrinsic::CurrentThread, true, false, false),
];

/// Looks up the intrinsic replacing calls to `method`.
pub(super) fn lookup(method: &MethodRef) -> Option<IntrinsicInfo> {
    let descriptor = method.descriptor.to_string();
    INTRINSICS
        .iter()
        .find(|(class, name, desc, _)| {
            method.owner.binary_name == *class && method.name == *name && descriptor == *desc
        })
        .map(|(.., info)| *info)
}

/// Evaluates a foldable intrinsic on constant arguments.
pub(super) fn fold(intrinsic: Intrinsic, arguments: &[&Constant]) -> Option<Constant> {
    let folded = match (intrinsic, arguments) {
        (Intrinsic::DoubleAbs, [Constant::Double(it)]) => Constant::Double(it.abs()),
        (Intrinsic::FloatAbs, [Constant::Float(it)]) => Constant::Float(it.abs()),
        (Intrinsic::IntAbs, [Constant::Int(it)]) => Constant::Int(it.wrapping_abs()),
        (Intrinsic::LongAbs, [Constant::Long(it)]) => Constant::Long(it.wrapping_abs()),
        (Intrinsic::Sqrt, [Constant::Double(it)]) => Constant::Double(it.sqrt()),
        #[allow(clippy::cast_possible_wrap)]
        (Intrinsic::FloatToRawIntBits, [Constant::Float(it)]) => Constant::Int(it.to_bits() as i32),
        #[allow(clippy::cast_sign_loss)]
        (Intrinsic::IntBitsToFloat, [Constant::Int(it)]) => {
            Constant::Float(f32::from_bits(*it as u32))
        }
        #[allow(clippy::cast_possible_wrap)]
        (Intrinsic::DoubleToRawLongBits, [Constant::Double(it)]) => {
            Constant::Long(it.to_bits() as i64)
        }
        #[allow(clippy::cast_sign_loss)]
        (Intrinsic::LongBitsToDouble, [Constant::Long(it)]) => {
            Constant::Double(f64::from_bits(*it as u64))
        }
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tests::method_ref;

    #[test]
    fn lookup_matches_descriptors() {
        let abs = lookup(&method_ref("java/lang/Math", "abs", "(I)I")).unwrap();
        assert_eq!(abs.intrinsic, Intrinsic::IntAbs);
        assert!(abs.foldable);
        assert_eq!(lookup(&method_ref("java/lang/Math", "abs", "(S)S")), None);
        assert_eq!(lookup(&method_ref("java/lang/Object", "<init>", "()V")), None);

        let arraycopy = lookup(&method_ref(
            "java/lang/System",
            "arraycopy",
            "(Ljava/lang/Object;ILjava/lang/Object;II)V",
        ))
        .unwrap();
        assert!(!arraycopy.preserves_state);
        assert!(arraycopy.can_trap);
    }

    #[test]
    fn abs_of_min_wraps() {
        assert_eq!(
            fold(Intrinsic::IntAbs, &[&Constant::Int(i32::MIN)]),
            Some(Constant::Int(i32::MIN))
        );
        assert_eq!(fold(Intrinsic::Sin, &[&Constant::Double(0.0)]), None);
    }

    proptest! {
        #[test]
        fn raw_bits_round_trip(bits in any::<i32>()) {
            let float = fold(Intrinsic::IntBitsToFloat, &[&Constant::Int(bits)]).unwrap();
            prop_assert_eq!(
                fold(Intrinsic::FloatToRawIntBits, &[&float]),
                Some(Constant::Int(bits))
            );
        }
    }
}
