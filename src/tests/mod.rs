use proptest::prelude::*;

use crate::{
    bytecode::{RawInstruction, assemble},
    runtime::{ExceptionHandler, MethodAccessFlags, MethodCode, MethodInfo},
    types::{ClassRef, FieldType, MethodRef, PrimitiveType},
};

pub(crate) fn arb_class_name() -> impl Strategy<Value = String> {
    let arb_ident = prop::string::string_regex(r"[a-zA-Z][\w\$_]*").expect("The regex is invalid");
    prop::collection::vec(arb_ident, 1..10).prop_map(|v| v.join("/"))
}

pub(crate) fn arb_non_array_field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        any::<PrimitiveType>().prop_map(FieldType::Base),
        arb_class_name()
            .prop_map(ClassRef::new)
            .prop_map(FieldType::Object),
    ]
}

prop_compose! {
    fn arb_array_field_type()(
        t in arb_non_array_field_type(),
        dim in 1..=8u8
    ) -> FieldType {
        FieldType::array_of(t, dim)
    }
}

pub(crate) fn arb_field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![arb_non_array_field_type(), arb_array_field_type()]
}

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn method_ref(owner: &str, name: &str, descriptor: &str) -> MethodRef {
    MethodRef {
        owner: ClassRef::new(owner),
        name: name.to_owned(),
        descriptor: descriptor.parse().expect("Invalid method descriptor"),
    }
}

/// Assembles a method of class `Test` with the given body.
pub(crate) fn test_method(
    name: &str,
    descriptor: &str,
    access_flags: MethodAccessFlags,
    max_stack: u16,
    max_locals: u16,
    instructions: &[RawInstruction],
    exception_table: Vec<ExceptionHandler>,
) -> MethodInfo {
    let code = MethodCode {
        max_stack,
        max_locals,
        bytecode: assemble(instructions).expect("Fail to assemble"),
        exception_table,
    };
    MethodInfo::new(
        method_ref("Test", name, descriptor),
        access_flags,
        Some(code),
    )
}

/// A `public static` method of class `Test` without exception handlers.
pub(crate) fn static_method(
    descriptor: &str,
    max_stack: u16,
    max_locals: u16,
    instructions: &[RawInstruction],
) -> MethodInfo {
    test_method(
        "test",
        descriptor,
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        max_stack,
        max_locals,
        instructions,
        Vec::new(),
    )
}
