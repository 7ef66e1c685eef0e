use std::ops::RangeInclusive;

use bitflags::bitflags;

use crate::{
    bytecode::ProgramCounter,
    macros::see_jvm_spec,
    types::{ClassRef, MethodRef},
};

bitflags! {
    /// The access flags of a method.
    #[doc = see_jvm_spec!(4, 6)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
    pub struct MethodAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within the defining class and other classes belonging to the same nest.
        const PRIVATE = 0x0002;
        /// Declared `protected`; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`; must not be overridden.
        const FINAL = 0x0010;
        /// Declared `synchronized`; invocation is wrapped by a monitor use.
        const SYNCHRONIZED = 0x0020;
        /// A bridge method, generated by the compiler.
        const BRIDGE = 0x0040;
        /// Declared with variable number of arguments.
        const VARARGS = 0x0080;
        /// Declared `native`; implemented in a language other than the Java programming language.
        const NATIVE = 0x0100;
        /// Declared `abstract`; no implementation is provided.
        const ABSTRACT = 0x0400;
        /// In a class file whose major version number is at least 46 and at most 60; Declared `strictfp`.
        const STRICT = 0x0800;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
    }
}

/// An entry of the exception table of a method.
#[doc = see_jvm_spec!(4, 7, 3)]
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct ExceptionHandler {
    /// The range of covered instructions, both ends inclusive.
    pub covered_pc: RangeInclusive<ProgramCounter>,
    /// The start of the handler code.
    pub handler_pc: ProgramCounter,
    /// The caught exception class, or [`None`] for a catch-all handler (`finally`).
    pub catch_type: Option<ClassRef>,
}

impl ExceptionHandler {
    /// Creates a handler from the half-open `[start, end)` range stored in class files.
    /// Returns [`None`] for an empty range.
    #[must_use]
    pub fn from_table_entry(
        start: u16,
        end: u16,
        handler: u16,
        catch_type: Option<ClassRef>,
    ) -> Option<Self> {
        let last = end.checked_sub(1).filter(|it| *it >= start)?;
        Some(Self {
            covered_pc: ProgramCounter::from(start)..=ProgramCounter::from(last),
            handler_pc: ProgramCounter::from(handler),
            catch_type,
        })
    }

    /// Checks whether the handler covers the instruction at `pc`.
    #[must_use]
    pub fn covers(&self, pc: ProgramCounter) -> bool {
        self.covered_pc.contains(&pc)
    }

    /// Checks whether the handler catches every exception.
    #[must_use]
    pub const fn is_catch_all(&self) -> bool {
        self.catch_type.is_none()
    }
}

/// The body of a method.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct MethodCode {
    /// The maximum depth of the operand stack, in slots.
    pub max_stack: u16,
    /// The number of local variable slots, including parameters.
    pub max_locals: u16,
    /// The raw bytecode.
    pub bytecode: Vec<u8>,
    /// The exception table, in declaration order.
    pub exception_table: Vec<ExceptionHandler>,
}

/// A loaded method as reported by the [`Runtime`](super::Runtime).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MethodInfo {
    /// The symbolic reference to the method.
    pub method: MethodRef,
    /// The access flags.
    pub access_flags: MethodAccessFlags,
    /// The body, absent for `abstract` and `native` methods.
    pub code: Option<MethodCode>,
    /// Whether a loaded subclass overrides the method.
    pub overridden: bool,
}

impl MethodInfo {
    /// Creates a method that no loaded class overrides.
    #[must_use]
    pub fn new(method: MethodRef, access_flags: MethodAccessFlags, code: Option<MethodCode>) -> Self {
        Self {
            method,
            access_flags,
            code,
            overridden: false,
        }
    }

    /// Checks if the method is `static`.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Checks if the method is `synchronized`.
    #[must_use]
    pub const fn is_synchronized(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::SYNCHRONIZED)
    }

    /// Checks if the method is `abstract`.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    /// Checks if the method is `native`.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    /// Checks if the method can be called without a virtual dispatch,
    /// i.e., it is private, static, final, or a constructor.
    #[must_use]
    pub fn can_be_statically_bound(&self) -> bool {
        self.access_flags.intersects(
            MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::FINAL,
        ) || self.method.is_constructor()
    }

    /// The number of bytes of bytecode, zero if there is no body.
    #[must_use]
    pub fn code_size(&self) -> usize {
        self.code.as_ref().map_or(0, |it| it.bytecode.len())
    }

    /// Checks if the method declares exception handlers.
    #[must_use]
    pub fn has_exception_handlers(&self) -> bool {
        self.code
            .as_ref()
            .is_some_and(|it| !it.exception_table.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entry_ranges_are_inclusive() {
        let handler = ExceptionHandler::from_table_entry(2, 6, 10, None).unwrap();
        assert!(!handler.covers(ProgramCounter::from(1)));
        assert!(handler.covers(ProgramCounter::from(2)));
        assert!(handler.covers(ProgramCounter::from(5)));
        assert!(!handler.covers(ProgramCounter::from(6)));
        assert!(handler.is_catch_all());
    }

    #[test]
    fn empty_ranges_are_dropped() {
        assert!(ExceptionHandler::from_table_entry(3, 3, 10, None).is_none());
        assert!(ExceptionHandler::from_table_entry(0, 0, 10, None).is_none());
    }
}
