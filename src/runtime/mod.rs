//! Interfaces to the class-metadata layer that the graph builder consults.
//!
//! The builder never parses class files itself. It asks a [`Runtime`] to resolve symbolic
//! references and reads operands of bytecode instructions through a [`ConstantPool`].
mod class;
mod in_memory;
mod method;

use std::fmt::Debug;

pub use class::{ClassAccessFlags, FieldAccessFlags, FieldInfo, TypeInfo};
pub use in_memory::{InMemoryConstantPool, InMemoryRuntime};
pub use method::{ExceptionHandler, MethodAccessFlags, MethodCode, MethodInfo};

use crate::types::{ClassRef, FieldRef, FieldType, MethodRef};

/// A loadable constant referenced by `ldc`, `ldc_w`, and `ldc2_w`.
#[derive(Debug, PartialEq, Clone)]
pub enum PoolConstant {
    /// An `int` constant.
    Integer(i32),
    /// A `long` constant.
    Long(i64),
    /// A `float` constant.
    Float(f32),
    /// A `double` constant.
    Double(f64),
    /// A `java.lang.String` literal.
    String(String),
    /// A `java.lang.Class` literal.
    Class(ClassRef),
}

/// The constant pool of a class, queried by index.
pub trait ConstantPool: Debug {
    /// Looks up a loadable constant.
    fn lookup_constant(&self, index: u16) -> Option<PoolConstant>;

    /// Looks up a class entry. Array classes are represented by their [`FieldType`].
    fn lookup_type(&self, index: u16) -> Option<FieldType>;

    /// Looks up a field reference.
    fn lookup_field(&self, index: u16) -> Option<FieldRef>;

    /// Looks up a method or interface method reference.
    fn lookup_method(&self, index: u16) -> Option<MethodRef>;
}

/// The view of the virtual machine available during compilation.
///
/// Every `resolve_*` method returns [`None`] when the symbol is not loaded yet. The
/// builder then emits conservative code instead of failing.
pub trait Runtime: Debug {
    /// The constant pool of `holder`.
    fn constant_pool(&self, holder: &ClassRef) -> Option<&dyn ConstantPool>;

    /// Resolves a loaded class.
    fn resolve_type(&self, class: &ClassRef) -> Option<&TypeInfo>;

    /// Resolves a field.
    fn resolve_field(&self, field: &FieldRef) -> Option<&FieldInfo>;

    /// Resolves a method as declared by its owner or inherited from a superclass.
    fn resolve_method(&self, method: &MethodRef) -> Option<&MethodInfo>;

    /// Finds the implementation of `method` that a virtual call on an instance of
    /// `receiver` dispatches to.
    fn resolve_method_impl(&self, receiver: &ClassRef, method: &MethodRef) -> Option<&MethodInfo>;

    /// Checks whether the virtual machine forbids inlining `method`.
    fn must_not_inline(&self, _method: &MethodRef) -> bool {
        false
    }
}
