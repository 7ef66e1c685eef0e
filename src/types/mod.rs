//! Module containing the APIs for the JVM type system.
pub mod field_type;
pub mod method_descriptor;
pub mod references;

pub use field_type::{FieldType, PrimitiveType};
pub use method_descriptor::{MethodDescriptor, ReturnType};
pub use references::{ClassRef, FieldRef, MethodRef};

/// Trait for types that have a descriptor.
pub trait Descriptor {
    /// Returns the descriptor of the type.
    fn descriptor(&self) -> String;
}

/// An error indicating that the descriptor string is invalid.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[error("Invalid descriptor")]
pub struct InvalidDescriptor;
