//! Symbolic references to classes, fields, and methods.
use std::fmt::Display;

use super::{field_type::FieldType, method_descriptor::MethodDescriptor};

/// A reference to a class or an interface by its binary name.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct ClassRef {
    /// The binary name of the class, e.g., `java/lang/Object`.
    pub binary_name: String,
}

impl ClassRef {
    /// The root of the class hierarchy.
    pub const JAVA_LANG_OBJECT: &'static str = "java/lang/Object";

    /// Creates a new [`ClassRef`] from a binary name.
    pub fn new<S: Into<String>>(binary_name: S) -> Self {
        ClassRef {
            binary_name: binary_name.into(),
        }
    }
}

impl Display for ClassRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary_name)
    }
}

/// A reference to a field.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct FieldRef {
    /// The class declaring the field.
    pub owner: ClassRef,
    /// The name of the field.
    pub name: String,
    /// The type of the field.
    pub field_type: FieldType,
}

impl Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// A reference to a method.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct MethodRef {
    /// The class declaring the method.
    pub owner: ClassRef,
    /// The name of the method.
    pub name: String,
    /// The descriptor of the method.
    pub descriptor: MethodDescriptor,
}

impl MethodRef {
    /// The name of instance initializers.
    pub const CONSTRUCTOR_NAME: &'static str = "<init>";

    /// Checks if the method reference refers to a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == Self::CONSTRUCTOR_NAME
    }

    /// Checks if this is `java.lang.Object.<init>()`, whose completion registers finalizers.
    #[must_use]
    pub fn is_object_init(&self) -> bool {
        self.is_constructor() && self.owner.binary_name == ClassRef::JAVA_LANG_OBJECT
    }
}

impl Display for MethodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}{}", self.owner, self.name, self.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tests::arb_class_name;

    proptest! {
        #[test]
        fn constructors(class_name in arb_class_name()) {
            let method = MethodRef {
                owner: ClassRef::new(class_name),
                name: MethodRef::CONSTRUCTOR_NAME.to_string(),
                descriptor: "()V".parse().unwrap(),
            };
            prop_assert!(method.is_constructor());
            prop_assert_eq!(
                method.is_object_init(),
                method.owner.binary_name == ClassRef::JAVA_LANG_OBJECT
            );
        }
    }

    #[test]
    fn display() {
        let method = MethodRef {
            owner: ClassRef::new("java/lang/Math"),
            name: "abs".to_owned(),
            descriptor: "(I)I".parse().unwrap(),
        };
        assert_eq!(method.to_string(), "java/lang/Math::abs(I)I");
    }
}
