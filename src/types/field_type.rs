//! JVM field types.
use std::{fmt::Display, str::FromStr};

use itertools::Itertools;

use super::{Descriptor, InvalidDescriptor, references::ClassRef};
use crate::macros::see_jvm_spec;

/// A primitive type in Java.
#[doc = see_jvm_spec!(2, 3)]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum PrimitiveType {
    /// The `boolean` type.
    #[display("boolean")]
    Boolean,
    /// The `char` type.
    #[display("char")]
    Char,
    /// The `float` type.
    #[display("float")]
    Float,
    /// The `double` type.
    #[display("double")]
    Double,
    /// The `byte` type.
    #[display("byte")]
    Byte,
    /// The `short` type.
    #[display("short")]
    Short,
    /// The `int` type.
    #[display("int")]
    Int,
    /// The `long` type.
    #[display("long")]
    Long,
}

impl PrimitiveType {
    /// Checks whether values of this type take two local variable or operand stack slots.
    #[must_use]
    pub const fn is_double_word(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }

    /// Maps an array type code of the `newarray` instruction to the element type.
    #[doc = see_jvm_spec!(6, 5)]
    #[must_use]
    pub const fn from_array_type_code(atype: u8) -> Option<Self> {
        match atype {
            4 => Some(Self::Boolean),
            5 => Some(Self::Char),
            6 => Some(Self::Float),
            7 => Some(Self::Double),
            8 => Some(Self::Byte),
            9 => Some(Self::Short),
            10 => Some(Self::Int),
            11 => Some(Self::Long),
            _ => None,
        }
    }
}

impl TryFrom<char> for PrimitiveType {
    type Error = InvalidDescriptor;

    fn try_from(descriptor: char) -> Result<Self, Self::Error> {
        match descriptor {
            'Z' => Ok(Self::Boolean),
            'C' => Ok(Self::Char),
            'F' => Ok(Self::Float),
            'D' => Ok(Self::Double),
            'B' => Ok(Self::Byte),
            'S' => Ok(Self::Short),
            'I' => Ok(Self::Int),
            'J' => Ok(Self::Long),
            _ => Err(InvalidDescriptor),
        }
    }
}

impl Descriptor for PrimitiveType {
    fn descriptor(&self) -> String {
        match self {
            Self::Boolean => "Z",
            Self::Char => "C",
            Self::Float => "F",
            Self::Double => "D",
            Self::Byte => "B",
            Self::Short => "S",
            Self::Int => "I",
            Self::Long => "J",
        }
        .to_owned()
    }
}

/// The type of a field, a local variable, or a method parameter.
#[doc = see_jvm_spec!(4, 3, 2)]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum FieldType {
    /// A primitive type.
    Base(PrimitiveType),
    /// A class or interface type.
    Object(ClassRef),
    /// An array type.
    Array(Box<FieldType>),
}

impl FieldType {
    /// Creates an array type with `self` as the element type.
    #[must_use]
    pub fn into_array_type(self) -> Self {
        Self::Array(Box::new(self))
    }

    /// Creates an array type of `dimensions` dimensions.
    #[must_use]
    pub fn array_of(element: Self, dimensions: u8) -> Self {
        (0..dimensions).fold(element, |it, _| it.into_array_type())
    }

    /// Checks whether values of this type take two slots.
    #[must_use]
    pub fn is_double_word(&self) -> bool {
        matches!(self, Self::Base(it) if it.is_double_word())
    }

    /// The class of objects of this type, if it is a class or interface type.
    #[must_use]
    pub fn class(&self) -> Option<&ClassRef> {
        match self {
            Self::Object(class) => Some(class),
            _ => None,
        }
    }
}

impl Descriptor for FieldType {
    fn descriptor(&self) -> String {
        match self {
            Self::Base(it) => it.descriptor(),
            Self::Object(ClassRef { binary_name }) => format!("L{binary_name};"),
            Self::Array(inner) => format!("[{}", inner.descriptor()),
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base(it) => it.fmt(f),
            Self::Object(class) => class.fmt(f),
            Self::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

impl FromStr for FieldType {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let mut chars = descriptor.chars();
        let parsed = match chars.next().ok_or(InvalidDescriptor)? {
            '[' => Self::from_str(chars.as_str())?.into_array_type(),
            'L' => {
                let binary_name: String = chars.take_while_ref(|it| *it != ';').collect();
                match (chars.next(), chars.next()) {
                    (Some(';'), None) if !binary_name.is_empty() => {
                        Self::Object(ClassRef::new(binary_name))
                    }
                    _ => Err(InvalidDescriptor)?,
                }
            }
            c => match chars.next() {
                None => Self::Base(PrimitiveType::try_from(c)?),
                Some(_) => Err(InvalidDescriptor)?,
            },
        };
        Ok(parsed)
    }
}
