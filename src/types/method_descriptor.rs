//! Non-generic JVM method descriptors.

use std::{
    fmt::Display,
    str::{Chars, FromStr},
};

use itertools::Itertools;

use super::{
    Descriptor, InvalidDescriptor,
    field_type::{FieldType, PrimitiveType},
    references::ClassRef,
};
use crate::macros::see_jvm_spec;

/// The descriptor of a method.
/// Consists of the parameters types and the return type.
#[doc = see_jvm_spec!(4, 3, 3)]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct MethodDescriptor {
    /// The type of the parameters.
    pub parameters_types: Vec<FieldType>,
    /// The return type.
    pub return_type: ReturnType,
}

/// Denotes the return type of a method.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum ReturnType {
    /// The method returns a specific type.
    Some(FieldType),
    /// The return type of the method is `void`.
    Void,
}

impl MethodDescriptor {
    /// The number of operand stack slots taken by the arguments,
    /// including the receiver if `has_receiver` is set.
    #[must_use]
    pub fn argument_slots(&self, has_receiver: bool) -> usize {
        let params: usize = self
            .parameters_types
            .iter()
            .map(|it| if it.is_double_word() { 2 } else { 1 })
            .sum();
        params + usize::from(has_receiver)
    }

    fn parse_single_param(
        prefix: char,
        remaining: &mut Chars<'_>,
    ) -> Result<FieldType, InvalidDescriptor> {
        if let Ok(p) = PrimitiveType::try_from(prefix) {
            return Ok(FieldType::Base(p));
        }
        match prefix {
            'L' => {
                let binary_name: String = remaining.take_while_ref(|c| *c != ';').collect();
                match remaining.next() {
                    Some(';') if !binary_name.is_empty() => {
                        Ok(FieldType::Object(ClassRef::new(binary_name)))
                    }
                    _ => Err(InvalidDescriptor),
                }
            }
            '[' => {
                let next_prefix = remaining.next().ok_or(InvalidDescriptor)?;
                Self::parse_single_param(next_prefix, remaining).map(FieldType::into_array_type)
            }
            _ => Err(InvalidDescriptor),
        }
    }
}

impl FromStr for MethodDescriptor {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let mut chars = descriptor.chars();
        if chars.next() != Some('(') {
            return Err(InvalidDescriptor);
        }
        let mut parameters_types = Vec::new();
        let return_type = loop {
            match chars.next().ok_or(InvalidDescriptor)? {
                ')' => break ReturnType::from_str(chars.as_str())?,
                c => parameters_types.push(Self::parse_single_param(c, &mut chars)?),
            }
        };
        Ok(Self {
            parameters_types,
            return_type,
        })
    }
}

impl Display for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

impl Descriptor for MethodDescriptor {
    fn descriptor(&self) -> String {
        format!(
            "({}){}",
            self.parameters_types.iter().map(Descriptor::descriptor).join(""),
            self.return_type.descriptor()
        )
    }
}

impl FromStr for ReturnType {
    type Err = InvalidDescriptor;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        if descriptor == "V" {
            Ok(ReturnType::Void)
        } else {
            FieldType::from_str(descriptor).map(ReturnType::Some)
        }
    }
}

impl Descriptor for ReturnType {
    fn descriptor(&self) -> String {
        match self {
            ReturnType::Some(it) => it.descriptor(),
            ReturnType::Void => "V".to_owned(),
        }
    }
}

impl Display for ReturnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnType::Some(t) => t.fmt(f),
            ReturnType::Void => write!(f, "void"),
        }
    }
}
