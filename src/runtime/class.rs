use bitflags::bitflags;

use crate::{
    macros::see_jvm_spec,
    types::{ClassRef, FieldRef},
};

bitflags! {
    /// The access flags of a class.
    #[doc = see_jvm_spec!(4, 1)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
    pub struct ClassAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `final`; no subclasses allowed.
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by the `invokespecial` instruction.
        const SUPER = 0x0020;
        /// Is an interface, not a class.
        const INTERFACE = 0x0200;
        /// Declared `abstract`; must not be instantiated.
        const ABSTRACT = 0x0400;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface.
        const ANNOTATION = 0x2000;
        /// Declared as an `enum` class.
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// The access flags of a field.
    #[doc = see_jvm_spec!(4, 5)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
    pub struct FieldAccessFlags: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within the defining class and other classes belonging to the same nest.
        const PRIVATE = 0x0002;
        /// Declared `protected`; may be accessed within subclasses.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`; never directly assigned to after object construction.
        const FINAL = 0x0010;
        /// Declared `volatile`; cannot be cached.
        const VOLATILE = 0x0040;
        /// Declared `transient`; not written or read by a persistent object manager.
        const TRANSIENT = 0x0080;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an `enum` class.
        const ENUM = 0x4000;
    }
}

/// What the runtime knows about a loaded class or interface.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TypeInfo {
    /// The class.
    pub class: ClassRef,
    /// The direct superclass, [`None`] for `java/lang/Object` and interfaces.
    pub super_class: Option<ClassRef>,
    /// The access flags.
    pub access_flags: ClassAccessFlags,
    /// Whether the static initializer has completed.
    pub initialized: bool,
    /// Whether any loaded class extends this class.
    pub has_subclass: bool,
    /// Whether the class declares or inherits a non-trivial `finalize` method.
    pub has_finalizer: bool,
    /// Whether any loaded subclass has a non-trivial `finalize` method.
    pub has_finalizable_subclass: bool,
}

impl TypeInfo {
    /// Creates an initialized class without subclasses or finalizers.
    #[must_use]
    pub fn leaf(class: ClassRef, super_class: Option<ClassRef>) -> Self {
        Self {
            class,
            super_class,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            initialized: true,
            has_subclass: false,
            has_finalizer: false,
            has_finalizable_subclass: false,
        }
    }

    /// Checks if the class is `final`.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::FINAL)
    }

    /// Checks if this is an interface.
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// The exact type of every instance of this type, which is only known for `final` classes.
    #[must_use]
    pub fn exact_type(&self) -> Option<&ClassRef> {
        self.is_final().then_some(&self.class)
    }
}

/// What the runtime knows about a resolved field.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FieldInfo {
    /// The field.
    pub field: FieldRef,
    /// The access flags.
    pub access_flags: FieldAccessFlags,
}

impl FieldInfo {
    /// Checks if the field is `static`.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    /// Checks if the field is `volatile`.
    #[must_use]
    pub const fn is_volatile(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::VOLATILE)
    }
}
