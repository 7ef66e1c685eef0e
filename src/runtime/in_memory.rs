use std::collections::{BTreeMap, HashMap, HashSet};

use super::{ConstantPool, FieldInfo, MethodInfo, PoolConstant, Runtime, TypeInfo};
use crate::types::{ClassRef, FieldRef, FieldType, MethodRef};

#[derive(Debug, Clone, PartialEq)]
enum PoolEntry {
    Constant(PoolConstant),
    Type(FieldType),
    Field(FieldRef),
    Method(MethodRef),
}

/// A [`ConstantPool`] assembled in memory, handing out indices in insertion order.
///
/// As in class files, indices start at 1 and `long`/`double` constants take two entries.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryConstantPool {
    entries: BTreeMap<u16, PoolEntry>,
    next_index: u16,
}

impl Default for InMemoryConstantPool {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_index: 1,
        }
    }
}

impl InMemoryConstantPool {
    /// Creates an empty constant pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, entry: PoolEntry) -> u16 {
        let index = self.next_index;
        let width = match entry {
            PoolEntry::Constant(PoolConstant::Long(_) | PoolConstant::Double(_)) => 2,
            _ => 1,
        };
        self.entries.insert(index, entry);
        self.next_index += width;
        index
    }

    /// Adds a loadable constant and returns its index.
    pub fn add_constant(&mut self, constant: PoolConstant) -> u16 {
        self.add(PoolEntry::Constant(constant))
    }

    /// Adds a class entry and returns its index.
    pub fn add_type(&mut self, class: FieldType) -> u16 {
        self.add(PoolEntry::Type(class))
    }

    /// Adds a field reference and returns its index.
    pub fn add_field(&mut self, field: FieldRef) -> u16 {
        self.add(PoolEntry::Field(field))
    }

    /// Adds a method reference and returns its index.
    pub fn add_method(&mut self, method: MethodRef) -> u16 {
        self.add(PoolEntry::Method(method))
    }
}

impl ConstantPool for InMemoryConstantPool {
    fn lookup_constant(&self, index: u16) -> Option<PoolConstant> {
        match self.entries.get(&index)? {
            PoolEntry::Constant(it) => Some(it.clone()),
            PoolEntry::Type(FieldType::Object(class)) => Some(PoolConstant::Class(class.clone())),
            _ => None,
        }
    }

    fn lookup_type(&self, index: u16) -> Option<FieldType> {
        match self.entries.get(&index)? {
            PoolEntry::Type(it) => Some(it.clone()),
            _ => None,
        }
    }

    fn lookup_field(&self, index: u16) -> Option<FieldRef> {
        match self.entries.get(&index)? {
            PoolEntry::Field(it) => Some(it.clone()),
            _ => None,
        }
    }

    fn lookup_method(&self, index: u16) -> Option<MethodRef> {
        match self.entries.get(&index)? {
            PoolEntry::Method(it) => Some(it.clone()),
            _ => None,
        }
    }
}

/// A [`Runtime`] backed by hash maps, for tools and tests that build methods by hand.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    pools: HashMap<ClassRef, InMemoryConstantPool>,
    types: HashMap<ClassRef, TypeInfo>,
    fields: HashMap<FieldRef, FieldInfo>,
    methods: HashMap<MethodRef, MethodInfo>,
    not_inlinable: HashSet<MethodRef>,
}

impl InMemoryRuntime {
    /// Creates an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The constant pool of `holder`, created on first access.
    pub fn pool_mut(&mut self, holder: &ClassRef) -> &mut InMemoryConstantPool {
        self.pools.entry(holder.clone()).or_default()
    }

    /// Registers a loaded class.
    pub fn add_type(&mut self, info: TypeInfo) {
        self.types.insert(info.class.clone(), info);
    }

    /// Registers a resolved field.
    pub fn add_field(&mut self, info: FieldInfo) {
        self.fields.insert(info.field.clone(), info);
    }

    /// Registers a loaded method.
    pub fn add_method(&mut self, info: MethodInfo) {
        self.methods.insert(info.method.clone(), info);
    }

    /// Forbids inlining `method`.
    pub fn forbid_inlining(&mut self, method: MethodRef) {
        self.not_inlinable.insert(method);
    }

    /// Looks up a registered method.
    #[must_use]
    pub fn method(&self, method: &MethodRef) -> Option<&MethodInfo> {
        self.methods.get(method)
    }
}

impl Runtime for InMemoryRuntime {
    fn constant_pool(&self, holder: &ClassRef) -> Option<&dyn ConstantPool> {
        self.pools
            .get(holder)
            .map(|it| it as &dyn ConstantPool)
    }

    fn resolve_type(&self, class: &ClassRef) -> Option<&TypeInfo> {
        self.types.get(class)
    }

    fn resolve_field(&self, field: &FieldRef) -> Option<&FieldInfo> {
        self.fields.get(field)
    }

    fn resolve_method(&self, method: &MethodRef) -> Option<&MethodInfo> {
        self.resolve_method_impl(&method.owner, method)
    }

    fn resolve_method_impl(&self, receiver: &ClassRef, method: &MethodRef) -> Option<&MethodInfo> {
        let mut current = Some(receiver.clone());
        while let Some(class) = current {
            let candidate = MethodRef {
                owner: class.clone(),
                ..method.clone()
            };
            if let Some(found) = self.methods.get(&candidate) {
                return Some(found);
            }
            current = self
                .types
                .get(&class)
                .and_then(|it| it.super_class.clone());
        }
        None
    }

    fn must_not_inline(&self, method: &MethodRef) -> bool {
        self.not_inlinable.contains(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MethodAccessFlags;

    #[test]
    fn wide_constants_take_two_entries() {
        let mut pool = InMemoryConstantPool::new();
        let long = pool.add_constant(PoolConstant::Long(7));
        let int = pool.add_constant(PoolConstant::Integer(3));
        assert_eq!((long, int), (1, 3));
        assert_eq!(pool.lookup_constant(3), Some(PoolConstant::Integer(3)));
        assert_eq!(pool.lookup_constant(2), None);
        assert_eq!(pool.lookup_field(1), None);
    }

    #[test]
    fn implementations_are_inherited() {
        let base = ClassRef::new("Base");
        let derived = ClassRef::new("Derived");
        let mut runtime = InMemoryRuntime::new();
        runtime.add_type(TypeInfo::leaf(base.clone(), None));
        runtime.add_type(TypeInfo::leaf(derived.clone(), Some(base.clone())));
        let method = MethodRef {
            owner: base.clone(),
            name: "run".to_owned(),
            descriptor: "()V".parse().unwrap(),
        };
        runtime.add_method(MethodInfo::new(method.clone(), MethodAccessFlags::PUBLIC, None));

        let via_derived = MethodRef {
            owner: derived.clone(),
            ..method.clone()
        };
        let resolved = runtime.resolve_method(&via_derived).unwrap();
        assert_eq!(resolved.method.owner, base);
        assert!(runtime.resolve_method_impl(&ClassRef::new("Other"), &method).is_none());
    }
}
