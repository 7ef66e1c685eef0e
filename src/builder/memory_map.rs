use std::collections::{HashMap, HashSet};

use crate::{ir::ValueId, types::FieldRef};

/// The field values known in the current block.
///
/// Only non-volatile, resolved fields are tracked. A store to a field forgets the field of every
/// other object, since the objects may be the same.
#[derive(Debug, Default)]
pub(super) struct MemoryMap {
    instance_fields: HashMap<FieldRef, HashMap<ValueId, ValueId>>,
    static_fields: HashMap<FieldRef, ValueId>,
    fresh_objects: HashSet<ValueId>,
    initialized: HashSet<(ValueId, FieldRef)>,
}

impl MemoryMap {
    /// Records an object allocated in the current block.
    pub fn new_instance(&mut self, object: ValueId) {
        self.fresh_objects.insert(object);
    }

    /// The known value of a field, a static field if `object` is [`None`].
    pub fn load(&self, object: Option<ValueId>, field: &FieldRef) -> Option<ValueId> {
        match object {
            Some(object) => self
                .instance_fields
                .get(field)
                .and_then(|it| it.get(&object))
                .copied(),
            None => self.static_fields.get(field).copied(),
        }
    }

    /// Records the value loaded from a field.
    pub fn record_load(&mut self, object: Option<ValueId>, field: &FieldRef, value: ValueId) {
        match object {
            Some(object) => {
                self.instance_fields
                    .entry(field.clone())
                    .or_default()
                    .insert(object, value);
            }
            None => {
                self.static_fields.insert(field.clone(), value);
            }
        }
    }

    /// Records a store and checks whether it can be dropped.
    ///
    /// A store is redundant if the field is known to hold `value` already, or if `value` is the
    /// default value and the object was allocated in this block and its field was never stored.
    pub fn store(
        &mut self,
        object: Option<ValueId>,
        field: &FieldRef,
        value: ValueId,
        is_default_value: bool,
    ) -> bool {
        self.escape(value);
        if self.load(object, field) == Some(value) {
            return true;
        }
        let Some(object) = object else {
            self.static_fields.insert(field.clone(), value);
            return false;
        };
        let key = (object, field.clone());
        if is_default_value
            && self.fresh_objects.contains(&object)
            && !self.initialized.contains(&key)
        {
            return true;
        }
        let known = self.instance_fields.entry(field.clone()).or_default();
        known.clear();
        known.insert(object, value);
        self.initialized.insert(key);
        false
    }

    /// Records that `value` is reachable from memory.
    pub fn escape(&mut self, value: ValueId) {
        self.fresh_objects.remove(&value);
    }

    /// Forgets everything.
    pub fn kill(&mut self) {
        self.instance_fields.clear();
        self.static_fields.clear();
        self.fresh_objects.clear();
        self.initialized.clear();
    }
}
