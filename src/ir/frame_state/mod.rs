//! The abstract state of the JVM frame at a program point.
mod entry;
mod error;
mod operations;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use itertools::Itertools;

pub use entry::Entry;
pub use error::FrameStateError;
pub(crate) use operations::StackOperations;

use super::{PhiSlot, ValueId, ValueKind};
use crate::types::{FieldType, MethodDescriptor};

/// The owner of the phis created while merging frame states into a block.
pub(crate) trait PhiFactory {
    /// Checks whether `value` is a phi of the block for `slot`.
    fn is_phi(&self, value: ValueId, slot: PhiSlot) -> bool;

    /// Creates a phi of the block for `slot`.
    fn create_phi(&mut self, slot: PhiSlot, kind: ValueKind, operands: Vec<ValueId>) -> ValueId;

    /// Adds `operand` to the operands of `phi` unless it is already there.
    fn add_phi_operand(&mut self, phi: ValueId, operand: ValueId);
}

/// The local variables, operand stack, and held monitors at a program point.
///
/// The operand stack of an inlined method sits on top of the operand stack of its caller, and
/// the caller state is kept for reconstructing the caller frame.
/// Like the JVM frame, a `long` or `double` takes two slots, where the upper one is [`Entry::Top`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameState {
    max_stack: u16,
    locals: Vec<Entry>,
    stack: Vec<Entry>,
    locks: Vec<ValueId>,
    caller: Option<Arc<FrameState>>,
}

impl FrameState {
    /// Creates an empty state of a method with the given frame size.
    #[must_use]
    pub fn new(max_locals: u16, max_stack: u16) -> Self {
        Self {
            max_stack,
            locals: vec![Entry::Empty; max_locals.into()],
            stack: Vec::with_capacity(max_stack.into()),
            locks: Vec::new(),
            caller: None,
        }
    }

    /// The local variables of the innermost method.
    #[must_use]
    pub fn locals(&self) -> &[Entry] {
        &self.locals
    }

    /// The operand stack including the operands of the callers, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[Entry] {
        &self.stack
    }

    /// The objects whose monitors are held, outermost first.
    #[must_use]
    pub fn locks(&self) -> &[ValueId] {
        &self.locks
    }

    /// The state of the calling method if this state belongs to an inlined method.
    #[must_use]
    pub fn caller(&self) -> Option<&FrameState> {
        self.caller.as_deref()
    }

    /// The number of inlined methods the state is nested in.
    #[must_use]
    pub fn scope_depth(&self) -> usize {
        std::iter::successors(self.caller(), |it| it.caller()).count()
    }

    /// The number of slots on the operand stack.
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// The maximum number of stack slots, including those of the callers.
    #[must_use]
    pub const fn max_stack(&self) -> u16 {
        self.max_stack
    }

    /// Every value the state refers to, including those of the callers.
    #[must_use]
    pub fn values(&self) -> Vec<ValueId> {
        let own = self
            .locals
            .iter()
            .chain(self.stack.iter())
            .filter_map(|it| it.value())
            .chain(self.locks.iter().copied());
        let callers = self.caller().map(Self::values).unwrap_or_default();
        own.chain(callers).unique().collect()
    }

    pub(crate) fn pop_raw(&mut self) -> Result<Entry, FrameStateError> {
        self.stack.pop().ok_or(FrameStateError::StackUnderflow)
    }

    pub(crate) fn push_raw(&mut self, entry: Entry) -> Result<(), FrameStateError> {
        if self.stack.len() >= usize::from(self.max_stack) {
            Err(FrameStateError::StackOverflow)
        } else {
            self.stack.push(entry);
            Ok(())
        }
    }

    /// Pushes a value, taking two slots for `long` and `double`.
    /// # Errors
    /// - [`FrameStateError::StackOverflow`] if the stack is full.
    pub fn push(&mut self, value: ValueId, kind: ValueKind) -> Result<(), FrameStateError> {
        if kind.is_double_word() {
            self.push_raw(Entry::Top)?;
        }
        self.push_raw(Entry::Value(value, kind))
    }

    /// Pops a value of any kind.
    /// # Errors
    /// - [`FrameStateError::StackUnderflow`] if the stack is empty.
    /// - [`FrameStateError::ValueMismatch`] if the top is half of a `long` or `double`.
    pub fn pop_value(&mut self) -> Result<(ValueId, ValueKind), FrameStateError> {
        let Entry::Value(value, kind) = self.pop_raw()? else {
            return Err(FrameStateError::ValueMismatch);
        };
        if kind.is_double_word() && self.pop_raw()? != Entry::Top {
            return Err(FrameStateError::ValueMismatch);
        }
        Ok((value, kind))
    }

    /// Pops a value of the given kind.
    /// # Errors
    /// See [`FrameState::pop_value`]. [`FrameStateError::ValueMismatch`] if the kind differs.
    pub fn pop_kind(&mut self, kind: ValueKind) -> Result<ValueId, FrameStateError> {
        match self.pop_value()? {
            (value, actual) if actual == kind => Ok(value),
            _ => Err(FrameStateError::ValueMismatch),
        }
    }

    /// Pops a value of the kind of `field_type`.
    /// # Errors
    /// See [`FrameState::pop_kind`].
    pub fn pop_typed(&mut self, field_type: &FieldType) -> Result<ValueId, FrameStateError> {
        self.pop_kind(field_type.into())
    }

    /// Pops the operand of `astore`, which is either a reference or a return address.
    /// # Errors
    /// See [`FrameState::pop_kind`].
    pub fn pop_object_or_address(&mut self) -> Result<(ValueId, ValueKind), FrameStateError> {
        match self.pop_value()? {
            it @ (_, ValueKind::Object | ValueKind::ReturnAddress) => Ok(it),
            _ => Err(FrameStateError::ValueMismatch),
        }
    }

    /// The slot `depth` entries below the top of the stack.
    /// # Errors
    /// - [`FrameStateError::StackUnderflow`] if the stack is not deep enough.
    pub fn peek(&self, depth: usize) -> Result<Entry, FrameStateError> {
        self.stack
            .iter()
            .rev()
            .nth(depth)
            .copied()
            .ok_or(FrameStateError::StackUnderflow)
    }

    /// Pops the arguments of a call, receiver first.
    /// # Errors
    /// See [`FrameState::pop_kind`].
    pub fn pop_arguments(
        &mut self,
        descriptor: &MethodDescriptor,
        has_receiver: bool,
    ) -> Result<Vec<ValueId>, FrameStateError> {
        let mut arguments: Vec<_> = descriptor
            .parameters_types
            .iter()
            .rev()
            .map(|param_type| self.pop_typed(param_type))
            .try_collect()?;
        if has_receiver {
            arguments.push(self.pop_kind(ValueKind::Object)?);
        }
        arguments.reverse();
        Ok(arguments)
    }

    /// Drops the stack down to `size` slots.
    pub fn truncate_stack(&mut self, size: usize) {
        self.stack.truncate(size);
    }

    /// A copy of the state with the stack dropped down to `size` slots.
    #[must_use]
    pub fn with_stack_size(&self, size: usize) -> Self {
        let mut state = self.clone();
        state.truncate_stack(size);
        state
    }

    /// The content of a local variable.
    /// # Errors
    /// - [`FrameStateError::LocalLimitExceed`] if `index` is not a slot of the method.
    pub fn local(&self, index: u16) -> Result<Entry, FrameStateError> {
        self.locals
            .get(usize::from(index))
            .copied()
            .ok_or(FrameStateError::LocalLimitExceed)
    }

    /// Reads a local variable of the given kind.
    /// # Errors
    /// - [`FrameStateError::LocalLimitExceed`] if `index` is not a slot of the method.
    /// - [`FrameStateError::LocalUninitialized`] if the local holds no value.
    /// - [`FrameStateError::ValueMismatch`] if the local holds a value of another kind.
    pub fn load_local(&self, index: u16, kind: ValueKind) -> Result<ValueId, FrameStateError> {
        let idx = usize::from(index);
        let value = match self.local(index)? {
            Entry::Value(value, actual) if actual == kind => Ok(value),
            Entry::Value(..) | Entry::Top => Err(FrameStateError::ValueMismatch),
            Entry::Empty => Err(FrameStateError::LocalUninitialized),
        }?;
        if kind.is_double_word() {
            let higher_slot = self
                .locals
                .get(idx + 1)
                .ok_or(FrameStateError::LocalLimitExceed)?;
            if *higher_slot != Entry::Top {
                return Err(FrameStateError::ValueMismatch);
            }
        }
        Ok(value)
    }

    /// Writes a local variable, clearing any `long` or `double` the write partially overlaps.
    /// # Errors
    /// - [`FrameStateError::LocalLimitExceed`] if the value does not fit into the locals.
    pub fn store_local(
        &mut self,
        index: u16,
        value: ValueId,
        kind: ValueKind,
    ) -> Result<(), FrameStateError> {
        let idx = usize::from(index);
        let width = if kind.is_double_word() { 2 } else { 1 };
        if idx + width > self.locals.len() {
            return Err(FrameStateError::LocalLimitExceed);
        }
        if idx > 0 && self.locals[idx - 1].is_double_word() {
            self.locals[idx - 1] = Entry::Empty;
        }
        if let Some(next) = self.locals.get_mut(idx + width) {
            if *next == Entry::Top {
                *next = Entry::Empty;
            }
        }
        self.locals[idx] = Entry::Value(value, kind);
        if width == 2 {
            self.locals[idx + 1] = Entry::Top;
        }
        Ok(())
    }

    fn invalidate_local(&mut self, idx: usize) {
        if self.locals[idx].is_double_word() {
            if let Some(higher_slot) = self.locals.get_mut(idx + 1) {
                *higher_slot = Entry::Empty;
            }
        }
        self.locals[idx] = Entry::Empty;
    }

    /// Acquires the monitor of `object` and returns the number of held monitors.
    pub fn lock(&mut self, object: ValueId) -> usize {
        self.locks.push(object);
        self.locks.len()
    }

    /// Releases the innermost monitor and returns its object with the number of monitors
    /// held before.
    /// # Errors
    /// - [`FrameStateError::LockUnderflow`] if no monitor is held.
    pub fn unlock(&mut self) -> Result<(ValueId, usize), FrameStateError> {
        let depth = self.locks.len();
        let object = self.locks.pop().ok_or(FrameStateError::LockUnderflow)?;
        Ok((object, depth))
    }

    /// Enters an inlined method with the given frame size.
    ///
    /// The new state keeps the stack and the monitors of `self`, and starts with empty locals.
    #[must_use]
    pub fn push_scope(&self, max_locals: u16, max_stack: u16) -> Self {
        Self {
            max_stack: self.max_stack.saturating_add(max_stack),
            locals: vec![Entry::Empty; max_locals.into()],
            stack: self.stack.clone(),
            locks: self.locks.clone(),
            caller: Some(Arc::new(self.clone())),
        }
    }

    /// Returns to the calling method, restoring its locals.
    /// The stack and the monitors carry over.
    /// # Errors
    /// - [`FrameStateError::NoCaller`] if the state does not belong to an inlined method.
    pub fn pop_scope(&self) -> Result<Self, FrameStateError> {
        let caller = self.caller.as_ref().ok_or(FrameStateError::NoCaller)?;
        Ok(Self {
            max_stack: caller.max_stack,
            locals: caller.locals.clone(),
            stack: self.stack.clone(),
            locks: self.locks.clone(),
            caller: caller.caller.clone(),
        })
    }

    fn check_compatible(&self, other: &Self) -> Result<(), FrameStateError> {
        if self.locals.len() != other.locals.len() {
            Err(FrameStateError::LocalLimitMismatch)
        } else if self.stack.len() != other.stack.len() {
            Err(FrameStateError::StackSizeMismatch)
        } else if self.locks != other.locks {
            Err(FrameStateError::LockMismatch)
        } else {
            Ok(())
        }
    }

    /// Merges the state of another predecessor into this entry state of a block that has not
    /// been translated yet.
    ///
    /// Differing stack slots and locals get phis. Locals holding values of different kinds,
    /// or a value on one side only, are cleared.
    /// # Errors
    /// - [`FrameStateError::LocalLimitMismatch`], [`FrameStateError::StackSizeMismatch`], or
    ///   [`FrameStateError::LockMismatch`] if the states have different shapes.
    /// - [`FrameStateError::ValueMismatch`] if stack slots hold values of different kinds.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn merge<P: PhiFactory>(
        &mut self,
        other: &Self,
        phis: &mut P,
    ) -> Result<(), FrameStateError> {
        self.check_compatible(other)?;
        for idx in 0..self.locals.len() {
            let Entry::Value(existing, kind) = self.locals[idx] else {
                continue;
            };
            let slot = PhiSlot::Local(idx as u16);
            match other.locals[idx] {
                Entry::Value(incoming, _) if incoming == existing => {}
                Entry::Value(incoming, incoming_kind) if incoming_kind == kind => {
                    if phis.is_phi(existing, slot) {
                        phis.add_phi_operand(existing, incoming);
                    } else {
                        let phi = phis.create_phi(slot, kind, vec![existing, incoming]);
                        self.locals[idx] = Entry::Value(phi, kind);
                    }
                }
                Entry::Value(..) | Entry::Top | Entry::Empty => self.invalidate_local(idx),
            }
        }
        for idx in 0..self.stack.len() {
            let slot = PhiSlot::Stack(idx as u16);
            match (self.stack[idx], other.stack[idx]) {
                (Entry::Value(existing, kind), Entry::Value(incoming, incoming_kind))
                    if kind == incoming_kind =>
                {
                    if existing == incoming {
                        continue;
                    }
                    if phis.is_phi(existing, slot) {
                        phis.add_phi_operand(existing, incoming);
                    } else {
                        let phi = phis.create_phi(slot, kind, vec![existing, incoming]);
                        self.stack[idx] = Entry::Value(phi, kind);
                    }
                }
                (Entry::Top, Entry::Top) => {}
                _ => return Err(FrameStateError::ValueMismatch),
            }
        }
        Ok(())
    }

    /// Gives every stack slot and every local satisfying `stored_in_loop` a phi, making this
    /// the entry state of a loop header reached for the first time.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn insert_loop_phis<P, F>(&mut self, stored_in_loop: F, phis: &mut P)
    where
        P: PhiFactory,
        F: Fn(usize) -> bool,
    {
        for idx in 0..self.stack.len() {
            if let Entry::Value(value, kind) = self.stack[idx] {
                let phi = phis.create_phi(PhiSlot::Stack(idx as u16), kind, vec![value]);
                self.stack[idx] = Entry::Value(phi, kind);
            }
        }
        for idx in 0..self.locals.len() {
            if let Entry::Value(value, kind) = self.locals[idx] {
                if stored_in_loop(idx) || (kind.is_double_word() && stored_in_loop(idx + 1)) {
                    let phi = phis.create_phi(PhiSlot::Local(idx as u16), kind, vec![value]);
                    self.locals[idx] = Entry::Value(phi, kind);
                }
            }
        }
    }

    /// Merges the state at a back edge into the entry state of a translated loop header.
    ///
    /// Every differing slot must hold a phi of the header, which gets the incoming value as an
    /// operand. Locals whose kinds diverge are cleared.
    /// # Errors
    /// - [`FrameStateError::NotAPhi`] if a differing slot has no phi.
    /// - See [`FrameState::merge`] for the other errors.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn merge_back_edge<P: PhiFactory>(
        &mut self,
        other: &Self,
        phis: &mut P,
    ) -> Result<(), FrameStateError> {
        self.check_compatible(other)?;
        for idx in 0..self.locals.len() {
            let Entry::Value(existing, kind) = self.locals[idx] else {
                continue;
            };
            let incoming = other.locals[idx];
            if incoming == Entry::Value(existing, kind) {
                continue;
            }
            let slot = PhiSlot::Local(idx as u16);
            if !phis.is_phi(existing, slot) {
                return Err(FrameStateError::NotAPhi(slot));
            }
            match incoming {
                Entry::Value(incoming, incoming_kind) if incoming_kind == kind => {
                    phis.add_phi_operand(existing, incoming);
                }
                _ => self.invalidate_local(idx),
            }
        }
        for idx in 0..self.stack.len() {
            let slot = PhiSlot::Stack(idx as u16);
            match (self.stack[idx], other.stack[idx]) {
                (Entry::Value(existing, kind), Entry::Value(incoming, incoming_kind))
                    if kind == incoming_kind =>
                {
                    if existing == incoming {
                        continue;
                    }
                    if !phis.is_phi(existing, slot) {
                        return Err(FrameStateError::NotAPhi(slot));
                    }
                    phis.add_phi_operand(existing, incoming);
                }
                (Entry::Top, Entry::Top) => {}
                _ => return Err(FrameStateError::ValueMismatch),
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for FrameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "locals: [{}], stack: [{}], locks: [{}]",
            self.locals.iter().join(", "),
            self.stack.iter().join(", "),
            self.locks.iter().join(", ")
        )
    }
}
