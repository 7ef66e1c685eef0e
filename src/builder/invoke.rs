use std::{mem, rc::Rc};

use super::{
    Bailout, BuildError, Flow, Translator,
    intrinsics::{self, IntrinsicInfo},
    scope::{DirectReturn, Scope, ScopeKind},
};
use crate::{
    block_map::BlockMap,
    bytecode::{BytecodeStream, ProgramCounter, RawInstruction},
    ir::{
        Assumption, BlockFlags, Constant, Instruction, Intrinsic, InvokeKind, Terminator, ValueId,
        ValueKind,
    },
    runtime::{MethodCode, MethodInfo, TypeInfo},
    types::{ClassRef, MethodRef},
};

impl<'b> Translator<'b> {
    /// Translates a call to the method referenced by constant pool entry `index`.
    pub(super) fn invoke(
        &mut self,
        kind: InvokeKind,
        index: u16,
        next: ProgramCounter,
    ) -> Result<Flow, BuildError> {
        let target = self.lookup_method(index)?;
        let runtime = self.runtime;
        let resolved = runtime.resolve_method(&target);
        if let Some(info) = resolved {
            if info.is_static() != (kind == InvokeKind::Static) {
                Err(Bailout::LinkError(target.clone()))?;
            }
        }
        let arguments = self
            .state
            .pop_arguments(&target.descriptor, kind.has_receiver())?;
        let result_kind = ValueKind::from(&target.descriptor.return_type);

        if self.options.intrinsify {
            if let Some(info) = intrinsics::lookup(&target) {
                let bound = matches!(kind, InvokeKind::Static | InvokeKind::Special)
                    || resolved.is_some_and(MethodInfo::can_be_statically_bound);
                if bound {
                    return self.intrinsic(info, arguments, result_kind);
                }
            }
        }

        let receiver = arguments.first().copied().filter(|_| kind.has_receiver());
        let (kind, callee) = self.devirtualize(kind, &target, resolved, receiver);
        if let Some(callee) = callee {
            if let Some(reason) = self.inlining_declined(callee) {
                log::debug!("Not inlining {}: {reason}", callee.method);
            } else {
                log::debug!("Inlining {} at {}", callee.method, self.bci);
                return self.inline(callee, arguments, receiver, next);
            }
        }

        let value = self.append(
            result_kind,
            Instruction::Invoke {
                kind,
                target,
                arguments,
                resolved: resolved.is_some(),
            },
        )?;
        if result_kind != ValueKind::Void {
            self.state.push(value, result_kind)?;
        }
        Ok(Flow::Continue)
    }

    fn intrinsic(
        &mut self,
        info: IntrinsicInfo,
        arguments: Vec<ValueId>,
        result_kind: ValueKind,
    ) -> Result<Flow, BuildError> {
        let folded = if info.foldable && self.options.fold_intrinsics {
            let constants: Option<Vec<_>> =
                arguments.iter().map(|it| self.constant_of(*it)).collect();
            constants.and_then(|it| intrinsics::fold(info.intrinsic, &it))
        } else {
            None
        };
        if let Some(constant) = folded {
            self.push_constant(constant)?;
            return Ok(Flow::Continue);
        }
        let value = self.append(
            result_kind,
            Instruction::Intrinsic {
                intrinsic: info.intrinsic,
                arguments,
                preserves_state: info.preserves_state,
                can_trap: info.can_trap,
            },
        )?;
        if result_kind != ValueKind::Void {
            self.state.push(value, result_kind)?;
        }
        Ok(Flow::Continue)
    }

    /// Binds a call to a single implementation if possible.
    ///
    /// Returns the kind of the call to emit and the bound implementation.
    fn devirtualize(
        &mut self,
        kind: InvokeKind,
        target: &MethodRef,
        resolved: Option<&'b MethodInfo>,
        receiver: Option<ValueId>,
    ) -> (InvokeKind, Option<&'b MethodInfo>) {
        let runtime = self.runtime;
        let Some(info) = resolved else {
            return (kind, None);
        };
        if matches!(kind, InvokeKind::Static | InvokeKind::Special) {
            return (kind, Some(info));
        }
        if info.can_be_statically_bound() {
            return (InvokeKind::Special, Some(info));
        }
        let exact_type = receiver
            .and_then(|it| self.exact_type_of(it))
            .or_else(|| {
                runtime
                    .resolve_type(&target.owner)
                    .and_then(TypeInfo::exact_type)
                    .cloned()
            });
        if let Some(class) = exact_type {
            if let Some(implementation) = runtime.resolve_method_impl(&class, target) {
                return (InvokeKind::Special, Some(implementation));
            }
        }
        if self.options.speculate_leaf_methods
            && kind == InvokeKind::Virtual
            && !info.overridden
            && !info.is_abstract()
        {
            self.assume(Assumption::LeafMethod(info.method.clone()));
            return (InvokeKind::Special, Some(info));
        }
        if self.options.speculate_leaf_types {
            let leaf = runtime
                .resolve_type(&target.owner)
                .filter(|it| !it.has_subclass && !it.is_interface());
            if let Some(owner) = leaf {
                if let Some(implementation) = runtime.resolve_method_impl(&owner.class, target) {
                    self.assume(Assumption::LeafType(owner.class.clone()));
                    return (InvokeKind::Special, Some(implementation));
                }
            }
        }
        (kind, None)
    }

    fn assume(&mut self, assumption: Assumption) {
        log::debug!("Assuming {assumption} in {}", self.graph.method());
        self.graph.record_assumption(assumption);
    }

    /// The class of every object `value` may be, if known at compile time.
    fn exact_type_of(&self, value: ValueId) -> Option<ClassRef> {
        match &self.graph.value(value).instruction {
            Instruction::NewInstance { class } => Some(class.clone()),
            Instruction::Constant(Constant::String(_)) => Some(ClassRef::new("java/lang/String")),
            Instruction::Constant(Constant::Class(_)) => Some(ClassRef::new("java/lang/Class")),
            _ => None,
        }
    }

    fn is_non_null(&self, value: ValueId) -> bool {
        match &self.graph.value(value).instruction {
            Instruction::Constant(it) => it.is_non_null_object(),
            Instruction::Local { receiver, .. } => *receiver,
            Instruction::NewInstance { .. }
            | Instruction::NewTypeArray { .. }
            | Instruction::NewObjectArray { .. }
            | Instruction::NewMultiArray { .. }
            | Instruction::ExceptionObject => true,
            _ => false,
        }
    }

    /// Why `callee` is not inlined, or [`None`] if it is.
    fn inlining_declined(&self, callee: &MethodInfo) -> Option<&'static str> {
        let options = self.options;
        let top = self.top();
        if !options.inline {
            return Some("inlining is disabled");
        }
        if self.scopes[top].inline_level + 1 > options.max_inline_level {
            return Some("inlining too deep");
        }
        let Some(holder) = self.runtime.resolve_type(&callee.method.owner) else {
            return Some("holder not loaded");
        };
        let recursion = self
            .scopes
            .iter()
            .filter(|it| !it.is_subroutine() && it.method.method == callee.method)
            .count();
        if recursion > options.max_recursive_inline_level {
            return Some("recursive inlining too deep");
        }
        if callee.code_size() > options.max_inline_size {
            return Some("callee is too large");
        }
        if callee.is_static() && !holder.initialized {
            return Some("holder not initialized");
        }
        if self.runtime.must_not_inline(&callee.method) {
            return Some("inlining forbidden by the runtime");
        }
        if callee.is_abstract() {
            return Some("abstract method");
        }
        if callee.is_native() {
            return Some("native method");
        }
        if callee.code.is_none() {
            return Some("no code");
        }
        if callee.is_synchronized() && !options.inline_synchronized_methods {
            return Some("synchronized method");
        }
        if callee.has_exception_handlers() && !options.inline_methods_with_exception_handlers {
            return Some("callee has exception handlers");
        }
        None
    }

    /// Translates the body of `callee` in place of the call.
    fn inline(
        &mut self,
        callee: &MethodInfo,
        arguments: Vec<ValueId>,
        receiver: Option<ValueId>,
        next: ProgramCounter,
    ) -> Result<Flow, BuildError> {
        let Some(code) = callee.code.clone() else {
            return Err(Bailout::MissingMethodBody(callee.method.clone()).into());
        };
        let block_map = BlockMap::build(&code, self.options.precise_loop_stores, None)?;
        let return_count = count_returns(&code)?;
        if let Some(receiver) = receiver {
            if !self.is_non_null(receiver) {
                self.append(ValueKind::Void, Instruction::NullCheck { object: receiver })?;
            }
        }
        let stack_base = self.state.stack_size();
        let sync_object = if callee.is_synchronized() {
            let object = match receiver {
                Some(it) => it,
                None => self.append_constant(Constant::Class(callee.method.owner.clone()))?,
            };
            let lock = self.state.locks().len() + 1;
            self.append(ValueKind::Void, Instruction::MonitorEnter { object, lock })?;
            self.state.lock(object);
            Some(object)
        } else {
            None
        };

        let mut state = self.state.push_scope(code.max_locals, code.max_stack);
        let mut index = 0;
        for argument in arguments {
            let kind = self.graph.value(argument).kind;
            state.store_local(index, argument, kind)?;
            index += if kind.is_double_word() { 2 } else { 1 };
        }
        self.state = state;
        self.graph.record_inlined(callee.method.clone());

        let call_site = self.bci;
        let inline_level = self.scopes[self.top()].inline_level + 1;
        let mut scope = Scope::method(
            Rc::new(callee.clone()),
            Rc::new(code),
            Rc::new(block_map),
            stack_base,
            inline_level,
        );
        scope.kind = ScopeKind::Method {
            sync_object,
            sync_handler: None,
        };
        scope.call_site = Some(call_site);
        scope.resume_bci = Some(next);
        scope.start_block = Some(self.block);
        scope.return_count = return_count;
        self.scopes.push(scope);

        let top = self.top();
        let entry_is_loop = self.scopes[top]
            .block_map
            .get(ProgramCounter::ZERO)
            .is_some_and(|it| it.is(BlockFlags::LOOP_HEADER));
        if entry_is_loop {
            let entry = self.block_at(top, ProgramCounter::ZERO)?;
            self.end_block(Terminator::Goto {
                successor: entry,
                safepoint: false,
            })?;
        } else {
            self.scopes[top]
                .blocks
                .insert(ProgramCounter::ZERO, self.block);
            self.iterate_bytecodes(ProgramCounter::ZERO)?;
        }
        self.iterate_all_blocks()?;

        let Some(scope) = self.scopes.pop() else {
            return Ok(Flow::Stop);
        };
        self.bci = call_site;
        self.state_before = None;
        if let (Some(direct), Some(block)) = (scope.direct_return, scope.start_block) {
            self.block = block;
            self.state = direct.state;
            self.value_map = direct.value_map;
            self.memory_map = direct.memory_map;
            return Ok(Flow::Continue);
        }
        let Some(continuation) = scope.continuation else {
            return Ok(Flow::Stop);
        };
        let continuation_block = self.graph.block_mut(continuation);
        let Some(state) = continuation_block.state_before.clone() else {
            return Ok(Flow::Stop);
        };
        continuation_block.flags |= BlockFlags::WAS_VISITED;
        self.block = continuation;
        self.state = state;
        self.value_map.kill();
        self.memory_map.kill();
        Ok(Flow::Continue)
    }

    /// Translates a `return`, popping a value of `kind` unless it is [`None`].
    pub(super) fn method_return(&mut self, kind: Option<ValueKind>) -> Result<Flow, BuildError> {
        let value = kind.map(|it| self.state.pop_kind(it)).transpose()?;
        let top = self.top();
        let method_scope = self.method_scope(top);
        let method = Rc::clone(&self.scopes[method_scope].method);
        if self.options.register_finalizers_at_init && method.method.is_object_init() {
            self.register_finalizer()?;
        }
        if let ScopeKind::Method {
            sync_object: Some(object),
            ..
        } = self.scopes[method_scope].kind
        {
            let lock = self.state.locks().len();
            self.in_sync_handler = true;
            let exit = self.append(ValueKind::Void, Instruction::MonitorExit { object, lock });
            self.in_sync_handler = false;
            exit?;
            self.state
                .unlock()
                .map_err(|_| Bailout::MonitorStackUnderflow(self.bci))?;
        }

        if method_scope == 0 {
            return self.end_block(Terminator::Return { value });
        }

        let stack_base = self.scopes[method_scope].stack_base;
        let mut state = self.state.pop_scope()?;
        state.truncate_stack(stack_base);
        if let (Some(value), Some(kind)) = (value, kind) {
            state.push(value, kind)?;
        }
        let scope = &mut self.scopes[method_scope];
        if scope.return_count == 1 && top == method_scope && scope.start_block == Some(self.block)
        {
            scope.direct_return = Some(DirectReturn {
                state,
                value_map: mem::take(&mut self.value_map),
                memory_map: mem::take(&mut self.memory_map),
            });
            return Ok(Flow::Stop);
        }
        let continuation = match scope.continuation {
            Some(it) => it,
            None => {
                let resume_bci = scope.resume_bci.unwrap_or(self.bci);
                let block = self.graph.new_block(resume_bci);
                self.scopes[method_scope].continuation = Some(block);
                block
            }
        };
        self.join(method_scope - 1, continuation, &state)?;
        self.set_end(
            Terminator::Goto {
                successor: continuation,
                safepoint: false,
            },
            state,
        );
        Ok(Flow::Stop)
    }

    /// Registers the object constructed by `java/lang/Object.<init>` for finalization unless
    /// it provably needs none.
    fn register_finalizer(&mut self) -> Result<(), BuildError> {
        let runtime = self.runtime;
        let receiver = self.state.load_local(0, ValueKind::Object)?;
        let mut exact_type = self.exact_type_of(receiver);
        let mut declared_type = None;
        if exact_type.is_none() {
            if let Instruction::Local { receiver: true, .. } = self.graph.value(receiver).instruction
            {
                let holder = &self.scopes[0].method.method.owner;
                match runtime.resolve_type(holder) {
                    Some(info) if info.is_final() => exact_type = Some(info.class.clone()),
                    Some(info)
                        if self.options.speculate_leaf_types
                            && !info.has_subclass
                            && !info.is_interface() =>
                    {
                        exact_type = Some(info.class.clone());
                        self.assume(Assumption::LeafType(info.class.clone()));
                    }
                    Some(info) => declared_type = Some(info),
                    None => {}
                }
            }
        }
        let needs_check = if let Some(class) = exact_type {
            runtime
                .resolve_type(&class)
                .is_none_or(|it| it.has_finalizer)
        } else if let Some(declared) = declared_type.filter(|_| self.options.speculate_leaf_types)
        {
            if declared.has_finalizer || declared.has_finalizable_subclass {
                true
            } else {
                self.assume(Assumption::NoFinalizableSubclass(declared.class.clone()));
                false
            }
        } else {
            true
        };
        if needs_check {
            self.append(
                ValueKind::Void,
                Instruction::Intrinsic {
                    intrinsic: Intrinsic::RegisterFinalizer,
                    arguments: vec![receiver],
                    preserves_state: true,
                    can_trap: true,
                },
            )?;
        }
        Ok(())
    }
}

fn count_returns(code: &MethodCode) -> Result<usize, BuildError> {
    BytecodeStream::new(&code.bytecode).try_fold(0, |count, decoded| {
        let is_return = matches!(
            decoded?.instruction,
            RawInstruction::IReturn
                | RawInstruction::LReturn
                | RawInstruction::FReturn
                | RawInstruction::DReturn
                | RawInstruction::AReturn
                | RawInstruction::Return
        );
        Ok(count + usize::from(is_return))
    })
}
