//! Translation of the bytecode of a method into an [`IrGraph`].
//!
//! The builder abstractly interprets one basic block at a time, taking blocks from a work list
//! ordered by the depth-first numbers of the [`BlockMap`]. Values flowing into a block from
//! several predecessors are merged into phis of its entry [`FrameState`].
//!
//! Calls to small methods are inlined by translating the callee in a nested [`Scope`](scope),
//! and every `jsr` translates a private copy of the subroutine in the same way.
mod canonicalizer;
mod error;
mod exceptions;
mod intrinsics;
mod invoke;
mod memory_map;
mod scope;
mod subroutine;
mod translate;
mod value_map;

use std::{rc::Rc, sync::Arc};

pub use error::{Bailout, BuildError};

use self::{
    canonicalizer::Canonical,
    memory_map::MemoryMap,
    scope::{Scope, ScopeKind},
    value_map::ValueMap,
};
use crate::{
    block_map::{BlockMap, MalformedCode},
    bytecode::{ProgramCounter, decode_at},
    ir::{
        BlockEnd, BlockFlags, BlockId, Constant, FrameState, Instruction, IrGraph, Terminator,
        Value, ValueId, ValueKind,
    },
    options::CompilerOptions,
    runtime::{ConstantPool, MethodInfo, Runtime},
    types::{FieldRef, FieldType, MethodRef},
};

/// Whether translation goes on with the next instruction of the current block.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Flow {
    Continue,
    Stop,
}

/// Builds the [`IrGraph`] of methods.
///
/// # Examples
/// ```
/// use mokajit::{
///     GraphBuilder,
///     bytecode::{RawInstruction, assemble},
///     runtime::{InMemoryRuntime, MethodAccessFlags, MethodCode, MethodInfo},
///     types::{ClassRef, MethodRef},
/// };
///
/// let code = MethodCode {
///     max_stack: 2,
///     max_locals: 1,
///     bytecode: assemble(&[
///         RawInstruction::ILoad0,
///         RawInstruction::IConst1,
///         RawInstruction::IAdd,
///         RawInstruction::IReturn,
///     ])?,
///     exception_table: Vec::new(),
/// };
/// let method = MethodInfo::new(
///     MethodRef {
///         owner: ClassRef::new("Example"),
///         name: "inc".to_owned(),
///         descriptor: "(I)I".parse().unwrap(),
///     },
///     MethodAccessFlags::STATIC,
///     Some(code),
/// );
/// let runtime = InMemoryRuntime::new();
/// let graph = GraphBuilder::new(&runtime).build(&method)?;
/// assert_eq!(graph.reachable_blocks().len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder<'r> {
    runtime: &'r dyn Runtime,
    options: CompilerOptions,
    osr_bci: Option<ProgramCounter>,
}

impl<'r> GraphBuilder<'r> {
    /// Creates a builder consulting `runtime` with the default options.
    #[must_use]
    pub fn new(runtime: &'r dyn Runtime) -> Self {
        Self {
            runtime,
            options: CompilerOptions::default(),
            osr_bci: None,
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Requests an additional entry for on-stack replacement at the loop header at `bci`.
    #[instability::unstable(feature = "osr")]
    #[must_use]
    pub fn with_osr(mut self, bci: ProgramCounter) -> Self {
        self.osr_bci = Some(bci);
        self
    }

    /// The options.
    #[must_use]
    pub const fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Builds the graph of `method`.
    /// # Errors
    /// See [`BuildError`]. No partial graph is produced.
    pub fn build(&self, method: &MethodInfo) -> Result<IrGraph, BuildError> {
        let result = Translator::new(self.runtime, &self.options, self.osr_bci, method)
            .and_then(Translator::run);
        if let Err(error) = &result {
            log::debug!("Bailing out of {}: {error}", method.method);
        }
        result
    }
}

/// An extension trait for building the graph of a [`MethodInfo`].
pub trait MethodGraphExt {
    /// Builds the graph of the method.
    /// # Errors
    /// See [`BuildError`].
    fn build_graph(
        &self,
        runtime: &dyn Runtime,
        options: &CompilerOptions,
    ) -> Result<IrGraph, BuildError>;
}

impl MethodGraphExt for MethodInfo {
    fn build_graph(
        &self,
        runtime: &dyn Runtime,
        options: &CompilerOptions,
    ) -> Result<IrGraph, BuildError> {
        GraphBuilder::new(runtime)
            .with_options(options.clone())
            .build(self)
    }
}

/// The state of one graph build.
struct Translator<'b> {
    runtime: &'b dyn Runtime,
    options: &'b CompilerOptions,
    osr_bci: Option<ProgramCounter>,
    graph: IrGraph,
    scopes: Vec<Scope>,
    block: BlockId,
    state: FrameState,
    bci: ProgramCounter,
    /// The state before the current instruction, taken if the instruction may trap.
    state_before: Option<Arc<FrameState>>,
    value_map: ValueMap,
    memory_map: MemoryMap,
    instruction_count: usize,
    in_sync_handler: bool,
    osr_entry: Option<BlockId>,
}

impl<'b> Translator<'b> {
    fn new(
        runtime: &'b dyn Runtime,
        options: &'b CompilerOptions,
        osr_bci: Option<ProgramCounter>,
        method: &MethodInfo,
    ) -> Result<Self, BuildError> {
        let Some(code) = method.code.clone() else {
            return Err(Bailout::MissingMethodBody(method.method.clone()).into());
        };
        if options.intrinsify && intrinsics::lookup(&method.method).is_some() {
            Err(Bailout::IntrinsicRoot(method.method.clone()))?;
        }
        let block_map = BlockMap::build(&code, options.precise_loop_stores, osr_bci)?;
        let mut graph = IrGraph::new(method.method.clone());
        let start = graph.new_block(ProgramCounter::ZERO);
        let state = FrameState::new(code.max_locals, code.max_stack);
        let root = Scope::method(
            Rc::new(method.clone()),
            Rc::new(code),
            Rc::new(block_map),
            0,
            0,
        );
        Ok(Self {
            runtime,
            options,
            osr_bci,
            graph,
            scopes: vec![root],
            block: start,
            state,
            bci: ProgramCounter::ZERO,
            state_before: None,
            value_map: ValueMap::default(),
            memory_map: MemoryMap::default(),
            instruction_count: 0,
            in_sync_handler: false,
            osr_entry: None,
        })
    }

    fn run(mut self) -> Result<IrGraph, BuildError> {
        let start = self.block;
        self.bind_parameters()?;
        let entry_state = self.state.clone();
        let entry = self.block_at(0, ProgramCounter::ZERO)?;
        let standard_entry = if self.graph.block(entry).is(BlockFlags::LOOP_HEADER) {
            let header = self.graph.new_block(ProgramCounter::ZERO);
            let header_block = self.graph.block_mut(header);
            header_block.flags |= BlockFlags::STANDARD_ENTRY | BlockFlags::WAS_VISITED;
            header_block.state_before = Some(entry_state.clone());
            self.block = header;
            self.end_block(Terminator::Goto {
                successor: entry,
                safepoint: false,
            })?;
            header
        } else {
            self.graph.block_mut(entry).flags |= BlockFlags::STANDARD_ENTRY;
            self.join(0, entry, &entry_state)?;
            self.schedule(0, entry);
            entry
        };
        self.iterate_all_blocks()?;
        self.graph.set_end(
            start,
            BlockEnd {
                terminator: Terminator::Base {
                    standard_entry,
                    osr_entry: self.osr_entry,
                },
                bci: None,
                state_after: Arc::new(entry_state),
            },
        );
        self.graph
            .set_entries(start, standard_entry, self.osr_entry);
        log::trace!(
            "Built {} blocks and {} values for {}",
            self.graph.blocks().len(),
            self.graph.value_count(),
            self.graph.method()
        );
        Ok(self.graph)
    }

    /// Stores the parameters into the locals and acquires the monitor of a synchronized method.
    fn bind_parameters(&mut self) -> Result<(), BuildError> {
        let method = Rc::clone(&self.scopes[0].method);
        let mut index = 0;
        let receiver = if method.is_static() {
            None
        } else {
            let this = self.parameter(0, true, ValueKind::Object);
            self.state.store_local(0, this, ValueKind::Object)?;
            index = 1;
            Some(this)
        };
        for param_type in &method.method.descriptor.parameters_types {
            let kind = ValueKind::from(param_type);
            let param = self.parameter(index, false, kind);
            self.state.store_local(index, param, kind)?;
            index += if kind.is_double_word() { 2 } else { 1 };
        }
        if method.is_synchronized() {
            let object = match receiver {
                Some(it) => it,
                None => self.append_constant(Constant::Class(method.method.owner.clone()))?,
            };
            self.state.lock(object);
            if let ScopeKind::Method { sync_object, .. } = &mut self.scopes[0].kind {
                *sync_object = Some(object);
            }
        }
        Ok(())
    }

    fn parameter(&mut self, index: u16, receiver: bool, kind: ValueKind) -> ValueId {
        self.graph.add_value(Value {
            kind,
            instruction: Instruction::Local { index, receiver },
            bci: None,
            block: None,
            state_before: None,
        })
    }

    fn top(&self) -> usize {
        self.scopes.len() - 1
    }

    /// The scope of the method `scope` belongs to, skipping subroutine copies.
    fn method_scope(&self, scope: usize) -> usize {
        let mut index = scope;
        while index > 0 && self.scopes[index].is_subroutine() {
            index -= 1;
        }
        index
    }

    /// The block of `scope` starting at `pc`, created on first use.
    fn block_at(&mut self, scope: usize, pc: ProgramCounter) -> Result<BlockId, BuildError> {
        if let Some(&block) = self.scopes[scope].blocks.get(&pc) {
            return Ok(block);
        }
        let info = self.scopes[scope]
            .block_map
            .get(pc)
            .ok_or(MalformedCode::TargetInsideInstruction(pc))?;
        let flags = info.flags
            & (BlockFlags::EXCEPTION_ENTRY
                | BlockFlags::SUBROUTINE_ENTRY
                | BlockFlags::LOOP_HEADER
                | BlockFlags::OSR_ENTRY);
        let depth_first_number = info.depth_first_number;
        let block = self.graph.new_block(pc);
        let new_block = self.graph.block_mut(block);
        new_block.flags = flags;
        new_block.depth_first_number = depth_first_number;
        self.scopes[scope].blocks.insert(pc, block);
        Ok(block)
    }

    /// Puts `block` on the work list of `scope` unless it is already there or translated.
    fn schedule(&mut self, scope: usize, block: BlockId) {
        let target = self.graph.block_mut(block);
        if target.is(BlockFlags::WAS_VISITED) || target.is(BlockFlags::ON_WORK_LIST) {
            return;
        }
        target.flags |= BlockFlags::ON_WORK_LIST;
        let number = target.depth_first_number.unwrap_or(u32::MAX);
        self.scopes[scope].work_list.insert((number, block));
    }

    /// Merges `state` into the entry state of `block`, which belongs to `scope`.
    fn join(&mut self, scope: usize, block: BlockId, state: &FrameState) -> Result<(), BuildError> {
        let block_map = Rc::clone(&self.scopes[scope].block_map);
        self.graph
            .merge_into(block, state, |it| block_map.stores_in_loops().contains(it))
            .map_err(|source| Bailout::BlockJoinFailed { block, source })?;
        Ok(())
    }

    /// Ends the current block with `state` flowing out, without touching the successors.
    fn set_end(&mut self, terminator: Terminator, state: FrameState) {
        self.graph.set_end(
            self.block,
            BlockEnd {
                terminator,
                bci: Some(self.bci),
                state_after: Arc::new(state),
            },
        );
    }

    /// Ends the current block, merging the current state into every successor.
    fn end_block(&mut self, terminator: Terminator) -> Result<Flow, BuildError> {
        let top = self.top();
        let state = self.state.clone();
        for successor in terminator.successors() {
            self.join(top, successor, &state)?;
            self.schedule(top, successor);
        }
        self.set_end(terminator, state);
        Ok(Flow::Stop)
    }

    /// Translates the blocks on the work list of the innermost scope until it is empty.
    fn iterate_all_blocks(&mut self) -> Result<(), BuildError> {
        loop {
            let top = self.top();
            let Some((_, block)) = self.scopes[top].work_list.pop_first() else {
                return Ok(());
            };
            self.parse_block(block)?;
        }
    }

    fn parse_block(&mut self, block: BlockId) -> Result<(), BuildError> {
        let top = self.top();
        let (flags, bci) = {
            let block = self.graph.block(block);
            (block.flags, block.bci)
        };
        log::trace!(
            "Parsing {block} at {bci}, {} blocks pending",
            self.scopes[top].work_list.len()
        );
        if flags.contains(BlockFlags::OSR_ENTRY)
            && self.osr_bci == Some(bci)
            && self.osr_entry.is_none()
        {
            if self.scopes[top].is_subroutine() {
                Err(Bailout::OsrInJsr(bci))?;
            }
            if top == 0 {
                self.build_osr_entry(block)?;
            }
        }
        let target = self.graph.block_mut(block);
        target.flags.remove(BlockFlags::ON_WORK_LIST);
        target.flags.insert(BlockFlags::WAS_VISITED);
        let Some(state) = target.state_before.clone() else {
            return Ok(());
        };
        self.block = block;
        self.state = state;
        self.bci = bci;
        self.state_before = None;
        self.value_map.kill();
        self.memory_map.kill();
        if flags.contains(BlockFlags::DEFAULT_EXCEPTION_HANDLER) {
            return self.parse_sync_handler();
        }
        if flags.contains(BlockFlags::EXCEPTION_ENTRY) {
            let exception = self.append(ValueKind::Object, Instruction::ExceptionObject)?;
            self.state.push(exception, ValueKind::Object)?;
        }
        self.iterate_bytecodes(bci)
    }

    /// Translates instructions from `pc` on until the current block ends.
    fn iterate_bytecodes(&mut self, pc: ProgramCounter) -> Result<(), BuildError> {
        let top = self.top();
        let code = Rc::clone(&self.scopes[top].code);
        let block_map = Rc::clone(&self.scopes[top].block_map);
        let mut pc = pc;
        loop {
            let decoded = decode_at(&code.bytecode, pc)?;
            self.bci = pc;
            self.state_before = decoded
                .instruction
                .can_trap()
                .then(|| Arc::new(self.state.clone()));
            if self.translate(&decoded)? == Flow::Stop {
                return Ok(());
            }
            pc = decoded.next_pc;
            if pc.index() >= code.bytecode.len() {
                Err(MalformedCode::FallsOffEnd)?;
            }
            if block_map.is_block_start(pc) {
                let top = self.top();
                let successor = self.block_at(top, pc)?;
                self.end_block(Terminator::Goto {
                    successor,
                    safepoint: false,
                })?;
                return Ok(());
            }
        }
    }

    /// Creates the entry for on-stack replacement, which loads every live local of `target`
    /// from the interpreter frame.
    fn build_osr_entry(&mut self, target: BlockId) -> Result<(), BuildError> {
        let (bci, state) = {
            let block = self.graph.block(target);
            (block.bci, block.state_before.clone())
        };
        let Some(state) = state else {
            return Ok(());
        };
        if state.stack_size() != 0 {
            Err(Bailout::OsrWithNonEmptyStack(bci))?;
        }
        let osr = self.graph.new_block(bci);
        self.graph.block_mut(osr).flags |= BlockFlags::OSR_ENTRY | BlockFlags::WAS_VISITED;
        self.graph.block_mut(osr).state_before = Some(state.clone());
        self.block = osr;
        self.bci = bci;
        self.state = state;
        self.state_before = None;
        let buffer = self.append(ValueKind::Word, Instruction::OsrEntry)?;
        let live_locals: Vec<_> = self
            .state
            .locals()
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.kind().map(|kind| (index, kind)))
            .collect();
        for (index, kind) in live_locals {
            let index = u16::try_from(index).map_err(|_| MalformedCode::TargetOutOfRange(bci))?;
            let local = self.append(kind, Instruction::OsrLocal { buffer, index })?;
            self.state.store_local(index, local, kind)?;
        }
        self.end_block(Terminator::Goto {
            successor: target,
            safepoint: false,
        })?;
        log::debug!("Created OSR entry {osr} for {target} at {bci}");
        self.osr_entry = Some(osr);
        Ok(())
    }

    /// Appends a node to the current block after simplifying it.
    ///
    /// Returns an equivalent existing value instead if there is one.
    fn append(
        &mut self,
        kind: ValueKind,
        instruction: Instruction,
    ) -> Result<ValueId, BuildError> {
        let instruction = if self.options.canonicalize {
            match canonicalizer::canonicalize(&self.graph, &instruction) {
                Canonical::Keep => instruction,
                Canonical::Value(it) => return Ok(it),
                Canonical::Constant(it) => Instruction::Constant(it),
            }
        } else {
            instruction
        };
        if self.options.local_value_numbering {
            if let Some(existing) = self.value_map.find(kind, &instruction) {
                return Ok(existing);
            }
        }
        self.instruction_count += 1;
        if self.instruction_count > self.options.max_instruction_count {
            Err(Bailout::TooLarge)?;
        }
        let can_trap = instruction.can_trap(kind);
        let kills_memory = instruction.kills_memory();
        let state_before = (can_trap || kills_memory).then(|| {
            self.state_before
                .clone()
                .unwrap_or_else(|| Arc::new(self.state.clone()))
        });
        let value = self.graph.append(
            self.block,
            Value {
                kind,
                instruction,
                bci: Some(self.bci),
                block: None,
                state_before,
            },
        );
        if self.options.local_value_numbering {
            self.value_map
                .insert(kind, &self.graph.value(value).instruction, value);
        }
        if kills_memory {
            self.value_map.kill();
            self.memory_map.kill();
        }
        if can_trap {
            self.handle_exception()?;
        }
        Ok(value)
    }

    fn append_constant(&mut self, constant: Constant) -> Result<ValueId, BuildError> {
        self.append(constant.kind(), Instruction::Constant(constant))
    }

    fn push_constant(&mut self, constant: Constant) -> Result<(), BuildError> {
        let kind = constant.kind();
        let value = self.append_constant(constant)?;
        self.state.push(value, kind)?;
        Ok(())
    }

    fn constant_of(&self, value: ValueId) -> Option<&Constant> {
        match &self.graph.value(value).instruction {
            Instruction::Constant(it) => Some(it),
            _ => None,
        }
    }

    fn constant_pool(&self, index: u16) -> Result<&'b dyn ConstantPool, BuildError> {
        let owner = &self.scopes[self.top()].method.method.owner;
        self.runtime
            .constant_pool(owner)
            .ok_or_else(|| self.unresolvable(index))
    }

    fn unresolvable(&self, index: u16) -> BuildError {
        Bailout::UnresolvableConstant {
            pc: self.bci,
            index,
        }
        .into()
    }

    fn lookup_type(&self, index: u16) -> Result<FieldType, BuildError> {
        self.constant_pool(index)?
            .lookup_type(index)
            .ok_or_else(|| self.unresolvable(index))
    }

    fn lookup_field(&self, index: u16) -> Result<FieldRef, BuildError> {
        self.constant_pool(index)?
            .lookup_field(index)
            .ok_or_else(|| self.unresolvable(index))
    }

    fn lookup_method(&self, index: u16) -> Result<MethodRef, BuildError> {
        self.constant_pool(index)?
            .lookup_method(index)
            .ok_or_else(|| self.unresolvable(index))
    }
}

#[cfg(test)]
mod tests;
