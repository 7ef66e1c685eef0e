use std::collections::HashSet;

use super::{
    Assumption, Assumptions, Block, BlockEnd, BlockFlags, BlockId, FrameState, FrameStateError,
    Instruction, PhiSlot, Value, ValueId, ValueKind, frame_state::PhiFactory,
};
use crate::{bytecode::ProgramCounter, types::MethodRef};

/// The block graph built from the bytecode of a method.
///
/// Blocks and values live in arenas and refer to each other by [`BlockId`] and [`ValueId`].
#[derive(Debug, Clone, PartialEq)]
pub struct IrGraph {
    method: MethodRef,
    values: Vec<Value>,
    blocks: Vec<Block>,
    start: Option<BlockId>,
    standard_entry: Option<BlockId>,
    osr_entry: Option<BlockId>,
    assumptions: Assumptions,
    inlined_methods: Vec<MethodRef>,
}

impl IrGraph {
    pub(crate) fn new(method: MethodRef) -> Self {
        Self {
            method,
            values: Vec::new(),
            blocks: Vec::new(),
            start: None,
            standard_entry: None,
            osr_entry: None,
            assumptions: Assumptions::default(),
            inlined_methods: Vec::new(),
        }
    }

    /// The compiled method.
    #[must_use]
    pub const fn method(&self) -> &MethodRef {
        &self.method
    }

    /// All value nodes, indexed by [`ValueId::index`].
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Gets a value node.
    /// # Panics
    /// If the value does not belong to this graph.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    /// All blocks including those never reached, indexed by [`BlockId::index`].
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Gets a block.
    /// # Panics
    /// If the block does not belong to this graph.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// The synthetic block every execution starts at.
    #[must_use]
    pub fn start(&self) -> BlockId {
        self.start.unwrap_or(BlockId(0))
    }

    /// The entry of normal invocations.
    #[must_use]
    pub const fn standard_entry(&self) -> Option<BlockId> {
        self.standard_entry
    }

    /// The entry of on-stack replacement, if it was requested.
    #[must_use]
    pub const fn osr_entry(&self) -> Option<BlockId> {
        self.osr_entry
    }

    /// The speculations the graph relies on.
    #[must_use]
    pub const fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    /// The methods inlined into the graph, in the order they were inlined.
    #[must_use]
    pub fn inlined_methods(&self) -> &[MethodRef] {
        &self.inlined_methods
    }

    /// The operands of a phi, empty if `phi` is not a phi.
    #[must_use]
    pub fn phi_operands(&self, phi: ValueId) -> &[ValueId] {
        match &self.value(phi).instruction {
            Instruction::Phi { operands, .. } => operands,
            _ => &[],
        }
    }

    /// The blocks reachable from the start block through control and exception edges,
    /// in depth-first pre-order.
    #[must_use]
    pub fn reachable_blocks(&self) -> Vec<BlockId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![self.start()];
        while let Some(block) = stack.pop() {
            if !visited.insert(block) {
                continue;
            }
            order.push(block);
            let block = self.block(block);
            let successors = block.successors();
            stack.extend(
                block
                    .exception_handlers
                    .iter()
                    .rev()
                    .chain(successors.iter().rev())
                    .filter(|it| !visited.contains(*it)),
            );
        }
        order
    }

    /// The appended nodes of the reachable blocks.
    pub fn instructions(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.reachable_blocks().into_iter().flat_map(move |block| {
            self.block(block)
                .instructions
                .iter()
                .map(move |it| (*it, self.value(*it)))
        })
    }

    pub(crate) fn value_count(&self) -> usize {
        self.values.len()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn new_block(&mut self, bci: ProgramCounter) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(id, bci));
        id
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    /// Adds a value node without appending it to a block.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn add_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(value);
        id
    }

    /// Adds a value node at the end of `block`.
    pub(crate) fn append(&mut self, block: BlockId, mut value: Value) -> ValueId {
        value.block = Some(block);
        let id = self.add_value(value);
        self.block_mut(block).instructions.push(id);
        id
    }

    /// Ends `block` and registers it as a predecessor of its successors.
    pub(crate) fn set_end(&mut self, block: BlockId, end: BlockEnd) {
        for successor in end.terminator.successors() {
            self.block_mut(successor).add_predecessor(block);
        }
        self.block_mut(block).end = Some(end);
    }

    /// Registers `handler` as the target of exceptions thrown in `block`.
    pub(crate) fn add_exception_edge(&mut self, block: BlockId, handler: BlockId) {
        self.block_mut(block).add_exception_handler(handler);
        self.block_mut(handler).add_predecessor_once(block);
    }

    pub(crate) fn set_entries(
        &mut self,
        start: BlockId,
        standard_entry: BlockId,
        osr_entry: Option<BlockId>,
    ) {
        self.start = Some(start);
        self.standard_entry = Some(standard_entry);
        self.osr_entry = osr_entry;
    }

    pub(crate) fn record_assumption(&mut self, assumption: Assumption) -> bool {
        self.assumptions.record(assumption)
    }

    pub(crate) fn record_inlined(&mut self, method: MethodRef) {
        self.inlined_methods.push(method);
    }

    /// Merges the state control leaves a predecessor with into the entry state of `block`.
    ///
    /// The first state reaching a loop header gets phis for its stack and for every local
    /// satisfying `stored_in_loop`. A translated block only accepts back edges.
    /// # Errors
    /// See [`FrameStateError`].
    pub(crate) fn merge_into<F>(
        &mut self,
        block: BlockId,
        state: &FrameState,
        stored_in_loop: F,
    ) -> Result<(), FrameStateError>
    where
        F: Fn(usize) -> bool,
    {
        let target = self.block_mut(block);
        let flags = target.flags;
        let existing = target.state_before.take();
        let mut phis = BlockPhis {
            values: &mut self.values,
            block,
        };
        let (merged, result) = match existing {
            None => {
                let mut entry_state = state.clone();
                if flags.contains(BlockFlags::LOOP_HEADER) {
                    entry_state.insert_loop_phis(stored_in_loop, &mut phis);
                }
                (entry_state, Ok(()))
            }
            Some(mut existing) => {
                let result = if !flags.contains(BlockFlags::WAS_VISITED) {
                    existing.merge(state, &mut phis)
                } else if flags.contains(BlockFlags::LOOP_HEADER) {
                    existing.merge_back_edge(state, &mut phis)
                } else {
                    Err(FrameStateError::TranslatedBlock)
                };
                (existing, result)
            }
        };
        self.block_mut(block).state_before = Some(merged);
        result
    }
}

struct BlockPhis<'g> {
    values: &'g mut Vec<Value>,
    block: BlockId,
}

impl PhiFactory for BlockPhis<'_> {
    fn is_phi(&self, value: ValueId, slot: PhiSlot) -> bool {
        matches!(
            &self.values[value.index()].instruction,
            Instruction::Phi { block, slot: phi_slot, .. }
                if *block == self.block && *phi_slot == slot
        )
    }

    #[allow(clippy::cast_possible_truncation)]
    fn create_phi(&mut self, slot: PhiSlot, kind: ValueKind, operands: Vec<ValueId>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value {
            kind,
            instruction: Instruction::Phi {
                block: self.block,
                slot,
                operands,
            },
            bci: None,
            block: None,
            state_before: None,
        });
        id
    }

    fn add_phi_operand(&mut self, phi: ValueId, operand: ValueId) {
        if let Instruction::Phi { operands, .. } = &mut self.values[phi.index()].instruction {
            if !operands.contains(&operand) {
                operands.push(operand);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ir::{Constant, Entry, Terminator};

    fn constant(graph: &mut IrGraph, block: BlockId, value: i32) -> ValueId {
        graph.append(
            block,
            Value {
                kind: ValueKind::Int,
                instruction: Instruction::Constant(Constant::Int(value)),
                bci: None,
                block: None,
                state_before: None,
            },
        )
    }

    fn state_with_local(value: ValueId) -> FrameState {
        let mut state = FrameState::new(1, 1);
        state
            .store_local(0, value, ValueKind::Int)
            .expect("Fail to store");
        state
    }

    #[test]
    fn merging_creates_phis_once() {
        let mut graph = IrGraph::new(crate::tests::method_ref("A", "m", "()V"));
        let entry = graph.new_block(ProgramCounter::ZERO);
        let join = graph.new_block(ProgramCounter::from(4));
        let zero = constant(&mut graph, entry, 0);
        let one = constant(&mut graph, entry, 1);

        graph
            .merge_into(join, &state_with_local(zero), |_| true)
            .expect("Fail to merge");
        graph
            .merge_into(join, &state_with_local(one), |_| true)
            .expect("Fail to merge");
        let entry_state = graph.block(join).state_before.clone().unwrap();
        let Entry::Value(phi, _) = entry_state.locals()[0] else {
            panic!("The local should hold a phi");
        };
        assert_eq!(graph.phi_operands(phi), &[zero, one]);

        let value_count = graph.value_count();
        graph
            .merge_into(join, &state_with_local(one), |_| true)
            .expect("Fail to merge");
        assert_eq!(graph.value_count(), value_count);
        assert_eq!(graph.block(join).state_before.as_ref(), Some(&entry_state));
    }

    #[test]
    fn translated_blocks_only_accept_back_edges() {
        let mut graph = IrGraph::new(crate::tests::method_ref("A", "m", "()V"));
        let entry = graph.new_block(ProgramCounter::ZERO);
        let zero = constant(&mut graph, entry, 0);
        graph
            .merge_into(entry, &state_with_local(zero), |_| false)
            .expect("Fail to merge");
        graph.block_mut(entry).flags |= BlockFlags::WAS_VISITED;
        assert_eq!(
            graph.merge_into(entry, &state_with_local(zero), |_| false),
            Err(FrameStateError::TranslatedBlock)
        );
    }

    #[test]
    fn ends_register_predecessors() {
        let mut graph = IrGraph::new(crate::tests::method_ref("A", "m", "()V"));
        let entry = graph.new_block(ProgramCounter::ZERO);
        let next = graph.new_block(ProgramCounter::from(1));
        graph.set_end(
            entry,
            BlockEnd {
                terminator: Terminator::Goto {
                    successor: next,
                    safepoint: false,
                },
                bci: None,
                state_after: Arc::new(FrameState::new(0, 0)),
            },
        );
        graph.set_entries(entry, entry, None);
        assert_eq!(graph.block(next).predecessors, vec![entry]);
        assert_eq!(graph.reachable_blocks(), vec![entry, next]);
    }
}
