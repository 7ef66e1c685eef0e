use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use super::{memory_map::MemoryMap, value_map::ValueMap};
use crate::{
    block_map::BlockMap,
    bytecode::ProgramCounter,
    ir::{BlockId, FrameState, ValueId},
    runtime::{MethodCode, MethodInfo},
};

/// What a [`Scope`] translates.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(super) enum ScopeKind {
    /// The body of the compiled method or of an inlined callee.
    Method {
        /// The object locked by a `synchronized` method.
        sync_object: Option<ValueId>,
        /// The handler releasing the monitor of a `synchronized` method, created on first use.
        sync_handler: Option<BlockId>,
    },
    /// A copy of a subroutine entered by a `jsr`.
    Subroutine {
        /// The first instruction of the subroutine.
        entry: ProgramCounter,
        /// The block of the enclosing scope that `ret` jumps to.
        continuation: BlockId,
        /// The local the return address is stored in, once known.
        return_address_local: Option<u16>,
    },
}

/// A state stashed by the only `return` of an inlined method, so the caller keeps translating
/// in the same block.
#[derive(Debug)]
pub(super) struct DirectReturn {
    pub state: FrameState,
    pub value_map: ValueMap,
    pub memory_map: MemoryMap,
}

/// A method body or a subroutine copy being translated.
///
/// Blocks of a scope are private to it, so every inlined call and every `jsr` translates its
/// own copy of the callee blocks.
#[derive(Debug)]
pub(super) struct Scope {
    pub kind: ScopeKind,
    pub method: Rc<MethodInfo>,
    pub code: Rc<MethodCode>,
    pub block_map: Rc<BlockMap>,
    pub blocks: BTreeMap<ProgramCounter, BlockId>,
    /// Pending blocks ordered by their depth-first number.
    pub work_list: BTreeSet<(u32, BlockId)>,
    /// The caller stack size at the call, i.e., the stack size at entry of a handler.
    pub stack_base: usize,
    /// The invoke of the caller, [`None`] for the compiled method.
    pub call_site: Option<ProgramCounter>,
    /// The caller instruction following the invoke.
    pub resume_bci: Option<ProgramCounter>,
    /// The number of nested inlined calls.
    pub inline_level: usize,
    /// The caller block the callee starts translating in.
    pub start_block: Option<BlockId>,
    /// The caller block receiving control from every `return`, created on first use.
    pub continuation: Option<BlockId>,
    pub return_count: usize,
    pub direct_return: Option<DirectReturn>,
}

impl Scope {
    /// Creates the scope of the compiled method or of an inlined callee.
    pub fn method(
        method: Rc<MethodInfo>,
        code: Rc<MethodCode>,
        block_map: Rc<BlockMap>,
        stack_base: usize,
        inline_level: usize,
    ) -> Self {
        Self {
            kind: ScopeKind::Method {
                sync_object: None,
                sync_handler: None,
            },
            method,
            code,
            block_map,
            blocks: BTreeMap::new(),
            work_list: BTreeSet::new(),
            stack_base,
            call_site: None,
            resume_bci: None,
            inline_level,
            start_block: None,
            continuation: None,
            return_count: 0,
            direct_return: None,
        }
    }

    /// Creates a scope translating a fresh copy of the subroutine at `entry`.
    pub fn subroutine(&self, entry: ProgramCounter, continuation: BlockId) -> Self {
        Self {
            kind: ScopeKind::Subroutine {
                entry,
                continuation,
                return_address_local: None,
            },
            method: Rc::clone(&self.method),
            code: Rc::clone(&self.code),
            block_map: Rc::clone(&self.block_map),
            blocks: BTreeMap::new(),
            work_list: BTreeSet::new(),
            stack_base: self.stack_base,
            call_site: self.call_site,
            resume_bci: self.resume_bci,
            inline_level: self.inline_level,
            start_block: None,
            continuation: None,
            return_count: 0,
            direct_return: None,
        }
    }

    pub const fn is_subroutine(&self) -> bool {
        matches!(self.kind, ScopeKind::Subroutine { .. })
    }

    /// Checks whether local `index` is stored inside a loop of the scope's method.
    pub fn stored_in_loop(&self, index: usize) -> bool {
        self.block_map.stores_in_loops().contains(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytecode::RawInstruction, tests::static_method};

    #[test]
    fn subroutines_share_the_method() {
        let method = static_method("()V", 0, 0, &[RawInstruction::Return]);
        let code = Rc::new(method.code.clone().unwrap());
        let block_map = Rc::new(BlockMap::build(&code, true, None).unwrap());
        let scope = Scope::method(Rc::new(method), code, block_map, 2, 1);
        let subroutine = scope.subroutine(ProgramCounter::from(7), BlockId(3));
        assert!(subroutine.is_subroutine());
        assert!(!scope.is_subroutine());
        assert!(Rc::ptr_eq(&scope.code, &subroutine.code));
        assert_eq!(subroutine.stack_base, 2);
        assert_eq!(subroutine.inline_level, 1);
        assert!(subroutine.blocks.is_empty());
    }
}
