use std::rc::Rc;

use super::{Bailout, BuildError, Flow, Translator, scope::ScopeKind};
use crate::{
    block_map::handlers_covering,
    bytecode::ProgramCounter,
    ir::{BlockFlags, BlockId, FrameState, Instruction, Terminator, ValueId, ValueKind},
};

impl Translator<'_> {
    /// Connects the current block to every handler that catches an exception thrown by the
    /// instruction being translated.
    pub(super) fn handle_exception(&mut self) -> Result<(), BuildError> {
        let state = self
            .state_before
            .as_deref()
            .cloned()
            .unwrap_or_else(|| self.state.clone());
        if self.in_sync_handler {
            // The monitor of the method is released, so only the callers may catch.
            let method_scope = self.method_scope(self.top());
            if method_scope == 0 {
                return Ok(());
            }
            let Some(call_site) = self.scopes[method_scope].call_site else {
                return Ok(());
            };
            let caller_state = state.pop_scope()?;
            return self.dispatch_exception(method_scope - 1, call_site, caller_state);
        }
        let top = self.top();
        self.dispatch_exception(top, self.bci, state)
    }

    /// Searches the handlers from `scope` outwards, starting at `bci`.
    fn dispatch_exception(
        &mut self,
        scope: usize,
        bci: ProgramCounter,
        state: FrameState,
    ) -> Result<(), BuildError> {
        let mut scope = scope;
        let mut bci = bci;
        let mut state = state;
        loop {
            let method_scope = self.method_scope(scope);
            let entry_state = state.with_stack_size(self.scopes[method_scope].stack_base);
            let code = Rc::clone(&self.scopes[scope].code);
            for handler in handlers_covering(&code.exception_table, bci) {
                let entry = self.block_at(scope, handler.handler_pc)?;
                self.add_handler(scope, entry, &entry_state)?;
                if handler.is_catch_all() {
                    return Ok(());
                }
            }
            if let Some(handler) = self.sync_handler(method_scope) {
                self.add_handler(method_scope, handler, &entry_state)?;
                return Ok(());
            }
            if method_scope == 0 {
                return Ok(());
            }
            let Some(call_site) = self.scopes[method_scope].call_site else {
                return Ok(());
            };
            bci = call_site;
            state = state.pop_scope()?;
            scope = method_scope - 1;
        }
    }

    /// The handler releasing the monitor of a `synchronized` method, if the method of
    /// `method_scope` is one.
    fn sync_handler(&mut self, method_scope: usize) -> Option<BlockId> {
        let bci = self.bci;
        let ScopeKind::Method {
            sync_object: Some(_),
            sync_handler,
        } = &self.scopes[method_scope].kind
        else {
            return None;
        };
        if let Some(handler) = sync_handler {
            return Some(*handler);
        }
        let handler = self.graph.new_block(bci);
        self.graph.block_mut(handler).flags |=
            BlockFlags::EXCEPTION_ENTRY | BlockFlags::DEFAULT_EXCEPTION_HANDLER;
        if let ScopeKind::Method { sync_handler, .. } = &mut self.scopes[method_scope].kind {
            *sync_handler = Some(handler);
        }
        Some(handler)
    }

    fn add_handler(
        &mut self,
        scope: usize,
        handler: BlockId,
        entry_state: &FrameState,
    ) -> Result<(), BuildError> {
        if handler == self.block {
            Err(Bailout::HandlerCoversItself(self.bci))?;
        }
        self.graph.add_exception_edge(self.block, handler);
        self.join(scope, handler, entry_state)?;
        self.schedule(scope, handler);
        Ok(())
    }

    /// Translates the handler of a `synchronized` method, which releases the monitor and
    /// throws the caught exception on.
    pub(super) fn parse_sync_handler(&mut self) -> Result<(), BuildError> {
        self.in_sync_handler = true;
        let result = self.release_and_rethrow();
        self.in_sync_handler = false;
        result
    }

    fn release_and_rethrow(&mut self) -> Result<(), BuildError> {
        let exception = self.append(ValueKind::Object, Instruction::ExceptionObject)?;
        let (object, lock) = self
            .state
            .unlock()
            .map_err(|_| Bailout::MonitorStackUnderflow(self.bci))?;
        self.state_before = None;
        self.append(ValueKind::Void, Instruction::MonitorExit { object, lock })?;
        self.throw(exception)?;
        Ok(())
    }

    /// Ends the current block by throwing `exception`.
    pub(super) fn throw(&mut self, exception: ValueId) -> Result<Flow, BuildError> {
        self.handle_exception()?;
        self.end_block(Terminator::Throw { exception })
    }
}
