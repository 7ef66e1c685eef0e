use super::{Bailout, BuildError, Flow, Translator, scope::ScopeKind};
use crate::{
    bytecode::ProgramCounter,
    ir::{Constant, Terminator, ValueKind},
};

impl Translator<'_> {
    /// Translates a private copy of the subroutine at `target`, which returns to `next`.
    pub(super) fn jsr(
        &mut self,
        target: ProgramCounter,
        next: ProgramCounter,
    ) -> Result<Flow, BuildError> {
        let top = self.top();
        let method_scope = self.method_scope(top);
        let recursive = self.scopes[method_scope..=top].iter().any(|scope| {
            matches!(scope.kind, ScopeKind::Subroutine { entry, .. } if entry == target)
        });
        if recursive {
            Err(Bailout::RecursiveJsr(self.bci))?;
        }
        self.push_constant(Constant::ReturnAddress(next))?;
        let continuation = self.block_at(top, next)?;
        let subroutine = self.scopes[top].subroutine(target, continuation);
        self.scopes.push(subroutine);
        let entry = self.block_at(top + 1, target)?;
        log::trace!("Entering subroutine at {target} from {}", self.bci);
        self.end_block(Terminator::Goto {
            successor: entry,
            safepoint: false,
        })?;
        self.iterate_all_blocks()?;
        self.scopes.pop();
        Ok(Flow::Stop)
    }

    /// Jumps back to the instruction after the `jsr` that entered the current subroutine.
    pub(super) fn ret(&mut self, index: u16) -> Result<Flow, BuildError> {
        let top = self.top();
        let ScopeKind::Subroutine {
            continuation,
            return_address_local,
            ..
        } = self.scopes[top].kind
        else {
            return Err(Bailout::RetOutsideSubroutine(self.bci).into());
        };
        if return_address_local != Some(index) {
            Err(Bailout::ReturnAddressConflict {
                pc: self.bci,
                local: index,
            })?;
        }
        self.state.load_local(index, ValueKind::ReturnAddress)?;
        let state = self.state.clone();
        self.join(top - 1, continuation, &state)?;
        self.schedule(top - 1, continuation);
        self.set_end(
            Terminator::Goto {
                successor: continuation,
                safepoint: false,
            },
            state,
        );
        Ok(Flow::Stop)
    }

    /// Tracks which local holds the return address of the current subroutine.
    ///
    /// Overwriting the return address of an enclosing subroutine is not supported.
    pub(super) fn check_local_store(
        &mut self,
        index: u16,
        kind: ValueKind,
    ) -> Result<(), BuildError> {
        let top = self.top();
        if !self.scopes[top].is_subroutine() {
            return Ok(());
        }
        if kind == ValueKind::ReturnAddress {
            let enclosing = self.scopes[..top]
                .iter()
                .rev()
                .take_while(|scope| scope.is_subroutine());
            for scope in enclosing {
                if let ScopeKind::Subroutine {
                    return_address_local: Some(local),
                    ..
                } = scope.kind
                {
                    if local == index {
                        Err(Bailout::ReturnAddressConflict {
                            pc: self.bci,
                            local: index,
                        })?;
                    }
                }
            }
            if let ScopeKind::Subroutine {
                return_address_local,
                ..
            } = &mut self.scopes[top].kind
            {
                *return_address_local = Some(index);
            }
        } else if let ScopeKind::Subroutine {
            return_address_local,
            ..
        } = &mut self.scopes[top].kind
        {
            if *return_address_local == Some(index) {
                *return_address_local = None;
            }
        }
        Ok(())
    }
}
