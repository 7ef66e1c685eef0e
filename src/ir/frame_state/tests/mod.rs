mod frame_state_tests;

use crate::ir::{PhiSlot, ValueId, ValueKind};

use super::PhiFactory;

/// Records the phis created by merges, numbering them from 100.
#[derive(Debug, Default)]
pub(super) struct RecordingPhis {
    pub phis: Vec<(PhiSlot, ValueKind, Vec<ValueId>)>,
}

impl RecordingPhis {
    const FIRST_PHI: u32 = 100;

    pub fn operands(&self, phi: ValueId) -> &[ValueId] {
        &self.phis[(phi.0 - Self::FIRST_PHI) as usize].2
    }
}

impl PhiFactory for RecordingPhis {
    fn is_phi(&self, value: ValueId, slot: PhiSlot) -> bool {
        value
            .0
            .checked_sub(Self::FIRST_PHI)
            .and_then(|it| self.phis.get(it as usize))
            .is_some_and(|(phi_slot, _, _)| *phi_slot == slot)
    }

    fn create_phi(&mut self, slot: PhiSlot, kind: ValueKind, operands: Vec<ValueId>) -> ValueId {
        self.phis.push((slot, kind, operands));
        ValueId(Self::FIRST_PHI + self.phis.len() as u32 - 1)
    }

    fn add_phi_operand(&mut self, phi: ValueId, operand: ValueId) {
        let operands = &mut self.phis[(phi.0 - Self::FIRST_PHI) as usize].2;
        if !operands.contains(&operand) {
            operands.push(operand);
        }
    }
}
