use proptest::prelude::*;

use super::RecordingPhis;
use crate::ir::{Entry, FrameState, FrameStateError, PhiSlot, ValueId, ValueKind};

const INT: ValueKind = ValueKind::Int;

fn state(locals: &[(u16, u32, ValueKind)], stack: &[(u32, ValueKind)]) -> FrameState {
    let mut state = FrameState::new(4, 4);
    for (index, value, kind) in locals {
        state
            .store_local(*index, ValueId(*value), *kind)
            .expect("Fail to store");
    }
    for (value, kind) in stack {
        state.push(ValueId(*value), *kind).expect("Fail to push");
    }
    state
}

proptest! {
    #[test]
    fn push_pop(markers in prop::collection::vec(any::<u32>(), 0..4)) {
        let mut frame = FrameState::new(0, 4);
        for marker in &markers {
            frame.push(ValueId(*marker), INT).expect("Fail to push");
        }
        for marker in markers.iter().rev() {
            prop_assert_eq!(frame.pop_kind(INT), Ok(ValueId(*marker)));
        }
    }

    #[test]
    fn overflow(push_count in 5u32..10) {
        let mut frame = FrameState::new(0, 4);
        for i in 0..push_count {
            let result = frame.push(ValueId(i), INT);
            if i < 4 {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result, Err(FrameStateError::StackOverflow));
            }
        }
    }

    #[test]
    fn merging_itself_changes_nothing(value in 0u32..50, local in 0u16..4) {
        let mut existing = state(&[(local, value, INT)], &[(value, INT)]);
        let incoming = existing.clone();
        let mut phis = RecordingPhis::default();
        existing.merge(&incoming, &mut phis).expect("Fail to merge");
        prop_assert!(phis.phis.is_empty());
        prop_assert_eq!(existing, incoming);
    }
}

#[test]
fn pop_checks_kind() {
    let mut frame = state(&[], &[(1, ValueKind::Float)]);
    assert_eq!(frame.pop_kind(INT), Err(FrameStateError::ValueMismatch));
}

#[test]
fn locals_of_two_slots() {
    let mut frame = state(&[(1, 5, ValueKind::Long)], &[]);
    assert_eq!(frame.load_local(1, ValueKind::Long), Ok(ValueId(5)));
    assert_eq!(frame.local(2), Ok(Entry::Top));
    assert_eq!(frame.load_local(2, INT), Err(FrameStateError::ValueMismatch));
    assert_eq!(
        frame.store_local(3, ValueId(6), ValueKind::Double),
        Err(FrameStateError::LocalLimitExceed)
    );

    frame.store_local(2, ValueId(7), INT).expect("Fail to store");
    assert_eq!(frame.local(1), Ok(Entry::Empty));
    assert_eq!(frame.load_local(2, INT), Ok(ValueId(7)));
}

#[test]
fn overwriting_the_lower_half_clears_the_upper_half() {
    let mut frame = state(&[(0, 5, ValueKind::Double)], &[]);
    frame.store_local(0, ValueId(6), INT).expect("Fail to store");
    assert_eq!(frame.local(1), Ok(Entry::Empty));
    assert_eq!(
        frame.load_local(1, INT),
        Err(FrameStateError::LocalUninitialized)
    );
}

#[test]
fn merge_creates_phis() {
    let mut existing = state(&[(0, 1, INT), (1, 2, INT)], &[(3, INT)]);
    let incoming = state(&[(0, 1, INT), (1, 4, INT)], &[(5, INT)]);
    let mut phis = RecordingPhis::default();
    existing.merge(&incoming, &mut phis).expect("Fail to merge");

    assert_eq!(existing.load_local(0, INT), Ok(ValueId(1)));
    let local_phi = existing.load_local(1, INT).expect("Fail to load");
    assert_eq!(phis.operands(local_phi), &[ValueId(2), ValueId(4)]);
    let stack_phi = existing.peek(0).expect("Fail to peek").value().unwrap();
    assert_eq!(phis.operands(stack_phi), &[ValueId(3), ValueId(5)]);

    let third = state(&[(0, 1, INT), (1, 6, INT)], &[(5, INT)]);
    existing.merge(&third, &mut phis).expect("Fail to merge");
    assert_eq!(phis.phis.len(), 2);
    assert_eq!(phis.operands(local_phi), &[ValueId(2), ValueId(4), ValueId(6)]);
    assert_eq!(phis.operands(stack_phi), &[ValueId(3), ValueId(5)]);
}

#[test]
fn divergent_locals_are_cleared() {
    let mut existing = state(&[(0, 1, INT), (1, 2, ValueKind::Long)], &[]);
    let incoming = state(&[(0, 3, ValueKind::Float)], &[]);
    let mut phis = RecordingPhis::default();
    existing.merge(&incoming, &mut phis).expect("Fail to merge");
    assert!(phis.phis.is_empty());
    assert_eq!(
        existing.load_local(0, INT),
        Err(FrameStateError::LocalUninitialized)
    );
    assert_eq!(existing.local(1), Ok(Entry::Empty));
    assert_eq!(existing.local(2), Ok(Entry::Empty));
}

#[test]
fn divergent_stacks_fail() {
    let mut existing = state(&[], &[(1, INT)]);
    let mut phis = RecordingPhis::default();
    assert_eq!(
        existing.merge(&state(&[], &[(2, ValueKind::Float)]), &mut phis),
        Err(FrameStateError::ValueMismatch)
    );
    assert_eq!(
        existing.merge(&state(&[], &[]), &mut phis),
        Err(FrameStateError::StackSizeMismatch)
    );
    let mut locked = state(&[], &[(1, INT)]);
    locked.lock(ValueId(9));
    assert_eq!(
        existing.merge(&locked, &mut phis),
        Err(FrameStateError::LockMismatch)
    );
}

#[test]
fn loop_phis_only_for_stored_locals() {
    let mut header = state(&[(0, 1, INT), (1, 2, INT)], &[(3, INT)]);
    let mut phis = RecordingPhis::default();
    header.insert_loop_phis(|idx| idx == 1, &mut phis);
    assert_eq!(header.load_local(0, INT), Ok(ValueId(1)));
    let counter = header.load_local(1, INT).expect("Fail to load");
    assert_eq!(phis.operands(counter), &[ValueId(2)]);
    assert_eq!(phis.phis.len(), 2);

    let back_edge = state(&[(0, 1, INT), (1, 7, INT)], &[(3, INT)]);
    header
        .merge_back_edge(&back_edge, &mut phis)
        .expect("Fail to merge");
    assert_eq!(phis.operands(counter), &[ValueId(2), ValueId(7)]);

    let clobbering = state(&[(0, 8, INT), (1, 7, INT)], &[(3, INT)]);
    assert_eq!(
        header.merge_back_edge(&clobbering, &mut phis),
        Err(FrameStateError::NotAPhi(PhiSlot::Local(0)))
    );
}

#[test]
fn locks() {
    let mut frame = FrameState::new(0, 0);
    assert_eq!(frame.lock(ValueId(1)), 1);
    assert_eq!(frame.lock(ValueId(2)), 2);
    assert_eq!(frame.unlock(), Ok((ValueId(2), 2)));
    assert_eq!(frame.unlock(), Ok((ValueId(1), 1)));
    assert_eq!(frame.unlock(), Err(FrameStateError::LockUnderflow));
}

#[test]
fn scopes() {
    let mut caller = state(&[(0, 1, INT)], &[(2, INT), (3, ValueKind::Object), (4, INT)]);
    let arguments = caller
        .pop_arguments(&"(I)V".parse().unwrap(), true)
        .expect("Fail to pop arguments");
    assert_eq!(arguments, vec![ValueId(3), ValueId(4)]);

    let mut callee = caller.push_scope(2, 2);
    assert_eq!(callee.scope_depth(), 1);
    assert_eq!(callee.stack_size(), 1);
    assert_eq!(callee.max_stack(), 6);
    assert_eq!(
        callee.load_local(0, INT),
        Err(FrameStateError::LocalUninitialized)
    );
    callee.store_local(0, ValueId(3), ValueKind::Object).expect("Fail to store");
    callee.push(ValueId(5), INT).expect("Fail to push");

    let returned = callee.pop_scope().expect("Fail to pop scope");
    assert_eq!(returned.scope_depth(), 0);
    assert_eq!(returned.load_local(0, INT), Ok(ValueId(1)));
    assert_eq!(returned.stack_size(), 2);
    assert_eq!(returned.pop_scope(), Err(FrameStateError::NoCaller));
}
