use super::{FrameState, FrameStateError};

/// The stack manipulation instructions of the JVM.
///
/// They move raw slots, so a `long` or `double` counts as two operands as in the JVM specification.
pub(crate) trait StackOperations {
    fn pop(&mut self) -> Result<(), FrameStateError>;
    fn pop2(&mut self) -> Result<(), FrameStateError>;
    fn dup(&mut self) -> Result<(), FrameStateError>;
    fn dup_x1(&mut self) -> Result<(), FrameStateError>;
    fn dup_x2(&mut self) -> Result<(), FrameStateError>;
    fn dup2(&mut self) -> Result<(), FrameStateError>;
    fn dup2_x1(&mut self) -> Result<(), FrameStateError>;
    fn dup2_x2(&mut self) -> Result<(), FrameStateError>;
    fn swap(&mut self) -> Result<(), FrameStateError>;
}

impl StackOperations for FrameState {
    fn pop(&mut self) -> Result<(), FrameStateError> {
        let _top = self.pop_raw()?;
        Ok(())
    }

    fn pop2(&mut self) -> Result<(), FrameStateError> {
        let _top = self.pop_raw()?;
        let _second = self.pop_raw()?;
        Ok(())
    }

    fn dup(&mut self) -> Result<(), FrameStateError> {
        let top = self.pop_raw()?;
        self.push_raw(top)?;
        self.push_raw(top)
    }

    fn dup_x1(&mut self) -> Result<(), FrameStateError> {
        let top = self.pop_raw()?;
        let second = self.pop_raw()?;
        self.push_raw(top)?;
        self.push_raw(second)?;
        self.push_raw(top)
    }

    fn dup_x2(&mut self) -> Result<(), FrameStateError> {
        let top = self.pop_raw()?;
        let second = self.pop_raw()?;
        let third = self.pop_raw()?;
        self.push_raw(top)?;
        self.push_raw(third)?;
        self.push_raw(second)?;
        self.push_raw(top)
    }

    fn dup2(&mut self) -> Result<(), FrameStateError> {
        let top = self.pop_raw()?;
        let second = self.pop_raw()?;
        self.push_raw(second)?;
        self.push_raw(top)?;
        self.push_raw(second)?;
        self.push_raw(top)
    }

    fn dup2_x1(&mut self) -> Result<(), FrameStateError> {
        let top = self.pop_raw()?;
        let second = self.pop_raw()?;
        let third = self.pop_raw()?;
        self.push_raw(second)?;
        self.push_raw(top)?;
        self.push_raw(third)?;
        self.push_raw(second)?;
        self.push_raw(top)
    }

    fn dup2_x2(&mut self) -> Result<(), FrameStateError> {
        let top = self.pop_raw()?;
        let second = self.pop_raw()?;
        let third = self.pop_raw()?;
        let fourth = self.pop_raw()?;
        self.push_raw(second)?;
        self.push_raw(top)?;
        self.push_raw(fourth)?;
        self.push_raw(third)?;
        self.push_raw(second)?;
        self.push_raw(top)
    }

    fn swap(&mut self) -> Result<(), FrameStateError> {
        let top = self.pop_raw()?;
        let second = self.pop_raw()?;
        self.push_raw(top)?;
        self.push_raw(second)
    }
}
