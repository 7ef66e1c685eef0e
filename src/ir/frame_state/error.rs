use crate::ir::PhiSlot;

/// An error raised by an operation on a [`FrameState`](super::FrameState).
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum FrameStateError {
    /// Popping an empty operand stack.
    #[error("Trying to pop an empty stack")]
    StackUnderflow,
    /// Pushing onto a full operand stack.
    #[error("The stack size exceeds the max stack size")]
    StackOverflow,
    /// Accessing a local variable beyond `max_locals`.
    #[error("The local variable index exceeds the max local variable size")]
    LocalLimitExceed,
    /// Reading a local variable holding no value.
    #[error("The local variable is not initialized")]
    LocalUninitialized,
    /// Merging states with different stack depths.
    #[error("The stack size mismatch")]
    StackSizeMismatch,
    /// Merging states of methods with different numbers of locals.
    #[error("The local limit mismatch")]
    LocalLimitMismatch,
    /// Merging states holding different monitors.
    #[error("The lock stacks mismatch")]
    LockMismatch,
    /// A value has a different kind or width than expected.
    #[error("Value type in the stack or local variable table mismatch")]
    ValueMismatch,
    /// Releasing a monitor that is not held.
    #[error("Trying to unlock an empty lock stack")]
    LockUnderflow,
    /// Leaving the scope of the root method.
    #[error("The frame state has no caller")]
    NoCaller,
    /// Merging into a translated block that is not a loop header.
    #[error("The block has been translated and is not a loop header")]
    TranslatedBlock,
    /// A back edge brings a value into a loop header slot that has no phi.
    #[error("The {0} of the loop header is not a phi")]
    NotAPhi(PhiSlot),
}
