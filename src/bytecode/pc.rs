use std::fmt::Display;

/// The index of an instruction in the bytecode of a method, i.e., its byte offset.
#[derive(Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[repr(transparent)]
pub struct ProgramCounter(u16);

impl ProgramCounter {
    /// The entry point of every method.
    pub const ZERO: Self = Self(0);

    /// Checks if this is the entry point of a method.
    #[must_use]
    pub const fn is_entry_point(self) -> bool {
        self.0 == 0
    }

    /// The offset as an index into the bytecode buffer.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Computes the target of a branch with a 32-bit offset relative to this program counter.
    /// # Errors
    /// - [`InvalidOffset::I32`] if the target does not fit into a [`ProgramCounter`].
    pub fn offset(self, offset: i32) -> Result<Self, InvalidOffset> {
        i32::from(self.0)
            .checked_add(offset)
            .and_then(|it| u16::try_from(it).ok())
            .map(Self)
            .ok_or(InvalidOffset::I32(offset))
    }

    /// Computes the target of a branch with a 16-bit offset relative to this program counter.
    /// # Errors
    /// - [`InvalidOffset::I16`] if the target does not fit into a [`ProgramCounter`].
    pub fn offset_i16(self, offset: i16) -> Result<Self, InvalidOffset> {
        u16::try_from(i32::from(self.0) + i32::from(offset))
            .map(Self)
            .map_err(|_| InvalidOffset::I16(offset))
    }

    /// Moves forward past an instruction of `len` bytes.
    /// # Errors
    /// - [`InvalidOffset::Length`] if the result exceeds the maximum code length.
    pub fn advance(self, len: u16) -> Result<Self, InvalidOffset> {
        self.0
            .checked_add(len)
            .map(Self)
            .ok_or(InvalidOffset::Length(len))
    }
}

impl Display for ProgramCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u16> for ProgramCounter {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<ProgramCounter> for u16 {
    fn from(val: ProgramCounter) -> Self {
        val.0
    }
}

impl TryFrom<usize> for ProgramCounter {
    type Error = InvalidOffset;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .map(Self)
            .map_err(|_| InvalidOffset::Position(value))
    }
}

/// An error occurring when a program counter would leave the addressable code range.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum InvalidOffset {
    /// A branch with an [`i16`] offset.
    #[error("Invalid i16 offset {0}")]
    I16(i16),
    /// A branch with an [`i32`] offset.
    #[error("Invalid i32 offset {0}")]
    I32(i32),
    /// Advancing past an instruction.
    #[error("Advancing by {0} bytes overflows the code range")]
    Length(u16),
    /// An absolute position.
    #[error("Position {0} is beyond the maximum code length")]
    Position(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_targets() {
        let pc = ProgramCounter::from(10);
        assert_eq!(pc.offset(5), Ok(ProgramCounter::from(15)));
        assert_eq!(pc.offset_i16(-10), Ok(ProgramCounter::ZERO));
        assert_eq!(pc.offset_i16(-11), Err(InvalidOffset::I16(-11)));
        assert_eq!(pc.offset(i32::MAX), Err(InvalidOffset::I32(i32::MAX)));
    }

    #[test]
    fn advance_overflow() {
        let pc = ProgramCounter::from(u16::MAX - 1);
        assert_eq!(pc.advance(1), Ok(ProgramCounter::from(u16::MAX)));
        assert!(pc.advance(2).is_err());
    }

    #[test]
    fn from_position() {
        assert_eq!(ProgramCounter::try_from(7usize), Ok(ProgramCounter::from(7)));
        assert!(ProgramCounter::try_from(70_000usize).is_err());
    }

    #[test]
    fn display() {
        assert!(ProgramCounter::ZERO.is_entry_point());
        assert_eq!(ProgramCounter::from(42).to_string(), "@42");
    }
}
