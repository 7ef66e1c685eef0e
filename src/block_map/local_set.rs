use std::fmt::Display;

use itertools::Itertools;

/// A set of local variable slots.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct LocalSet {
    words: Vec<u64>,
    len: usize,
}

impl LocalSet {
    /// Creates an empty set over `len` slots.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Creates a set containing all of `len` slots.
    #[must_use]
    pub fn full(len: usize) -> Self {
        let mut set = Self::new(len);
        (0..len).for_each(|it| set.insert(it));
        set
    }

    /// Adds a slot. Slots beyond the capacity are ignored.
    pub fn insert(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] |= 1u64 << (index % 64);
        }
    }

    /// Checks whether `index` is in the set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Checks whether no slot is in the set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|it| *it == 0)
    }

    /// The slots in the set in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|it| self.contains(*it))
    }
}

impl Display for LocalSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.iter().join(", "))
    }
}
