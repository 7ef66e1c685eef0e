use std::collections::BTreeSet;

use crate::types::{ClassRef, MethodRef};

/// A fact about the loaded classes that the built graph relies on.
///
/// Loading a class that breaks the fact invalidates code compiled from the graph.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, derive_more::Display)]
pub enum Assumption {
    /// The class has no subclass.
    #[display("leaf type {_0}")]
    LeafType(ClassRef),
    /// The method is not overridden.
    #[display("leaf method {_0}")]
    LeafMethod(MethodRef),
    /// No subclass of the class overrides `finalize`.
    #[display("no finalizable subclass of {_0}")]
    NoFinalizableSubclass(ClassRef),
}

/// The assumptions recorded while building a graph.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Assumptions {
    inner: BTreeSet<Assumption>,
}

impl Assumptions {
    /// Records an assumption. Returns `false` if it was already recorded.
    pub fn record(&mut self, assumption: Assumption) -> bool {
        if self.inner.contains(&assumption) {
            return false;
        }
        log::debug!("Recording assumption: {assumption}");
        self.inner.insert(assumption)
    }

    /// Checks whether an assumption is recorded.
    #[must_use]
    pub fn contains(&self, assumption: &Assumption) -> bool {
        self.inner.contains(assumption)
    }

    /// Checks whether nothing is assumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The number of recorded assumptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over the assumptions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Assumption> {
        self.inner.iter()
    }
}

impl<'a> IntoIterator for &'a Assumptions {
    type Item = &'a Assumption;
    type IntoIter = std::collections::btree_set::Iter<'a, Assumption>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assumptions_are_recorded_once() {
        let mut assumptions = Assumptions::default();
        let leaf = Assumption::LeafType(ClassRef::new("A"));
        assert!(assumptions.record(leaf.clone()));
        assert!(!assumptions.record(leaf.clone()));
        assert_eq!(assumptions.len(), 1);
        assert!(assumptions.contains(&leaf));
        assert_eq!(leaf.to_string(), "leaf type A");
    }
}
