use std::collections::BTreeSet;

use crate::{bytecode::ProgramCounter, runtime::ExceptionHandler};

/// The handlers of `table` that may catch an exception thrown at `pc`, in table order.
///
/// The search stops at the first catch-all handler, which is included.
pub fn handlers_covering(
    table: &[ExceptionHandler],
    pc: ProgramCounter,
) -> impl Iterator<Item = &ExceptionHandler> {
    let mut caught_all = false;
    table
        .iter()
        .filter(move |handler| handler.covers(pc))
        .take_while(move |handler| {
            let take = !caught_all;
            caught_all |= handler.is_catch_all();
            take
        })
}

/// Which instructions may throw, and which handlers cover them.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ExceptionCoverage {
    table: Vec<ExceptionHandler>,
    trapping: BTreeSet<ProgramCounter>,
}

impl ExceptionCoverage {
    /// Creates an index over an exception table with no trapping instruction recorded.
    #[must_use]
    pub fn new(table: Vec<ExceptionHandler>) -> Self {
        Self {
            table,
            trapping: BTreeSet::new(),
        }
    }

    /// The exception table.
    #[must_use]
    pub fn table(&self) -> &[ExceptionHandler] {
        &self.table
    }

    /// Checks whether the method has no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub(super) fn set_can_trap(&mut self, pc: ProgramCounter) {
        if !self.table.is_empty() {
            self.trapping.insert(pc);
        }
    }

    /// Checks whether the instruction at `pc` was recorded as possibly throwing.
    #[must_use]
    pub fn can_trap(&self, pc: ProgramCounter) -> bool {
        self.trapping.contains(&pc)
    }

    /// The handlers covering the instruction at `pc`, in table order up to the first catch-all.
    pub fn handlers_at(&self, pc: ProgramCounter) -> impl Iterator<Item = &ExceptionHandler> {
        handlers_covering(&self.table, pc)
    }

    /// The entries of the handlers covering any trapping instruction among `pcs`,
    /// without duplicates, in the order they are first found.
    pub fn covering<I>(&self, pcs: I) -> Vec<ProgramCounter>
    where
        I: IntoIterator<Item = ProgramCounter>,
    {
        let mut entries = Vec::new();
        for pc in pcs.into_iter().filter(|it| self.can_trap(*it)) {
            for handler in self.handlers_at(pc) {
                if !entries.contains(&handler.handler_pc) {
                    entries.push(handler.handler_pc);
                }
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassRef;

    fn handler(start: u16, end: u16, target: u16, catch_type: Option<&str>) -> ExceptionHandler {
        ExceptionHandler::from_table_entry(start, end, target, catch_type.map(ClassRef::new))
            .expect("The range is not empty")
    }

    #[test]
    fn catch_all_stops_the_search() {
        let table = vec![
            handler(0, 10, 20, None),
            handler(0, 5, 30, Some("java/lang/ArithmeticException")),
        ];
        let covering: Vec<_> = handlers_covering(&table, ProgramCounter::from(3))
            .map(|it| it.handler_pc)
            .collect();
        assert_eq!(covering, vec![ProgramCounter::from(20)]);
    }

    #[test]
    fn specific_handlers_come_first() {
        let table = vec![
            handler(0, 5, 30, Some("java/lang/ArithmeticException")),
            handler(0, 10, 20, None),
            handler(0, 10, 40, Some("java/lang/Exception")),
        ];
        let covering: Vec<_> = handlers_covering(&table, ProgramCounter::from(3))
            .map(|it| it.handler_pc)
            .collect();
        assert_eq!(
            covering,
            vec![ProgramCounter::from(30), ProgramCounter::from(20)]
        );
        let covering: Vec<_> = handlers_covering(&table, ProgramCounter::from(7))
            .map(|it| it.handler_pc)
            .collect();
        assert_eq!(covering, vec![ProgramCounter::from(20)]);
        assert_eq!(handlers_covering(&table, ProgramCounter::from(10)).count(), 0);
    }

    #[test]
    fn only_trapping_instructions_are_covered() {
        let mut coverage = ExceptionCoverage::new(vec![handler(0, 10, 20, None)]);
        coverage.set_can_trap(ProgramCounter::from(4));
        coverage.set_can_trap(ProgramCounter::from(6));
        assert_eq!(
            coverage.covering((0..4).map(ProgramCounter::from)),
            Vec::<ProgramCounter>::new()
        );
        assert_eq!(
            coverage.covering((0..10).map(ProgramCounter::from)),
            vec![ProgramCounter::from(20)]
        );
    }
}
