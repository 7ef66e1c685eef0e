//! Discovery of basic blocks before the graph is built.
//!
//! [`BlockMap::build`] scans the bytecode of one method, finds every block start, computes the
//! successors and covering exception handlers of each block, numbers the blocks in reverse
//! post-order, and detects loop headers.
mod error;
mod exception_map;
mod local_set;

use std::collections::BTreeMap;

pub use error::{BlockMapError, MalformedCode};
pub use exception_map::{ExceptionCoverage, handlers_covering};
pub use local_set::LocalSet;

use crate::{
    bytecode::{BytecodeStream, Decoded, ProgramCounter, RawInstruction, WideInstruction},
    ir::BlockFlags,
    runtime::MethodCode,
};

/// A basic block found by the [`BlockMap`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BlockInfo {
    /// The first instruction.
    pub start: ProgramCounter,
    /// The position after the last instruction.
    pub end: ProgramCounter,
    /// Entry kinds and [`BlockFlags::LOOP_HEADER`].
    pub flags: BlockFlags,
    /// The blocks control may continue at, with switch defaults last.
    pub successors: Vec<ProgramCounter>,
    /// The handlers covering a trapping instruction of the block, in table order.
    pub exception_handlers: Vec<ProgramCounter>,
    /// The reverse post-order number, [`None`] if the block is unreachable.
    pub depth_first_number: Option<u32>,
}

impl BlockInfo {
    fn new(start: ProgramCounter) -> Self {
        Self {
            start,
            end: start,
            flags: BlockFlags::empty(),
            successors: Vec::new(),
            exception_handlers: Vec::new(),
            depth_first_number: None,
        }
    }

    /// Checks a flag.
    #[must_use]
    pub const fn is(&self, flag: BlockFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Checks whether `pc` lies in the block.
    #[must_use]
    pub fn contains(&self, pc: ProgramCounter) -> bool {
        (self.start..self.end).contains(&pc)
    }
}

/// The basic blocks of a method.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BlockMap {
    blocks: Vec<BlockInfo>,
    coverage: ExceptionCoverage,
    stores_in_loops: LocalSet,
}

impl BlockMap {
    /// Discovers the blocks of `code`.
    ///
    /// When `precise_loop_stores` is `false`, every local is assumed to be stored in loops.
    /// The block starting at `osr_entry`, if any, is flagged [`BlockFlags::OSR_ENTRY`].
    /// # Errors
    /// - [`BlockMapError::Scan`] if the code cannot be decoded.
    /// - [`BlockMapError::Malformed`] if a block start is not an instruction or control falls
    ///   off the end of the code.
    pub fn build(
        code: &MethodCode,
        precise_loop_stores: bool,
        osr_entry: Option<ProgramCounter>,
    ) -> Result<Self, BlockMapError> {
        if code.bytecode.is_empty() {
            Err(MalformedCode::EmptyCode)?;
        }
        let instructions = BytecodeStream::new(&code.bytecode).collect::<Result<Vec<_>, _>>()?;

        let mut starts = BTreeMap::new();
        let mut make = |pc: ProgramCounter, flags: BlockFlags| {
            *starts.entry(pc).or_insert_with(BlockFlags::empty) |= flags;
        };
        make(ProgramCounter::ZERO, BlockFlags::empty());
        for handler in &code.exception_table {
            make(handler.handler_pc, BlockFlags::EXCEPTION_ENTRY);
        }
        if let Some(osr_entry) = osr_entry {
            make(osr_entry, BlockFlags::OSR_ENTRY);
        }

        let mut coverage = ExceptionCoverage::new(code.exception_table.clone());
        let mut ending_successors = BTreeMap::new();
        for decoded in &instructions {
            if decoded.instruction.can_trap() {
                coverage.set_can_trap(decoded.pc);
            }
            if let Some(successors) = explicit_successors(decoded)? {
                for &successor in &successors {
                    make(successor, BlockFlags::empty());
                }
                if let Some(subroutine) = subroutine_entry(decoded)? {
                    make(subroutine, BlockFlags::SUBROUTINE_ENTRY);
                }
                ending_successors.insert(decoded.pc, successors);
            }
        }

        for &start in starts.keys() {
            if start.index() >= code.bytecode.len() {
                Err(MalformedCode::TargetOutOfRange(start))?;
            }
            if instructions
                .binary_search_by_key(&start, |it| it.pc)
                .is_err()
            {
                Err(MalformedCode::TargetInsideInstruction(start))?;
            }
        }

        let mut blocks: Vec<_> = starts
            .into_iter()
            .map(|(start, flags)| BlockInfo {
                flags,
                ..BlockInfo::new(start)
            })
            .collect();
        move_successor_lists(&mut blocks, &instructions, &mut ending_successors, &coverage)?;

        let mut map = Self {
            blocks,
            coverage,
            stores_in_loops: LocalSet::new(usize::from(code.max_locals)),
        };
        let loop_blocks = map.number_blocks();
        map.stores_in_loops = if precise_loop_stores {
            map.compute_stores_in_loops(&instructions, &loop_blocks, code.max_locals)
        } else {
            LocalSet::full(usize::from(code.max_locals))
        };
        log::trace!(
            "Discovered {} blocks with {} loop headers",
            map.blocks.len(),
            map.loop_headers().count()
        );
        Ok(map)
    }

    /// All blocks ordered by their start.
    #[must_use]
    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    /// The block starting at `pc`.
    #[must_use]
    pub fn get(&self, pc: ProgramCounter) -> Option<&BlockInfo> {
        self.position(pc).map(|it| &self.blocks[it])
    }

    /// Checks whether a block starts at `pc`.
    #[must_use]
    pub fn is_block_start(&self, pc: ProgramCounter) -> bool {
        self.position(pc).is_some()
    }

    /// The number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Checks whether there are no blocks, which never holds for a built map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The targets of back edges.
    pub fn loop_headers(&self) -> impl Iterator<Item = &BlockInfo> {
        self.blocks
            .iter()
            .filter(|it| it.is(BlockFlags::LOOP_HEADER))
    }

    /// The locals written inside loops.
    #[must_use]
    pub const fn stores_in_loops(&self) -> &LocalSet {
        &self.stores_in_loops
    }

    /// The trapping instructions and their handlers.
    #[must_use]
    pub const fn coverage(&self) -> &ExceptionCoverage {
        &self.coverage
    }

    fn position(&self, pc: ProgramCounter) -> Option<usize> {
        self.blocks.binary_search_by_key(&pc, |it| it.start).ok()
    }

    /// Numbers the reachable blocks in reverse post-order of a depth-first traversal through
    /// successors and then handlers, flagging the targets of back edges as loop headers.
    /// Returns which blocks lie in a loop.
    #[allow(clippy::cast_possible_truncation)]
    fn number_blocks(&mut self) -> Vec<bool> {
        struct Frame {
            block: usize,
            children: Vec<usize>,
            next: usize,
            // The shallowest active loop header reached from the subtree.
            reaches: Option<usize>,
        }

        let len = self.blocks.len();
        let children_of = |map: &Self, block: usize| -> Vec<usize> {
            let info = &map.blocks[block];
            info.successors
                .iter()
                .chain(&info.exception_handlers)
                .filter_map(|it| map.position(*it))
                .collect()
        };

        let mut visited = vec![false; len];
        let mut depth: Vec<Option<usize>> = vec![None; len];
        let mut reaches: Vec<Option<usize>> = vec![None; len];
        let mut in_loop = vec![false; len];
        let mut next_number = len as u32;

        let Some(entry) = self.position(ProgramCounter::ZERO) else {
            return in_loop;
        };
        visited[entry] = true;
        depth[entry] = Some(0);
        let mut stack = vec![Frame {
            block: entry,
            children: children_of(self, entry),
            next: 0,
            reaches: None,
        }];

        while let Some(frame) = stack.last_mut() {
            if let Some(&child) = frame.children.get(frame.next) {
                frame.next += 1;
                if depth[child].is_some() {
                    self.blocks[child].flags |= BlockFlags::LOOP_HEADER;
                    frame.reaches = shallower_header(frame.reaches, Some(child), &depth);
                } else if visited[child] {
                    let cached = reaches[child].filter(|it| depth[*it].is_some());
                    frame.reaches = shallower_header(frame.reaches, cached, &depth);
                } else {
                    visited[child] = true;
                    depth[child] = Some(stack.len());
                    let children = children_of(self, child);
                    stack.push(Frame {
                        block: child,
                        children,
                        next: 0,
                        reaches: None,
                    });
                }
                continue;
            }

            let Some(done) = stack.pop() else { break };
            self.blocks[done.block].depth_first_number = Some(next_number);
            next_number -= 1;
            in_loop[done.block] = done.reaches.is_some();
            // A header reached only from its own subtree does not put the parent in the loop.
            let outer = done.reaches.filter(|it| *it != done.block);
            reaches[done.block] = outer;
            depth[done.block] = None;
            if let Some(parent) = stack.last_mut() {
                parent.reaches = shallower_header(parent.reaches, outer, &depth);
            }
        }
        in_loop
    }

    fn compute_stores_in_loops(
        &self,
        instructions: &[Decoded],
        loop_blocks: &[bool],
        max_locals: u16,
    ) -> LocalSet {
        let mut stores = LocalSet::new(usize::from(max_locals));
        let in_loop = self
            .blocks
            .iter()
            .zip(loop_blocks)
            .filter_map(|(block, in_loop)| in_loop.then_some(block));
        for block in in_loop {
            let stored = instructions
                .iter()
                .skip_while(|it| it.pc < block.start)
                .take_while(|it| it.pc < block.end)
                .filter_map(|it| it.instruction.local_store());
            for store in stored {
                stores.insert(usize::from(store.index));
                if store.double_word {
                    stores.insert(usize::from(store.index) + 1);
                }
            }
        }
        stores
    }
}

fn shallower_header(
    lhs: Option<usize>,
    rhs: Option<usize>,
    depth: &[Option<usize>],
) -> Option<usize> {
    match (lhs, rhs) {
        (Some(l), Some(r)) if depth[r] < depth[l] => Some(r),
        (None, r) => r,
        (l, _) => l,
    }
}

/// The successors of an instruction ending a block, [`None`] if control may fall through.
fn explicit_successors(decoded: &Decoded) -> Result<Option<Vec<ProgramCounter>>, BlockMapError> {
    #[allow(clippy::enum_glob_use)]
    use RawInstruction::*;
    let successors = match &decoded.instruction {
        IfEq { offset }
        | IfNe { offset }
        | IfLt { offset }
        | IfGe { offset }
        | IfGt { offset }
        | IfLe { offset }
        | IfICmpEq { offset }
        | IfICmpNe { offset }
        | IfICmpLt { offset }
        | IfICmpGe { offset }
        | IfICmpGt { offset }
        | IfICmpLe { offset }
        | IfACmpEq { offset }
        | IfACmpNe { offset }
        | IfNull { offset }
        | IfNonNull { offset } => vec![
            decoded.next_pc,
            decoded.branch_target(i32::from(*offset))?,
        ],
        Goto { offset } => vec![decoded.branch_target(i32::from(*offset))?],
        GotoW { offset } => vec![decoded.branch_target(*offset)?],
        Jsr { offset } => vec![decoded.next_pc, decoded.branch_target(i32::from(*offset))?],
        JsrW { offset } => vec![decoded.next_pc, decoded.branch_target(*offset)?],
        TableSwitch {
            default, offsets, ..
        } => offsets
            .iter()
            .chain(std::iter::once(default))
            .map(|it| decoded.branch_target(*it))
            .collect::<Result<_, _>>()?,
        LookupSwitch { default, pairs } => pairs
            .iter()
            .map(|(_, offset)| offset)
            .chain(std::iter::once(default))
            .map(|it| decoded.branch_target(*it))
            .collect::<Result<_, _>>()?,
        IReturn | LReturn | FReturn | DReturn | AReturn | Return | AThrow | Ret { .. }
        | Wide(WideInstruction::Ret { .. }) => Vec::new(),
        _ => return Ok(None),
    };
    Ok(Some(successors))
}

fn subroutine_entry(decoded: &Decoded) -> Result<Option<ProgramCounter>, BlockMapError> {
    let target = match &decoded.instruction {
        RawInstruction::Jsr { offset } => decoded.branch_target(i32::from(*offset))?,
        RawInstruction::JsrW { offset } => decoded.branch_target(*offset)?,
        _ => return Ok(None),
    };
    Ok(Some(target))
}

/// Attaches the successors recorded for block-ending instructions to their blocks, adds a
/// fall-through edge to blocks interrupted by the start of the next block, and collects the
/// handlers covering each block.
fn move_successor_lists(
    blocks: &mut [BlockInfo],
    instructions: &[Decoded],
    ending_successors: &mut BTreeMap<ProgramCounter, Vec<ProgramCounter>>,
    coverage: &ExceptionCoverage,
) -> Result<(), MalformedCode> {
    let mut next_block = 0;
    let mut current: Option<usize> = None;
    for decoded in instructions {
        if blocks
            .get(next_block)
            .is_some_and(|it| it.start == decoded.pc)
        {
            if let Some(previous) = current {
                blocks[previous].successors = vec![decoded.pc];
                blocks[previous].end = decoded.pc;
            }
            current = Some(next_block);
            next_block += 1;
        }
        let Some(block) = current else {
            continue;
        };
        if coverage.can_trap(decoded.pc) {
            for handler in coverage.handlers_at(decoded.pc) {
                if !blocks[block].exception_handlers.contains(&handler.handler_pc) {
                    blocks[block].exception_handlers.push(handler.handler_pc);
                }
            }
        }
        if let Some(successors) = ending_successors.remove(&decoded.pc) {
            blocks[block].successors = successors;
            blocks[block].end = decoded.next_pc;
            current = None;
        }
    }
    if current.is_some() {
        Err(MalformedCode::FallsOffEnd)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{RawInstruction::*, assemble},
        runtime::ExceptionHandler,
        types::ClassRef,
    };

    fn code(max_locals: u16, instructions: &[RawInstruction]) -> MethodCode {
        MethodCode {
            max_stack: 4,
            max_locals,
            bytecode: assemble(instructions).expect("Fail to assemble"),
            exception_table: Vec::new(),
        }
    }

    fn pcs<const N: usize>(pcs: [u16; N]) -> Vec<ProgramCounter> {
        pcs.into_iter().map(ProgramCounter::from).collect()
    }

    // for (int i = 0; i < n; i++) {} return i;
    fn counting_loop() -> MethodCode {
        code(
            2,
            &[
                IConst0,
                IStore1,
                ILoad1,
                ILoad0,
                IfICmpGe { offset: 9 },
                IInc {
                    index: 1,
                    constant: 1,
                },
                Goto { offset: -8 },
                ILoad1,
                IReturn,
            ],
        )
    }

    #[test]
    fn straight_line() {
        let map = BlockMap::build(&code(2, &[IConst0, IStore1, ILoad1, IReturn]), true, None)
            .expect("Fail to build");
        assert_eq!(map.len(), 1);
        let block = &map.blocks()[0];
        assert_eq!(block.start, ProgramCounter::ZERO);
        assert_eq!(block.end, ProgramCounter::from(4));
        assert!(block.successors.is_empty());
        assert_eq!(block.depth_first_number, Some(1));
        assert_eq!(map.loop_headers().count(), 0);
        assert!(map.stores_in_loops().is_empty());
    }

    #[test]
    fn loop_header_and_stores() {
        let map = BlockMap::build(&counting_loop(), true, None).expect("Fail to build");
        assert_eq!(
            map.blocks().iter().map(|it| it.start).collect::<Vec<_>>(),
            pcs([0, 2, 7, 13])
        );
        let headers: Vec<_> = map.loop_headers().map(|it| it.start).collect();
        assert_eq!(headers, pcs([2]));

        let successors = |pc: u16| &map.get(ProgramCounter::from(pc)).unwrap().successors;
        assert_eq!(successors(0), &pcs([2]));
        assert_eq!(successors(2), &pcs([7, 13]));
        assert_eq!(successors(7), &pcs([2]));
        assert!(successors(13).is_empty());

        assert!(map.stores_in_loops().contains(1));
        assert!(!map.stores_in_loops().contains(0));

        let conservative = BlockMap::build(&counting_loop(), false, None).expect("Fail to build");
        assert!(conservative.stores_in_loops().contains(0));
        assert!(conservative.stores_in_loops().contains(1));
        assert_eq!(conservative.blocks(), map.blocks());
    }

    #[test]
    fn numbering_follows_forward_edges() {
        let map = BlockMap::build(&counting_loop(), true, None).expect("Fail to build");
        assert_eq!(map.get(ProgramCounter::ZERO).unwrap().depth_first_number, Some(1));
        for block in map.blocks() {
            let number = block.depth_first_number.unwrap();
            for successor in &block.successors {
                let target = map.get(*successor).unwrap();
                assert!(
                    number < target.depth_first_number.unwrap()
                        || target.is(BlockFlags::LOOP_HEADER)
                );
            }
        }
    }

    #[test]
    fn arms_joining_in_loop_are_in_the_loop() {
        // while (n != 0) { if (n >= 0) { m = 2; } else { n = 1; } }
        // The second arm reaches the loop header only through the already numbered join block.
        let map = BlockMap::build(
            &code(
                2,
                &[
                    ILoad0,              // 0
                    IfEq { offset: 19 }, // 1 -> 20
                    ILoad0,              // 4
                    IfGe { offset: 9 },  // 5 -> 14
                    IConst1,             // 8
                    IStore0,             // 9
                    Goto { offset: 7 },  // 10 -> 17
                    Nop,                 // 13
                    IConst2,             // 14
                    IStore1,             // 15
                    Nop,                 // 16
                    Goto { offset: -17 }, // 17 -> 0
                    Return,              // 20
                ],
            ),
            true,
            None,
        )
        .expect("Fail to build");
        assert_eq!(
            map.blocks().iter().map(|it| it.start).collect::<Vec<_>>(),
            pcs([0, 4, 8, 14, 17, 20])
        );
        let headers: Vec<_> = map.loop_headers().map(|it| it.start).collect();
        assert_eq!(headers, pcs([0]));
        assert_eq!(map.get(ProgramCounter::from(14)).unwrap().successors, pcs([17]));
        assert!(map.stores_in_loops().contains(0));
        assert!(map.stores_in_loops().contains(1));
    }

    #[test]
    fn handlers_per_block() {
        let mut method = code(
            2,
            &[
                ALoad0,
                IConst1,
                PutField { index: 1 },
                ALoad0,
                IConst2,
                PutField { index: 1 },
                Return,
                AStore1,
                Return,
            ],
        );
        method.exception_table = vec![
            ExceptionHandler::from_table_entry(
                0,
                11,
                11,
                Some(ClassRef::new("java/lang/NullPointerException")),
            )
            .unwrap(),
        ];
        let map = BlockMap::build(&method, true, None).expect("Fail to build");
        let entry = map.get(ProgramCounter::ZERO).unwrap();
        assert_eq!(entry.exception_handlers, pcs([11]));
        let handler = map.get(ProgramCounter::from(11)).unwrap();
        assert!(handler.is(BlockFlags::EXCEPTION_ENTRY));
        assert!(handler.depth_first_number.is_some());
        assert!(map.coverage().can_trap(ProgramCounter::from(2)));
        assert!(!map.coverage().can_trap(ProgramCounter::from(3)));
    }

    #[test]
    fn switch_successors() {
        let map = BlockMap::build(
            &code(
                1,
                &[
                    ILoad0,
                    TableSwitch {
                        default: 27,
                        low: 0,
                        high: 1,
                        offsets: vec![23, 25],
                    },
                    IConst0,
                    IReturn,
                    IConst1,
                    IReturn,
                    IConst2,
                    IReturn,
                ],
            ),
            true,
            None,
        )
        .expect("Fail to build");
        // tableswitch at 1 with 2 bytes of padding occupies 1..24
        assert_eq!(map.blocks()[0].successors, pcs([24, 26, 28]));
    }

    #[test]
    fn subroutines() {
        let map = BlockMap::build(
            &code(2, &[Jsr { offset: 4 }, Return, AStore1, Ret { index: 1 }]),
            true,
            None,
        )
        .expect("Fail to build");
        assert_eq!(map.blocks()[0].successors, pcs([3, 4]));
        let subroutine = map.get(ProgramCounter::from(4)).unwrap();
        assert!(subroutine.is(BlockFlags::SUBROUTINE_ENTRY));
        assert!(subroutine.successors.is_empty());
    }

    #[test]
    fn osr_entry() {
        let map = BlockMap::build(&counting_loop(), true, Some(ProgramCounter::from(2)))
            .expect("Fail to build");
        assert!(map.get(ProgramCounter::from(2)).unwrap().is(BlockFlags::OSR_ENTRY));
    }

    #[test]
    fn malformed_code() {
        assert_eq!(
            BlockMap::build(&code(0, &[IConst0]), true, None),
            Err(BlockMapError::Malformed(MalformedCode::FallsOffEnd))
        );
        assert_eq!(
            BlockMap::build(&code(0, &[Goto { offset: 1 }, Return]), true, None),
            Err(BlockMapError::Malformed(
                MalformedCode::TargetInsideInstruction(ProgramCounter::from(1))
            ))
        );
        assert_eq!(
            BlockMap::build(&code(0, &[Goto { offset: 4 }, Return]), true, None),
            Err(BlockMapError::Malformed(MalformedCode::TargetOutOfRange(
                ProgramCounter::from(4)
            )))
        );
        assert_eq!(
            BlockMap::build(&MethodCode::default(), true, None),
            Err(BlockMapError::Malformed(MalformedCode::EmptyCode))
        );
    }

    #[test]
    fn deterministic() {
        let first = BlockMap::build(&counting_loop(), true, None).expect("Fail to build");
        let second = BlockMap::build(&counting_loop(), true, None).expect("Fail to build");
        assert_eq!(first, second);
    }
}
