//! Implementations of the `petgraph` visit traits for the block graph.
//!
//! Nodes are blocks. Edges lead to the successors of the terminator and to the exception
//! handlers of a block.
use std::collections::BTreeSet;

use petgraph::{
    Directed, Direction,
    visit::{
        Data, GraphBase, GraphProp, IntoEdgeReferences, IntoNeighbors, IntoNeighborsDirected,
        IntoNodeIdentifiers, IntoNodeReferences, NodeCount, NodeIndexable, VisitMap, Visitable,
    },
};

use super::{Block, BlockId, IrGraph};

/// The kind of an edge between two blocks.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, derive_more::Display)]
pub enum EdgeKind {
    /// Control leaves the source through its terminator.
    #[display("control")]
    Control,
    /// An instruction of the source throws to the handler.
    #[display("exception")]
    Exception,
}

impl IrGraph {
    fn edges_from(&self, block: BlockId) -> impl Iterator<Item = (BlockId, BlockId, EdgeKind)> + '_ {
        let block = self.block(block);
        let control = block
            .successors()
            .into_iter()
            .map(move |it| (block.id, it, EdgeKind::Control));
        let exception = block
            .exception_handlers
            .iter()
            .map(move |it| (block.id, *it, EdgeKind::Exception));
        control.chain(exception)
    }
}

impl Data for IrGraph {
    type NodeWeight = Block;
    type EdgeWeight = EdgeKind;
}

impl GraphBase for IrGraph {
    type NodeId = BlockId;
    type EdgeId = (BlockId, BlockId);
}

impl GraphProp for IrGraph {
    type EdgeType = Directed;
}

impl<'a> IntoNodeReferences for &'a IrGraph {
    type NodeRef = (BlockId, &'a Block);
    type NodeReferences = <Vec<Self::NodeRef> as IntoIterator>::IntoIter;

    fn node_references(self) -> Self::NodeReferences {
        self.blocks()
            .iter()
            .map(|it| (it.id, it))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<'a> IntoEdgeReferences for &'a IrGraph {
    type EdgeRef = (BlockId, BlockId, &'a EdgeKind);
    type EdgeReferences = <Vec<Self::EdgeRef> as IntoIterator>::IntoIter;

    fn edge_references(self) -> Self::EdgeReferences {
        self.blocks()
            .iter()
            .flat_map(|it| self.edges_from(it.id))
            .map(|(src, dst, kind)| {
                let kind: &'a EdgeKind = match kind {
                    EdgeKind::Control => &EdgeKind::Control,
                    EdgeKind::Exception => &EdgeKind::Exception,
                };
                (src, dst, kind)
            })
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl IntoNodeIdentifiers for &IrGraph {
    type NodeIdentifiers = <Vec<BlockId> as IntoIterator>::IntoIter;

    fn node_identifiers(self) -> Self::NodeIdentifiers {
        self.blocks()
            .iter()
            .map(|it| it.id)
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl IntoNeighbors for &IrGraph {
    type Neighbors = <BTreeSet<BlockId> as IntoIterator>::IntoIter;

    fn neighbors(self, a: Self::NodeId) -> Self::Neighbors {
        self.neighbors_directed(a, Direction::Outgoing)
    }
}

impl IntoNeighborsDirected for &IrGraph {
    type NeighborsDirected = <BTreeSet<BlockId> as IntoIterator>::IntoIter;

    fn neighbors_directed(self, n: Self::NodeId, d: Direction) -> Self::NeighborsDirected {
        if d == Direction::Outgoing {
            self.edges_from(n)
                .map(|(_, dst, _)| dst)
                .collect::<BTreeSet<_>>()
                .into_iter()
        } else {
            self.block(n)
                .predecessors
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
        }
    }
}

impl NodeCount for IrGraph {
    fn node_count(&self) -> usize {
        self.blocks().len()
    }
}

impl NodeIndexable for IrGraph {
    fn node_bound(&self) -> usize {
        self.blocks().len()
    }

    fn to_index(&self, ix: Self::NodeId) -> usize {
        ix.index()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_index(&self, ix: usize) -> Self::NodeId {
        BlockId(ix as u32)
    }
}

/// A visit map for the block graph.
pub type Visited = BTreeSet<BlockId>;

impl VisitMap<BlockId> for Visited {
    fn visit(&mut self, a: BlockId) -> bool {
        self.insert(a)
    }

    fn is_visited(&self, a: &BlockId) -> bool {
        self.contains(a)
    }

    fn unvisit(&mut self, a: BlockId) -> bool {
        self.remove(&a)
    }
}

impl Visitable for IrGraph {
    type Map = Visited;

    fn visit_map(&self) -> Self::Map {
        Visited::new()
    }

    fn reset_map(&self, map: &mut Self::Map) {
        map.clear();
    }
}
