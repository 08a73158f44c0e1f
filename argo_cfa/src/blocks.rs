use crate::{Cfa, CfaEdge, CfaNodeId, EdgeKind, Identifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A region of the automaton with a single entry and a single exit that can be analyzed in
/// isolation and summarized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub function: Identifier,
    pub entry: CfaNodeId,
    pub exit: CfaNodeId,
    pub nodes: BTreeSet<CfaNodeId>,
}

impl Block {
    pub fn contains(&self, node: CfaNodeId) -> bool {
        self.nodes.contains(&node)
    }
}

/// A partition of a [`Cfa`] into [`Block`]s.
#[derive(Debug, Clone, Default)]
pub struct BlockPartitioning {
    blocks: Vec<Block>,
}

impl BlockPartitioning {
    /// One block per function body, except for the main function which is the root of the
    /// analysis and never summarized.
    pub fn by_function(cfa: &Cfa) -> Self {
        let main = cfa.main_function().name;
        let blocks = cfa
            .functions()
            .filter(|f| f.name != main)
            .enumerate()
            .map(|(i, f)| Block {
                id: BlockId(i as u32),
                function: f.name,
                entry: f.entry,
                exit: f.exit,
                nodes: cfa
                    .nodes()
                    .filter(|n| n.function == f.name)
                    .map(|n| n.id)
                    .collect(),
            })
            .collect();
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }

    /// The block whose entry is `node`, if any.
    pub fn block_at_entry(&self, node: CfaNodeId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.entry == node)
    }

    /// The block entered by a function call edge.
    pub fn block_called_by(&self, edge: &CfaEdge) -> Option<&Block> {
        match &edge.kind {
            EdgeKind::FunctionCall { callee, .. } => {
                self.blocks.iter().find(|b| b.function == *callee)
            }
            _ => None,
        }
    }
}
