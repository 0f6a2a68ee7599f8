//! Id-indexed store for a learner's block chain

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::BlockNode;
use crate::types::{BlockKind, InstructionId};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Start block {0} is not part of the graph")]
    MissingStart(InstructionId),

    #[error("Block {id} is a {kind} block, not a start block")]
    NotAStartBlock { id: InstructionId, kind: BlockKind },

    #[error("Block id {0} is used more than once")]
    DuplicateBlock(InstructionId),

    #[error("No block with id {0}")]
    UnknownBlock(InstructionId),

    #[error("Block {0} is the start block and cannot be removed")]
    UndeletableBlock(InstructionId),

    #[error("Invalid workspace document: {0}")]
    InvalidDocument(String),

    #[error("Failed to parse workspace JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/* ===================== Blocks ===================== */

/// One block instance as stored in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: InstructionId,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<InstructionId>,
}

impl Block {
    pub fn new(id: impl Into<InstructionId>, kind: impl Into<BlockKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            next: None,
        }
    }

    pub fn with_next(mut self, next: impl Into<InstructionId>) -> Self {
        self.next = Some(next.into());
        self
    }
}

/// Fresh id for a block added through an editing operation
pub(crate) fn new_block_id() -> InstructionId {
    InstructionId::new(uuid::Uuid::new_v4().simple().to_string())
}

/* ===================== Graph ===================== */

/// A set of blocks with one designated start block
///
/// Serialized as `{"start": "<id>", "blocks": [{"id", "type", "next"}, ...]}`.
/// Blocks unreachable from the start (detached stacks) are kept but never
/// compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct BlockGraph {
    start: InstructionId,
    blocks: HashMap<InstructionId, Block>,
}

#[derive(Serialize, Deserialize)]
struct GraphDocument {
    start: InstructionId,
    blocks: Vec<Block>,
}

impl TryFrom<GraphDocument> for BlockGraph {
    type Error = GraphError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        BlockGraph::from_blocks(doc.start, doc.blocks)
    }
}

impl From<BlockGraph> for GraphDocument {
    fn from(graph: BlockGraph) -> Self {
        let chain = graph.chain_ids();
        let in_chain: HashSet<&InstructionId> = chain.iter().collect();

        let mut detached: Vec<&Block> = graph
            .blocks
            .values()
            .filter(|b| !in_chain.contains(&b.id))
            .collect();
        detached.sort_by(|a, b| a.id.cmp(&b.id));

        let mut blocks: Vec<Block> = chain
            .iter()
            .filter_map(|id| graph.blocks.get(id).cloned())
            .collect();
        blocks.extend(detached.into_iter().cloned());

        GraphDocument {
            start: graph.start,
            blocks,
        }
    }
}

impl BlockGraph {
    /// A graph holding only a start block
    pub fn new(start_id: impl Into<InstructionId>) -> Self {
        let start = Block::new(start_id, BlockKind::Start);
        let mut blocks = HashMap::new();
        let start_id = start.id.clone();
        blocks.insert(start_id.clone(), start);
        Self {
            start: start_id,
            blocks,
        }
    }

    /// Build a graph from loose blocks, validating ids and the start block
    pub fn from_blocks(
        start: impl Into<InstructionId>,
        blocks: impl IntoIterator<Item = Block>,
    ) -> Result<Self, GraphError> {
        let start = start.into();
        let mut by_id = HashMap::new();
        for block in blocks {
            if by_id.contains_key(&block.id) {
                return Err(GraphError::DuplicateBlock(block.id));
            }
            by_id.insert(block.id.clone(), block);
        }

        match by_id.get(&start) {
            None => return Err(GraphError::MissingStart(start)),
            Some(block) if !block.kind.is_start() => {
                return Err(GraphError::NotAStartBlock {
                    id: start,
                    kind: block.kind.clone(),
                })
            }
            Some(_) => {}
        }

        Ok(Self {
            start,
            blocks: by_id,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn start_id(&self) -> &InstructionId {
        &self.start
    }

    pub fn start_node(&self) -> NodeRef<'_> {
        NodeRef {
            graph: self,
            block: &self.blocks[&self.start],
        }
    }

    pub fn block(&self, id: &InstructionId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn node(&self, id: &InstructionId) -> Option<NodeRef<'_>> {
        self.blocks.get(id).map(|block| NodeRef { graph: self, block })
    }

    /// Number of blocks, including the start block and detached blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: &InstructionId) -> bool {
        self.blocks.contains_key(id)
    }

    /// Ids along the chain, start block first.
    ///
    /// Stops at a dangling `next` or the first repeated id.
    pub fn chain_ids(&self) -> Vec<InstructionId> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(&self.start);

        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            let Some(block) = self.blocks.get(id) else {
                break;
            };
            ids.push(id.clone());
            current = block.next.as_ref();
        }

        ids
    }

    /* ===================== Editing ===================== */

    /// Append a block with a generated id to the end of the chain
    pub fn append(&mut self, kind: impl Into<BlockKind>) -> InstructionId {
        let id = new_block_id();
        let tail = self.tail_id();
        self.splice_after(&tail, Block::new(id.clone(), kind));
        id
    }

    /// Append a block to the end of the chain
    pub fn append_block(&mut self, block: Block) -> Result<(), GraphError> {
        let tail = self.tail_id();
        self.insert_block_after(&tail, block)
    }

    /// Insert a block with a generated id directly after `after`
    pub fn insert_after(
        &mut self,
        after: &InstructionId,
        kind: impl Into<BlockKind>,
    ) -> Result<InstructionId, GraphError> {
        let id = new_block_id();
        self.insert_block_after(after, Block::new(id.clone(), kind))?;
        Ok(id)
    }

    /// Insert `block` directly after `after`, keeping the rest of the chain
    /// behind it
    pub fn insert_block_after(
        &mut self,
        after: &InstructionId,
        block: Block,
    ) -> Result<(), GraphError> {
        if self.blocks.contains_key(&block.id) {
            return Err(GraphError::DuplicateBlock(block.id));
        }
        if !self.blocks.contains_key(after) {
            return Err(GraphError::UnknownBlock(after.clone()));
        }

        self.splice_after(after, block);
        Ok(())
    }

    /// Last block of the chain (the start block when the chain is empty)
    fn tail_id(&self) -> InstructionId {
        self.chain_ids()
            .pop()
            .unwrap_or_else(|| self.start.clone())
    }

    /// Link `block` in behind `after`. Callers check that `after` exists and
    /// that the block's id is new.
    fn splice_after(&mut self, after: &InstructionId, mut block: Block) {
        if let Some(predecessor) = self.blocks.get_mut(after) {
            block.next = predecessor.next.replace(block.id.clone());
        }
        self.blocks.insert(block.id.clone(), block);
    }

    /// Remove a block, reconnecting its predecessor to its successor
    pub fn remove(&mut self, id: &InstructionId) -> Result<Block, GraphError> {
        if *id == self.start {
            return Err(GraphError::UndeletableBlock(id.clone()));
        }
        let removed = self
            .blocks
            .remove(id)
            .ok_or_else(|| GraphError::UnknownBlock(id.clone()))?;

        for block in self.blocks.values_mut() {
            if block.next.as_ref() == Some(id) {
                block.next = removed.next.clone();
            }
        }

        Ok(removed)
    }

    /// Point `from` at `to` (or disconnect it when `to` is `None`)
    pub fn link(
        &mut self,
        from: &InstructionId,
        to: Option<&InstructionId>,
    ) -> Result<(), GraphError> {
        if let Some(to) = to {
            if !self.blocks.contains_key(to) {
                return Err(GraphError::UnknownBlock(to.clone()));
            }
        }
        let block = self
            .blocks
            .get_mut(from)
            .ok_or_else(|| GraphError::UnknownBlock(from.clone()))?;
        block.next = to.cloned();
        Ok(())
    }

    /// Remove every block except the start block
    pub fn clear(&mut self) {
        let start = self.start.clone();
        self.blocks.retain(|id, _| *id == start);
        if let Some(block) = self.blocks.get_mut(&start) {
            block.next = None;
        }
    }
}

/* ===================== Node Handles ===================== */

/// Borrowed handle to one block of a [`BlockGraph`]
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    graph: &'a BlockGraph,
    block: &'a Block,
}

impl<'a> NodeRef<'a> {
    pub fn block(&self) -> &'a Block {
        self.block
    }
}

impl BlockNode for NodeRef<'_> {
    fn kind(&self) -> &BlockKind {
        &self.block.kind
    }

    fn instruction_id(&self) -> &InstructionId {
        &self.block.id
    }

    /// A `next` id that names no block ends the chain
    fn next(&self) -> Option<Self> {
        let next_id = self.block.next.as_ref()?;
        self.graph.node(next_id)
    }
}
