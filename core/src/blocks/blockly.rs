//! Adapter for the Blockly workspace serialization format
//!
//! Blockly saves a workspace as a list of top-level stacks, each stack a
//! nested `next.block` chain:
//!
//! ```json
//! { "blocks": { "languageVersion": 0, "blocks": [
//!     { "type": "start", "id": "s", "x": 10, "y": 10,
//!       "next": { "block": { "type": "move_forwards", "id": "a" } } }
//! ] } }
//! ```
//!
//! Only `next` links are followed. Blocks nested in statement inputs (the
//! body of a `controls_if`, say) are not part of the linear chain.

use serde_json::Value as JsonValue;

use super::graph::{new_block_id, Block, BlockGraph, GraphError};
use crate::types::{BlockKind, InstructionId};

/// Load a graph from either the flat document format or a Blockly workspace
pub fn load_graph(json: &str) -> Result<BlockGraph, GraphError> {
    let value: JsonValue = serde_json::from_str(json)?;

    if value.get("start").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    if value.pointer("/blocks/blocks").is_some() {
        return BlockGraph::from_blockly_value(&value);
    }

    Err(GraphError::InvalidDocument(
        "expected a `start` field or a Blockly `blocks.blocks` list".to_string(),
    ))
}

impl BlockGraph {
    pub fn from_blockly_json(json: &str) -> Result<Self, GraphError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_blockly_value(&value)
    }

    pub fn from_blockly_value(value: &JsonValue) -> Result<Self, GraphError> {
        let stacks = value
            .pointer("/blocks/blocks")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| {
                GraphError::InvalidDocument("missing `blocks.blocks` list".to_string())
            })?;

        let mut blocks = Vec::new();
        let mut start = None;

        for stack in stacks {
            let head = collect_stack(stack, &mut blocks)?;
            if start.is_none() && blocks[head].kind.is_start() {
                start = Some(blocks[head].id.clone());
            }
        }

        let start = start.ok_or_else(|| {
            GraphError::InvalidDocument("workspace has no start block".to_string())
        })?;

        BlockGraph::from_blocks(start, blocks)
    }
}

/// Flatten one stack into `blocks`, returning the index of its head block
fn collect_stack(head: &JsonValue, blocks: &mut Vec<Block>) -> Result<usize, GraphError> {
    let head_index = blocks.len();
    let mut current = Some(head);
    let mut previous: Option<usize> = None;

    while let Some(value) = current {
        let block = parse_block(value)?;
        if let Some(prev) = previous {
            blocks[prev].next = Some(block.id.clone());
        }
        previous = Some(blocks.len());
        blocks.push(block);

        current = value.pointer("/next/block");
    }

    Ok(head_index)
}

fn parse_block(value: &JsonValue) -> Result<Block, GraphError> {
    let tag = value
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| GraphError::InvalidDocument("block without a `type`".to_string()))?;

    let id = match value.get("id").and_then(JsonValue::as_str) {
        Some(id) => InstructionId::from(id),
        None => new_block_id(),
    };

    Ok(Block::new(id, BlockKind::from_type_tag(tag)))
}
