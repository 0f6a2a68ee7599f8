//! Block chain compiler
//!
//! Walks the chain hanging off a start block and linearizes it into a
//! [`Program`]. Traversal order is execution order; nothing is reordered.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::blocks::BlockNode;
use crate::types::{BlockKind, Command, Instruction, InstructionId, Program};

/* ===================== Errors ===================== */

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Program must start from a start block, got a {found} block ({id})")]
    InvalidStartNode { id: InstructionId, found: String },

    #[error("Malformed program: {0}")]
    MalformedProgram(#[from] MalformedProgram),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedProgram {
    #[error("block {0} is reached twice (the chain loops)")]
    Cycle(InstructionId),

    #[error("chain is longer than {limit} blocks")]
    TooLong { limit: usize },
}

/* ===================== Options ===================== */

/// What to do with blocks that are not one of the seven actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnrecognizedBlockPolicy {
    /// Leave the block out of the program
    #[default]
    Skip,
    /// Compile the block to a `wait` command
    Wait,
}

pub const DEFAULT_MAX_INSTRUCTIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    pub unrecognized_blocks: UnrecognizedBlockPolicy,
    /// Upper bound on blocks visited after the start block
    pub max_instructions: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            unrecognized_blocks: UnrecognizedBlockPolicy::Skip,
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
        }
    }
}

/* ===================== Compiler ===================== */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compiler {
    options: CompilerOptions,
}

/// Compile with the default options (unrecognized blocks are skipped)
pub fn compile<N: BlockNode>(start: N) -> Result<Program, CompileError> {
    Compiler::default().compile(start)
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Linearize the chain after `start` into a program.
    ///
    /// The start block itself never yields an instruction. Traversal is
    /// bounded: a block reached twice or a chain longer than
    /// `max_instructions` fails with [`CompileError::MalformedProgram`].
    /// Blocks are told apart by instruction id, so two nodes sharing an id
    /// count as the same block.
    pub fn compile<N: BlockNode>(&self, start: N) -> Result<Program, CompileError> {
        if !start.kind().is_start() {
            return Err(CompileError::InvalidStartNode {
                id: start.instruction_id().clone(),
                found: start.kind().to_string(),
            });
        }

        let mut seen: HashSet<InstructionId> = HashSet::new();
        seen.insert(start.instruction_id().clone());

        let mut instructions = Vec::new();
        let mut visited = 0usize;
        let mut current = start.next();

        while let Some(node) = current {
            let id = node.instruction_id();
            if !seen.insert(id.clone()) {
                return Err(MalformedProgram::Cycle(id.clone()).into());
            }
            visited += 1;
            if visited > self.options.max_instructions {
                return Err(MalformedProgram::TooLong {
                    limit: self.options.max_instructions,
                }
                .into());
            }

            if let Some(command) = self.command_for(node.kind()) {
                instructions.push(Instruction::new(id.clone(), command));
            }

            current = node.next();
        }

        debug!(
            visited,
            instructions = instructions.len(),
            "Compiled block chain"
        );

        Ok(Program::from(instructions))
    }

    /// Compile, falling back to an empty program on failure.
    ///
    /// Used where a broken chain must not take playback down with it.
    pub fn compile_or_empty<N: BlockNode>(&self, start: N) -> Program {
        match self.compile(start) {
            Ok(program) => program,
            Err(e) => {
                warn!(error = %e, "Failed to compile block chain, using an empty program");
                Program::empty()
            }
        }
    }

    fn command_for(&self, kind: &BlockKind) -> Option<Command> {
        match kind {
            BlockKind::Action(action) => Some(Command::from(*action)),
            BlockKind::Start | BlockKind::Unrecognized(_) => {
                match self.options.unrecognized_blocks {
                    UnrecognizedBlockPolicy::Skip => None,
                    UnrecognizedBlockPolicy::Wait => Some(Command::Wait),
                }
            }
        }
    }
}
