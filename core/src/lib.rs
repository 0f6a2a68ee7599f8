//! # Blockdrive core
//!
//! Compiles a learner's block chain into a linear program of driving
//! commands and plays it back under play / step / stop / speed control.
//!
//! - [`blocks`]: the block chain model and editor capabilities
//! - [`interpreter`]: compiler, playback engine and editor session
//! - [`command_queue`]: game-side buffer for emitted commands
//! - [`config`], [`cli`]: configuration loading and the `blockdrive` binary

pub mod blocks;
pub mod cli;
pub mod command_queue;
pub mod config;
pub mod interpreter;
pub mod types;

// Re-export main types
pub use types::*;

pub use blocks::{BlockGraph, BlockNode, BlockSource, InMemoryWorkspace, Subscription};
pub use command_queue::CommandQueue;
pub use interpreter::{compile, CompileError, Compiler, PlaybackEngine, Session};
