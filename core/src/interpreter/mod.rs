//! # Block Program Interpreter
//!
//! Two pieces, with data flowing one way:
//!
//! 1. **Compiler** (`compiler`): block chain -> [`Program`](crate::types::Program)
//! 2. **Playback engine** (`playback`): program -> timed `emit` / `highlight`
//!    callbacks under play / step / stop control
//!
//! `scheduler` supplies the engine's repeating timer and `session` wires an
//! editor's change notifications to recompilation.

pub mod compiler;
pub mod playback;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use compiler::{
    compile, CompileError, Compiler, CompilerOptions, MalformedProgram, UnrecognizedBlockPolicy,
};
pub use playback::{
    Mode, PlaybackEngine, PlaybackEngineBuilder, PlaybackOptions, PlaybackState, StepOutcome,
    DEFAULT_BASE_PERIOD,
};
pub use scheduler::{RepeatingTask, Scheduler, Tick, TokioScheduler};
pub use session::Session;
