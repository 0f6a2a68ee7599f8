//! Keeps a playback engine in sync with an editor
//!
//! The engine is re-fed a freshly compiled program after every structural
//! edit of the block chain.

use tracing::debug;

use super::compiler::Compiler;
use super::playback::PlaybackEngine;
use crate::blocks::{BlockSource, Subscription};

pub struct Session {
    engine: PlaybackEngine,
    compiler: Compiler,
    subscription: Subscription,
}

impl Session {
    /// Compile the source's current chain into `engine` and recompile on
    /// every change until the session is dropped or detached.
    ///
    /// A chain that fails to compile loads as an empty program.
    pub fn attach<S: BlockSource + 'static>(
        source: &S,
        compiler: Compiler,
        engine: PlaybackEngine,
    ) -> Self {
        engine.load(compiler.compile_or_empty(source.start_node()));

        let listener_engine = engine.clone();
        let subscription = source.on_change(Box::new(move |source: &S| {
            debug!("Block chain changed, recompiling");
            listener_engine.load(compiler.compile_or_empty(source.start_node()));
        }));

        Self {
            engine,
            compiler,
            subscription,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Stop following the source and hand back the engine
    pub fn detach(self) -> PlaybackEngine {
        self.subscription.unsubscribe();
        self.engine
    }
}
