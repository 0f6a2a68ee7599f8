//! Test helpers for interpreter tests
//!
//! Builders for block chains and programs, and a `Recorder` that captures
//! everything an engine sends to its callbacks.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;

use crate::blocks::{Block, BlockGraph};
use crate::interpreter::{PlaybackEngine, PlaybackEngineBuilder};
use crate::types::{BlockKind, Command, Instruction, Program};

/// Build `start -> b1 -> b2 -> ...` from block type tags
pub fn chain(tags: &[&str]) -> BlockGraph {
    let mut graph = BlockGraph::new("start");
    for (i, tag) in tags.iter().enumerate() {
        graph
            .append_block(Block::new(format!("b{}", i + 1), BlockKind::from_type_tag(tag)))
            .expect("append block");
    }
    graph
}

/// Program with ids `i1`, `i2`, ...
pub fn program(commands: &[Command]) -> Program {
    commands
        .iter()
        .enumerate()
        .map(|(i, command)| Instruction::new(format!("i{}", i + 1), *command))
        .collect()
}

/// Run a future on a `LocalSet` so the engine's timers can be spawned
pub async fn run_local<F: Future>(f: F) -> F::Output {
    LocalSet::new().run_until(f).await
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/* ===================== Recorder ===================== */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Emit(Command),
    Highlight(Option<String>),
}

pub fn emit(command: Command) -> Event {
    Event::Emit(command)
}

pub fn highlight(id: &str) -> Event {
    Event::Highlight(Some(id.to_string()))
}

pub fn cleared() -> Event {
    Event::Highlight(None)
}

#[derive(Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine builder with both callbacks wired to this recorder
    pub fn builder(&self) -> PlaybackEngineBuilder {
        let on_emit = self.clone();
        let on_highlight = self.clone();
        PlaybackEngine::builder()
            .emit(move |command| on_emit.push(Event::Emit(*command)))
            .highlight(move |id| on_highlight.push(Event::Highlight(id.map(|id| id.to_string()))))
    }

    pub fn engine(&self, program: Program) -> PlaybackEngine {
        self.builder().program(program).build()
    }

    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Emitted commands only, in order
    pub fn emitted(&self) -> Vec<Command> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Emit(command) => Some(*command),
                Event::Highlight(_) => None,
            })
            .collect()
    }

    pub fn last(&self) -> Option<Event> {
        self.events.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
