//! Game-side command sink
//!
//! The view layer consumes emitted commands in arrival order, one animation
//! at a time. `CommandQueue` buffers them for that consumer; `emitter()`
//! plugs it straight into a [`PlaybackEngine`](crate::interpreter::PlaybackEngine).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

use crate::types::Command;

/// FIFO of emitted commands. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    commands: Rc<RefCell<VecDeque<Command>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        trace!(%command, "Command queued");
        self.commands.borrow_mut().push_back(command);
    }

    pub fn pop_front(&self) -> Option<Command> {
        self.commands.borrow_mut().pop_front()
    }

    /// Take every queued command, oldest first
    pub fn drain(&self) -> Vec<Command> {
        self.commands.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }

    /// Copy of the queued commands without consuming them
    pub fn snapshot(&self) -> Vec<Command> {
        self.commands.borrow().iter().copied().collect()
    }

    /// An `emit` callback that pushes onto this queue
    pub fn emitter(&self) -> impl Fn(&Command) + 'static {
        let queue = self.clone();
        move |command: &Command| queue.push(*command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::PlaybackEngine;
    use crate::types::{Instruction, Program};

    #[test]
    fn test_fifo_order() {
        let queue = CommandQueue::new();
        queue.push(Command::MoveForwards);
        queue.push(Command::TurnLeft);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front(), Some(Command::MoveForwards));
        assert_eq!(queue.pop_front(), Some(Command::TurnLeft));
        assert_eq!(queue.pop_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_snapshot_does_not_consume() {
        let queue = CommandQueue::new();
        queue.push(Command::Wait);

        assert_eq!(queue.snapshot(), vec![Command::Wait]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain(), vec![Command::Wait]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_emitter_collects_engine_output() {
        let queue = CommandQueue::new();
        let engine = PlaybackEngine::builder()
            .emit(queue.emitter())
            .program(Program::from(vec![
                Instruction::new("a", Command::SoundHorn),
                Instruction::new("b", Command::Deliver),
            ]))
            .build();

        engine.step();
        engine.step();
        engine.stop();

        assert_eq!(
            queue.drain(),
            vec![Command::SoundHorn, Command::Deliver, Command::Reset]
        );
    }
}
