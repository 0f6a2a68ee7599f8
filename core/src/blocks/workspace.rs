//! In-memory editor surface
//!
//! Stands in for the visual editor: holds a [`BlockGraph`], applies edits,
//! and tells subscribers after each successful edit.

use super::graph::{Block, BlockGraph, GraphError, NodeRef};
use super::{BlockSource, Listeners, Subscription};
use crate::types::{BlockKind, InstructionId};

pub struct InMemoryWorkspace {
    graph: BlockGraph,
    listeners: Listeners<InMemoryWorkspace>,
}

impl InMemoryWorkspace {
    pub fn new(graph: BlockGraph) -> Self {
        Self {
            graph,
            listeners: Listeners::new(),
        }
    }

    /// An empty workspace: just the start block
    pub fn with_start(start_id: impl Into<InstructionId>) -> Self {
        Self::new(BlockGraph::new(start_id))
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn append(&mut self, kind: impl Into<BlockKind>) -> InstructionId {
        let id = self.graph.append(kind);
        self.notify();
        id
    }

    pub fn append_block(&mut self, block: Block) -> Result<(), GraphError> {
        self.graph.append_block(block)?;
        self.notify();
        Ok(())
    }

    pub fn insert_after(
        &mut self,
        after: &InstructionId,
        kind: impl Into<BlockKind>,
    ) -> Result<InstructionId, GraphError> {
        let id = self.graph.insert_after(after, kind)?;
        self.notify();
        Ok(id)
    }

    pub fn remove(&mut self, id: &InstructionId) -> Result<Block, GraphError> {
        let removed = self.graph.remove(id)?;
        self.notify();
        Ok(removed)
    }

    pub fn link(
        &mut self,
        from: &InstructionId,
        to: Option<&InstructionId>,
    ) -> Result<(), GraphError> {
        self.graph.link(from, to)?;
        self.notify();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.notify();
    }

    /// Swap in a whole new graph (loading a saved workspace)
    pub fn replace(&mut self, graph: BlockGraph) {
        self.graph = graph;
        self.notify();
    }

    fn notify(&self) {
        let listeners = self.listeners.clone();
        listeners.notify(self);
    }
}

impl BlockSource for InMemoryWorkspace {
    type Node<'a> = NodeRef<'a>;

    fn start_node(&self) -> NodeRef<'_> {
        self.graph.start_node()
    }

    fn on_change(&self, listener: Box<dyn Fn(&Self)>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

impl std::fmt::Debug for InMemoryWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWorkspace")
            .field("graph", &self.graph)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockNode;
    use crate::types::Action;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_edits_notify_listeners_with_new_shape() {
        let mut workspace = InMemoryWorkspace::with_start("s");
        let lengths = Rc::new(RefCell::new(Vec::new()));

        let seen = Rc::clone(&lengths);
        let _subscription = workspace.on_change(Box::new(move |ws: &InMemoryWorkspace| {
            seen.borrow_mut().push(ws.graph().chain_ids().len());
        }));

        let a = workspace.append(Action::MoveForwards);
        workspace.append(Action::Deliver);
        workspace.remove(&a).unwrap();
        workspace.clear();

        assert_eq!(*lengths.borrow(), vec![2, 3, 2, 1]);
    }

    #[test]
    fn test_failed_edit_does_not_notify() {
        let mut workspace = InMemoryWorkspace::with_start("s");
        let calls = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&calls);
        let _subscription = workspace.on_change(Box::new(move |_: &InMemoryWorkspace| {
            *counter.borrow_mut() += 1
        }));

        assert!(workspace.remove(&"s".into()).is_err());
        assert!(workspace.insert_after(&"nope".into(), Action::Wait).is_err());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_start_node_reflects_edits() {
        let mut workspace = InMemoryWorkspace::with_start("s");
        workspace
            .append_block(Block::new("a", Action::TurnAround))
            .unwrap();

        let start = workspace.start_node();
        assert!(start.kind().is_start());
        assert_eq!(start.next().unwrap().instruction_id().as_str(), "a");
    }

    #[test]
    fn test_dropped_subscription_stops_notifications() {
        let mut workspace = InMemoryWorkspace::with_start("s");
        let subscription = workspace.on_change(Box::new(|_: &InMemoryWorkspace| {}));
        assert_eq!(workspace.listener_count(), 1);

        drop(subscription);
        assert_eq!(workspace.listener_count(), 0);
        workspace.append(Action::Wait);
    }
}
