//! Block graph model
//!
//! The learner's program lives in an external block editor. The core only
//! sees it through two small capabilities:
//! - [`BlockNode`]: a read-only handle to one block in a singly-linked chain
//! - [`BlockSource`]: the editor surface (start node + change notification)
//!
//! [`BlockGraph`] is the in-crate chain store that editor adapters populate
//! (flat JSON, or the Blockly workspace serialization), and
//! [`InMemoryWorkspace`] is a `BlockSource` backed by it.

mod blockly;
mod graph;
mod workspace;

pub use blockly::load_graph;
pub use graph::{Block, BlockGraph, GraphError, NodeRef};
pub use workspace::InMemoryWorkspace;

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::{BlockKind, InstructionId};

/* ===================== Capabilities ===================== */

/// Read-only handle to one block of a chain
///
/// Instruction ids must be unique within a workspace: they are echoed back in
/// `highlight` calls, and the compiler treats a repeated id as a loop in the
/// chain.
pub trait BlockNode: Sized {
    fn kind(&self) -> &BlockKind;

    /// Identity of the block, unique within its workspace
    fn instruction_id(&self) -> &InstructionId;

    /// The follow-on block, if any
    fn next(&self) -> Option<Self>;
}

/// Editor surface supplying the learner's chain
pub trait BlockSource {
    type Node<'a>: BlockNode
    where
        Self: 'a;

    /// The designated start node of the workspace
    fn start_node(&self) -> Self::Node<'_>;

    /// Register a listener called after every structural edit.
    ///
    /// The listener stays registered for as long as the returned
    /// [`Subscription`] is alive.
    fn on_change(&self, listener: Box<dyn Fn(&Self)>) -> Subscription;
}

/* ===================== Subscriptions ===================== */

/// Handle for a registered listener; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

type Listener<T> = Rc<dyn Fn(&T)>;

struct ListenerTable<T: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// Listener registry shared between a source and its subscriptions
pub(crate) struct Listeners<T: ?Sized> {
    table: Rc<RefCell<ListenerTable<T>>>,
}

impl<T: ?Sized + 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            table: Rc::new(RefCell::new(ListenerTable {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn subscribe(&self, listener: Box<dyn Fn(&T)>) -> Subscription {
        let id = {
            let mut table = self.table.borrow_mut();
            let id = table.next_id;
            table.next_id += 1;
            table.entries.push((id, Rc::from(listener)));
            id
        };

        let weak = Rc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = weak.upgrade() {
                table.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Call every listener with `value`.
    ///
    /// Listeners may subscribe or unsubscribe while being notified; changes
    /// apply from the next notification on.
    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .table
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table.borrow().entries.len()
    }
}

impl<T: ?Sized> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_listeners_notified_until_unsubscribed() {
        let listeners: Listeners<u32> = Listeners::new();
        let seen = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&seen);
        let subscription =
            listeners.subscribe(Box::new(move |v: &u32| counter.set(counter.get() + *v)));

        listeners.notify(&2);
        listeners.notify(&3);
        assert_eq!(seen.get(), 5);

        subscription.unsubscribe();
        listeners.notify(&10);
        assert_eq!(seen.get(), 5);
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let listeners: Listeners<()> = Listeners::new();
        {
            let _subscription = listeners.subscribe(Box::new(|_: &()| {}));
            assert_eq!(listeners.len(), 1);
        }
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn test_subscription_outliving_registry_is_harmless() {
        let listeners: Listeners<()> = Listeners::new();
        let subscription = listeners.subscribe(Box::new(|_: &()| {}));
        drop(listeners);
        subscription.unsubscribe();
    }
}
