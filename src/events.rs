//! Lifecycle hook binder
//!
//! Tree mutations arrive as typed events and are dispatched synchronously, in
//! registration order, to every listener.

use crate::error::IndexError;
use crate::types::{Locale, NodeId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identity of the node an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
}

impl NodeRef {
    pub fn new(id: NodeId, parent_id: Option<NodeId>) -> Self {
        Self { id, parent_id }
    }
}

/// Tree mutation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    /// A node was created
    NodeAdded(NodeRef),
    /// A node's name changed in at least one locale
    NodeRenamed(NodeRef),
    /// A node was re-parented; `node.parent_id` is the new parent
    NodeMoved {
        node: NodeRef,
        previous_parent: Option<NodeId>,
    },
    /// A node was removed from the tree
    NodeDeleted(NodeRef),
    LocaleAdded(Locale),
    LocaleRemoved(Locale),
}

impl TreeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TreeEvent::NodeAdded(_) => "node_added",
            TreeEvent::NodeRenamed(_) => "node_renamed",
            TreeEvent::NodeMoved { .. } => "node_moved",
            TreeEvent::NodeDeleted(_) => "node_deleted",
            TreeEvent::LocaleAdded(_) => "locale_added",
            TreeEvent::LocaleRemoved(_) => "locale_removed",
        }
    }
}

/// Receiver of tree mutation events
pub trait TreeListener: Send + Sync {
    fn on_event(&self, event: &TreeEvent) -> Result<(), IndexError>;
}

/// Synchronous event dispatcher
#[derive(Default)]
pub struct TreeEventDispatcher {
    listeners: RwLock<Vec<Arc<dyn TreeListener>>>,
}

impl TreeEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn TreeListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to every listener.
    ///
    /// All listeners see the event even when one fails; the first error is returned.
    pub fn dispatch(&self, event: &TreeEvent) -> Result<(), IndexError> {
        let listeners = self.listeners.read().clone();
        debug!(event = event.name(), listeners = listeners.len(), "Dispatching tree event");

        let mut first_error = None;
        for listener in listeners {
            if let Err(err) = listener.on_event(event) {
                warn!(event = event.name(), error = %err, "Tree listener failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<TreeEvent>>,
        fail: bool,
    }

    impl TreeListener for Recorder {
        fn on_event(&self, event: &TreeEvent) -> Result<(), IndexError> {
            self.seen.lock().push(event.clone());
            if self.fail {
                return Err(IndexError::NodeNotFound(0));
            }
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_reaches_every_listener() {
        let dispatcher = TreeEventDispatcher::new();
        let failing = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let ok = Arc::new(Recorder::default());
        dispatcher.subscribe(failing.clone());
        dispatcher.subscribe(ok.clone());
        assert_eq!(dispatcher.listener_count(), 2);

        let event = TreeEvent::NodeRenamed(NodeRef::new(10, Some(1)));
        let result = dispatcher.dispatch(&event);
        assert!(matches!(result, Err(IndexError::NodeNotFound(0))));
        assert_eq!(failing.seen.lock().as_slice(), &[event.clone()]);
        assert_eq!(ok.seen.lock().as_slice(), &[event]);
    }

    #[test]
    fn test_dispatch_without_listeners() {
        let dispatcher = TreeEventDispatcher::new();
        assert!(dispatcher
            .dispatch(&TreeEvent::LocaleAdded(Locale::Named(5)))
            .is_ok());
    }
}
