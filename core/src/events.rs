// Store change notifications
//
// Uses a tokio broadcast channel so any number of presentation layers can
// re-render after a store mutation completes.

use crate::widget::WidgetId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event sent to store observers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    WidgetAdded { id: WidgetId },
    WidgetRemoved { id: WidgetId },
    /// Positions of every widget were reassigned
    WidgetsReordered,
    RefreshStarted { id: WidgetId },
    RefreshFinished { id: WidgetId, success: bool },
}

impl StoreEvent {
    /// Widget this event concerns, if any
    pub fn widget_id(&self) -> Option<WidgetId> {
        match self {
            StoreEvent::WidgetAdded { id }
            | StoreEvent::WidgetRemoved { id }
            | StoreEvent::RefreshStarted { id }
            | StoreEvent::RefreshFinished { id, .. } => Some(*id),
            StoreEvent::WidgetsReordered => None,
        }
    }
}

/// Event broadcaster for store observers
#[derive(Clone, Debug)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn broadcast(&self, event: StoreEvent) {
        // Ignore error if no subscribers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
