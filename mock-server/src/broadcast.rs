// Event fan-out to SSE clients
//
// One bounded tokio broadcast channel; every open /api/events connection holds a receiver.

use crate::Result;
use serde::Serialize;
use tokio::sync::broadcast;

/// One named SSE message, `data` already serialized
#[derive(Clone, Debug, PartialEq)]
pub struct SseMessage {
    pub event: &'static str,
    pub data: String,
}

impl SseMessage {
    pub fn json<T: Serialize>(event: &'static str, payload: &T) -> Result<Self> {
        Ok(Self {
            event,
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SseMessage>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every connected client; returns how many received it
    pub fn broadcast(&self, message: SseMessage) -> usize {
        // No subscribers is not an error
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseMessage> {
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
