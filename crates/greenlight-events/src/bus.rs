//! Event bus for broadcasting decision-path events to subscribers.

use greenlight_core::ConversationId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::event::ConversationEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A published event together with the conversation it belongs to.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// The conversation the event belongs to.
    pub conversation_id: ConversationId,
    /// The event itself.
    pub event: ConversationEvent,
}

/// Broadcast bus for conversation events.
///
/// Events are delivered to all subscribers in publish order. Publishing
/// never blocks; a subscriber that falls behind skips lagged events
/// rather than stalling the publisher.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<EventEnvelope>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event for a conversation.
    ///
    /// Returns the number of receivers that will observe it.
    pub fn publish(&self, conversation_id: ConversationId, event: ConversationEvent) -> usize {
        let envelope = Arc::new(EventEnvelope {
            conversation_id,
            event,
        });
        trace!(event_type = envelope.event.event_type(), "publishing event");
        match self.sender.send(Arc::clone(&envelope)) {
            Ok(count) => {
                debug!(
                    event_type = envelope.event.event_type(),
                    receiver_count = count,
                    "event published"
                );
                count
            },
            // No receivers - this is fine.
            Err(_) => 0,
        }
    }

    /// Subscribe to all events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            conversation: None,
        }
    }

    /// Subscribe to events for a single conversation.
    #[must_use]
    pub fn subscribe_conversation(&self, conversation_id: ConversationId) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            conversation: Some(conversation_id),
        }
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// The channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        // A clone shares the same channel.
        Self {
            sender: self.sender.clone(),
            capacity: self.capacity,
        }
    }
}

/// Receiver for events from the event bus.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<EventEnvelope>>,
    conversation: Option<ConversationId>,
}

impl EventReceiver {
    /// Receive the next matching event.
    ///
    /// Returns `None` once the bus is closed. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<Arc<EventEnvelope>> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if let Some(conversation) = &self.conversation {
                        if envelope.conversation_id != *conversation {
                            continue;
                        }
                    }
                    return Some(envelope);
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event receiver lagged");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let conv = ConversationId::new();
        let mut receiver = bus.subscribe();

        bus.publish(
            conv.clone(),
            ConversationEvent::Delta {
                content: "hi".to_string(),
            },
        );

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.conversation_id, conv);
        assert_eq!(envelope.event.event_type(), "delta");
    }

    #[tokio::test]
    async fn test_conversation_filter() {
        let bus = EventBus::new();
        let mine = ConversationId::new();
        let other = ConversationId::new();
        let mut receiver = bus.subscribe_conversation(mine.clone());

        bus.publish(
            other,
            ConversationEvent::Delta {
                content: "not mine".to_string(),
            },
        );
        bus.publish(
            mine.clone(),
            ConversationEvent::Delta {
                content: "mine".to_string(),
            },
        );

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.conversation_id, mine);
    }

    #[tokio::test]
    async fn test_publish_without_receivers() {
        let bus = EventBus::new();
        let count = bus.publish(
            ConversationId::new(),
            ConversationEvent::Delta {
                content: "nobody listening".to_string(),
            },
        );
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_clone_shares_channel() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut receiver = bus.subscribe();

        clone.publish(
            ConversationId::new(),
            ConversationEvent::Delta {
                content: "via clone".to_string(),
            },
        );
        assert!(receiver.recv().await.is_some());
    }
}
