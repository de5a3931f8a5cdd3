//! Fan-out of schedule writes to push subscribers.

use timetable_core::api::ScheduleDocument;
use tokio::sync::broadcast;

/// Tracks connected subscribers for broadcasting updates.
pub struct ScheduleHub {
    sender: broadcast::Sender<ScheduleDocument>,
}

impl ScheduleHub {
    /// Creates a hub buffering up to `capacity` unread documents per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleDocument> {
        self.sender.subscribe()
    }

    /// Sends a document to every subscriber. Returns how many received it.
    pub fn broadcast(&self, document: ScheduleDocument) -> usize {
        // Ignore send errors (no subscribers)
        self.sender.send(document).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ScheduleHub {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timetable_core::{ScheduleMap, Version};

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let hub = ScheduleHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        let doc = ScheduleDocument {
            schedules: ScheduleMap::new(),
            last_updated: Some(Version::new("v1")),
        };
        assert_eq!(hub.broadcast(doc.clone()), 2);

        assert_eq!(first.recv().await.unwrap(), doc);
        assert_eq!(second.recv().await.unwrap(), doc);
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let hub = ScheduleHub::default();
        let doc = ScheduleDocument {
            schedules: ScheduleMap::new(),
            last_updated: None,
        };
        assert_eq!(hub.broadcast(doc), 0);
    }
}
