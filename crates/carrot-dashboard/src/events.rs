//! In-process notifications about snapshot refreshes.

use tokio::sync::broadcast;

use carrot_core::SubjectId;

const DEFAULT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// A complete snapshot was written to the cache.
    Refreshed { subject_id: SubjectId, elapsed_ms: u64 },
    /// A refresh ended without writing anything.
    RefreshFailed { subject_id: SubjectId, reason: String },
    /// The cached snapshot was dropped on request.
    Invalidated { subject_id: SubjectId },
}

impl DashboardEvent {
    pub fn subject_id(&self) -> SubjectId {
        match self {
            Self::Refreshed { subject_id, .. }
            | Self::RefreshFailed { subject_id, .. }
            | Self::Invalidated { subject_id } => *subject_id,
        }
    }
}

/// Broadcaster for [`DashboardEvent`]s.
///
/// Slow receivers lose the oldest events once the buffer is full.
#[derive(Clone)]
pub struct DashboardEvents {
    sender: broadcast::Sender<DashboardEvent>,
}

impl DashboardEvents {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that received the event.
    pub fn send(&self, event: DashboardEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DashboardEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers() {
        let events = DashboardEvents::new();
        assert_eq!(
            events.send(DashboardEvent::Invalidated {
                subject_id: SubjectId::new(1)
            }),
            0
        );
    }

    #[tokio::test]
    async fn test_subscribe_receives() {
        let events = DashboardEvents::new();
        let mut rx = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);

        events.send(DashboardEvent::Invalidated {
            subject_id: SubjectId::new(7),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.subject_id(), SubjectId::new(7));
    }
}
