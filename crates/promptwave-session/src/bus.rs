//! Event delivery to observers.

use promptwave_core::SessionEvent;
use tokio::sync::broadcast;

/// Receiving end handed to observers.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Broadcasts [`SessionEvent`]s to every subscriber.
///
/// Each subscriber has its own bounded buffer; a subscriber that falls more
/// than `capacity` events behind sees `RecvError::Lagged` and skips ahead.
/// Emitting never blocks and never fails.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus with a per-subscriber buffer of `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event.
    pub fn emit(&self, event: SessionEvent) {
        tracing::debug!(?event, "session event");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Start receiving events emitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// Current subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptwave_core::PlaybackState;

    #[tokio::test]
    async fn subscribers_get_events_in_order() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.emit(SessionEvent::PlaybackStateChanged(PlaybackState::Loading));
        bus.emit(SessionEvent::error("boom"));

        for rx in [&mut a, &mut b] {
            assert_eq!(
                rx.recv().await.unwrap(),
                SessionEvent::PlaybackStateChanged(PlaybackState::Loading)
            );
            assert_eq!(rx.recv().await.unwrap(), SessionEvent::error("boom"));
        }
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new(1);
        bus.emit(SessionEvent::error("nobody listens"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
