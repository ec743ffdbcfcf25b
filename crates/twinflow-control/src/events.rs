//! [`ControlBus`] – broadcast channel of typed control events.
//!
//! Built on [`tokio::sync::broadcast`] so every subscriber receives every
//! event without any single subscriber blocking the others.  The bus serves
//! two consumers at once: the control loop uses condition-change and
//! feed-lost events as its tick source, and operator tooling (the CLI) tails
//! the same channel to surface feed losses and send failures.

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use twinflow_types::{ControlEvent, ControlPayload};

/// Default channel capacity (buffered events before old ones are dropped
/// for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared control event channel.  Clone it cheaply – all clones publish to
/// the same underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct ControlBus {
    sender: broadcast::Sender<ControlEvent>,
}

impl ControlBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `payload`, stamping it with an id and timestamp.
    ///
    /// Best-effort: returns the number of active receivers, `0` when nobody
    /// is listening (a normal condition, not an error).
    pub fn publish(&self, payload: ControlPayload) -> usize {
        let event = ControlEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        };
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.sender.subscribe()
    }
}

impl Default for ControlBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinflow_types::{Condition, FeedHandle};

    fn changed_payload() -> ControlPayload {
        ControlPayload::ConditionChanged {
            feed: FeedHandle::new("did:twin:a", "", "temperature"),
            condition: Condition::Holds,
        }
    }

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = ControlBus::default();
        let mut rx = bus.subscribe();

        bus.publish(changed_payload());

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.payload,
            ControlPayload::ConditionChanged { condition: Condition::Holds, .. }
        ));
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = ControlBus::default();
        assert_eq!(bus.publish(changed_payload()), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = ControlBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(changed_payload());

        let id1 = rx1.recv().await.unwrap().id;
        let id2 = rx2.recv().await.unwrap().id;
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag_not_panic() {
        let bus = ControlBus::new(4);
        let mut rx = bus.subscribe();

        for _ in 0..64 {
            bus.publish(changed_payload());
        }

        let result = rx.recv().await;
        assert!(matches!(
            result,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
