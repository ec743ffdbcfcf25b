//! [`ConditionWatcher`] – one task per subscribed feed.
//!
//! Consumes the feed's payload stream in arrival order, applies the
//! configured threshold predicate to every decoded reading, and stores the
//! verdict in the shared [`ConditionState`] under its own key.  The watcher
//! is the sole writer for that key.
//!
//! Per-message decode failures are logged and skipped.  Termination of the
//! underlying stream is fatal for the watcher: it resets its entry to
//! [`Condition::Absent`] (never `Clear`), publishes a
//! [`ControlPayload::FeedLost`] event, and stops.

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use twinflow_platform::decode_reading;
use twinflow_platform::subscriber::RawPayloadStream;
use twinflow_types::{Condition, ControlPayload, FeedHandle, ThresholdPredicate};

use crate::events::ControlBus;
use crate::liveness::FeedLiveness;
use crate::state::ConditionState;

/// Per-feed condition evaluation task.
pub struct ConditionWatcher {
    feed: FeedHandle,
    label: String,
    predicate: ThresholdPredicate,
    state: ConditionState,
    bus: ControlBus,
    liveness: FeedLiveness,
}

impl ConditionWatcher {
    pub fn new(
        feed: FeedHandle,
        label: impl Into<String>,
        predicate: ThresholdPredicate,
        state: ConditionState,
        bus: ControlBus,
        liveness: FeedLiveness,
    ) -> Self {
        Self {
            feed,
            label: label.into(),
            predicate,
            state,
            bus,
            liveness,
        }
    }

    /// Spawn the watcher onto the runtime.  It runs until its stream
    /// terminates or `shutdown` flips to `true`.
    pub fn spawn(
        self,
        stream: RawPayloadStream,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(stream, shutdown))
    }

    async fn run(self, mut stream: RawPayloadStream, mut shutdown: watch::Receiver<bool>) {
        self.liveness.register(&self.feed);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A closed shutdown channel means the loop is gone; stop
                    // either way.
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(feed = %self.feed, "watcher stopping on shutdown signal");
                        return;
                    }
                }
                item = stream.next() => match item {
                    Some(raw) => self.handle_payload(&raw),
                    None => {
                        // Transport terminated.  Reset to Absent so the ALL
                        // policy fails closed, then surface the loss.
                        self.state.set(&self.feed, Condition::Absent);
                        self.liveness.unregister(&self.feed);
                        warn!(feed = %self.feed, "feed stream terminated");
                        self.bus.publish(ControlPayload::FeedLost {
                            feed: self.feed.clone(),
                        });
                        return;
                    }
                }
            }
        }
    }

    fn handle_payload(&self, raw: &[u8]) {
        let reading = match decode_reading(raw, &self.label) {
            Ok(reading) => reading,
            Err(err) => {
                // Per-message failure: log, skip, keep the stream alive.
                warn!(feed = %self.feed, error = %err, "skipping undecodable payload");
                return;
            }
        };

        self.liveness.mark(&self.feed);
        let condition = Condition::from(self.predicate.eval(&reading));
        debug!(feed = %self.feed, value = reading.value, ?condition, "reading evaluated");

        if self.state.set(&self.feed, condition) {
            self.bus.publish(ControlPayload::ConditionChanged {
                feed: self.feed.clone(),
                condition,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio::time::timeout;
    use twinflow_platform::sim::SimFeedHub;
    use twinflow_platform::FeedSubscriber;
    use twinflow_types::{ControlEvent, ThresholdOp};

    const LABEL: &str = "sensor_reading";

    fn feed(id: &str) -> FeedHandle {
        FeedHandle::new(format!("did:twin:{id}"), "", id)
    }

    fn at_or_below(threshold: f64) -> ThresholdPredicate {
        ThresholdPredicate::new(ThresholdOp::AtOrBelow, threshold)
    }

    async fn next_event(rx: &mut broadcast::Receiver<ControlEvent>) -> ControlPayload {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event expected within 1s")
            .expect("bus must stay open")
            .payload
    }

    struct Harness {
        publisher: twinflow_platform::sim::SimFeedPublisher,
        state: ConditionState,
        events: broadcast::Receiver<ControlEvent>,
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<()>,
    }

    async fn start_watcher(threshold: f64) -> Harness {
        let hub = SimFeedHub::new();
        let publisher = hub.register(&feed("a"));
        let stream = hub.subscribe(&feed("a")).await.unwrap();

        let state = ConditionState::new();
        let bus = ControlBus::default();
        let events = bus.subscribe();
        let liveness = FeedLiveness::new(Duration::from_secs(60));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let watcher = ConditionWatcher::new(
            feed("a"),
            LABEL,
            at_or_below(threshold),
            state.clone(),
            bus,
            liveness,
        );
        let handle = watcher.spawn(stream, shutdown_rx);

        Harness {
            publisher,
            state,
            events,
            shutdown,
            handle,
        }
    }

    #[tokio::test]
    async fn condition_tracks_latest_reading() {
        let mut h = start_watcher(18.0).await;

        // 22: above threshold -> Clear (a change from Absent).
        h.publisher.publish_value(LABEL, 22.0).await;
        assert!(matches!(
            next_event(&mut h.events).await,
            ControlPayload::ConditionChanged { condition: Condition::Clear, .. }
        ));

        // 19: still Clear, no event; 17: Holds.
        h.publisher.publish_value(LABEL, 19.0).await;
        h.publisher.publish_value(LABEL, 17.0).await;
        assert!(matches!(
            next_event(&mut h.events).await,
            ControlPayload::ConditionChanged { condition: Condition::Holds, .. }
        ));

        assert_eq!(h.state.get(&feed("a")), Condition::Holds);
    }

    #[tokio::test]
    async fn undecodable_payload_is_skipped_not_fatal() {
        let mut h = start_watcher(18.0).await;

        h.publisher.publish(b"garbage".to_vec()).await;
        h.publisher.publish_value(LABEL, 15.0).await;

        // The garbage payload produced no event; the valid one did.
        assert!(matches!(
            next_event(&mut h.events).await,
            ControlPayload::ConditionChanged { condition: Condition::Holds, .. }
        ));
        assert_eq!(h.state.get(&feed("a")), Condition::Holds);
    }

    #[tokio::test]
    async fn stream_termination_resets_condition_to_absent() {
        let mut h = start_watcher(18.0).await;

        h.publisher.publish_value(LABEL, 15.0).await;
        assert!(matches!(
            next_event(&mut h.events).await,
            ControlPayload::ConditionChanged { condition: Condition::Holds, .. }
        ));

        drop(h.publisher);
        assert!(matches!(
            next_event(&mut h.events).await,
            ControlPayload::FeedLost { .. }
        ));
        assert_eq!(h.state.get(&feed("a")), Condition::Absent);

        timeout(Duration::from_secs(1), h.handle)
            .await
            .expect("watcher must exit after stream termination")
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_signal_stops_watcher_promptly() {
        let h = start_watcher(18.0).await;

        h.shutdown.send(true).unwrap();
        timeout(Duration::from_secs(1), h.handle)
            .await
            .expect("watcher must exit on shutdown")
            .unwrap();
    }
}
