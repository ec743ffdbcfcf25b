//! In-process simulation drivers for CI/CD testing without a live platform.
//!
//! - [`StaticDiscovery`] – returns a fixed, pre-configured feed set.
//! - [`SimFeedHub`] – feeds driven by hand from test code; dropping a feed's
//!   publisher terminates its stream.
//! - [`RampPublisher`] – a self-driving temperature feed that ramps up and
//!   down on a timer, for demo runs.
//! - [`RecordingInputSender`] – records every accepted command and can be
//!   told to fail the next N sends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;
use twinflow_types::{ActuatorCommand, FeedHandle, InputHandle, TwinError};

use crate::discovery::Discovery;
use crate::sender::InputSender;
use crate::subscriber::{FeedSubscriber, RawPayloadStream};

/// Channel capacity for simulated feeds; deep enough that a slow test
/// consumer never drops a scripted payload.
const SIM_FEED_CAPACITY: usize = 64;

fn receiver_stream(rx: mpsc::Receiver<Vec<u8>>) -> RawPayloadStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

fn encode_payload(label: &str, value: impl Into<serde_json::Value>) -> Vec<u8> {
    let mut map = serde_json::Map::new();
    map.insert(label.to_string(), value.into());
    serde_json::Value::Object(map).to_string().into_bytes()
}

// ────────────────────────────────────────────────────────────────────────────
// Static discovery
// ────────────────────────────────────────────────────────────────────────────

/// A [`Discovery`] implementation that returns a fixed feed set.
pub struct StaticDiscovery {
    feeds: Vec<FeedHandle>,
}

impl StaticDiscovery {
    pub fn new(feeds: Vec<FeedHandle>) -> Self {
        Self { feeds }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self) -> Result<Vec<FeedHandle>, TwinError> {
        Ok(self.feeds.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Hand-driven feed hub
// ────────────────────────────────────────────────────────────────────────────

/// Handle used by test code to push payloads into one simulated feed.
///
/// Dropping the publisher closes the feed's channel, which the subscriber
/// side observes as stream termination.
pub struct SimFeedPublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl SimFeedPublisher {
    /// Push one raw payload into the feed.
    pub async fn publish(&self, payload: Vec<u8>) {
        // Receiver dropped means the watcher is gone; nothing to assert here.
        let _ = self.tx.send(payload).await;
    }

    /// Convenience: push `{"<label>": value}`.
    pub async fn publish_value(&self, label: &str, value: f64) {
        self.publish(encode_payload(label, value)).await;
    }
}

/// A [`FeedSubscriber`] whose feeds are driven by hand.
///
/// Register each feed up front with [`SimFeedHub::register`]; the returned
/// [`SimFeedPublisher`] is the writing end, and the first `subscribe` call
/// for that handle takes the reading end.
#[derive(Default)]
pub struct SimFeedHub {
    pending: Mutex<HashMap<FeedHandle, mpsc::Receiver<Vec<u8>>>>,
}

impl SimFeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `feed` and return its publishing handle.
    ///
    /// Re-registering a handle replaces any unclaimed subscription.
    pub fn register(&self, feed: &FeedHandle) -> SimFeedPublisher {
        let (tx, rx) = mpsc::channel(SIM_FEED_CAPACITY);
        self.pending
            .lock()
            .expect("sim feed hub lock poisoned")
            .insert(feed.clone(), rx);
        SimFeedPublisher { tx }
    }
}

#[async_trait]
impl FeedSubscriber for SimFeedHub {
    async fn subscribe(&self, feed: &FeedHandle) -> Result<RawPayloadStream, TwinError> {
        let rx = self
            .pending
            .lock()
            .expect("sim feed hub lock poisoned")
            .remove(feed)
            .ok_or_else(|| TwinError::Subscribe {
                feed: feed.to_string(),
                details: "feed not registered (or already subscribed)".to_string(),
            })?;
        Ok(receiver_stream(rx))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Self-driving ramp publisher
// ────────────────────────────────────────────────────────────────────────────

/// A [`FeedSubscriber`] that simulates temperature sensors: each subscribed
/// feed ramps from `low` up to `high` and back, one payload per `period`.
pub struct RampPublisher {
    label: String,
    low: i64,
    high: i64,
    period: Duration,
}

impl RampPublisher {
    pub fn new(label: impl Into<String>, low: i64, high: i64, period: Duration) -> Self {
        Self {
            label: label.into(),
            low,
            high,
            period,
        }
    }
}

#[async_trait]
impl FeedSubscriber for RampPublisher {
    async fn subscribe(&self, feed: &FeedHandle) -> Result<RawPayloadStream, TwinError> {
        let (tx, rx) = mpsc::channel(SIM_FEED_CAPACITY);
        let label = self.label.clone();
        let (low, high, period) = (self.low, self.high, self.period);
        let feed = feed.clone();

        tokio::spawn(async move {
            let up = low..=high;
            let down = (low + 1..high).rev();
            for value in up.chain(down).cycle() {
                let payload = encode_payload(&label, value);
                if tx.send(payload).await.is_err() {
                    // Subscriber went away; the ramp has no other consumer.
                    debug!(%feed, "ramp publisher stopping");
                    return;
                }
                tokio::time::sleep(period).await;
            }
        });

        Ok(receiver_stream(rx))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording input sink
// ────────────────────────────────────────────────────────────────────────────

/// An [`InputSender`] that records every accepted command.
///
/// Tests can inject failures with [`fail_next_sends`][Self::fail_next_sends];
/// each failing call decrements the counter, so "fail once then accept" is a
/// single call with `n = 1`.
#[derive(Default)]
pub struct RecordingInputSender {
    sends: Mutex<Vec<(InputHandle, ActuatorCommand)>>,
    fail_remaining: AtomicUsize,
}

impl RecordingInputSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` sends fail with [`TwinError::SendFailed`].
    pub fn fail_next_sends(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Every command accepted so far, in send order.
    pub fn sends(&self) -> Vec<(InputHandle, ActuatorCommand)> {
        self.sends.lock().expect("recording sender lock poisoned").clone()
    }

    /// Number of commands accepted so far.
    pub fn send_count(&self) -> usize {
        self.sends.lock().expect("recording sender lock poisoned").len()
    }
}

#[async_trait]
impl InputSender for RecordingInputSender {
    async fn send_input(
        &self,
        input: &InputHandle,
        command: ActuatorCommand,
    ) -> Result<(), TwinError> {
        let should_fail = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TwinError::SendFailed {
                input: input.to_string(),
                details: "injected failure".to_string(),
            });
        }
        self.sends
            .lock()
            .expect("recording sender lock poisoned")
            .push((input.clone(), command));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(id: &str) -> FeedHandle {
        FeedHandle::new(format!("did:twin:{id}"), "", id)
    }

    #[tokio::test]
    async fn static_discovery_returns_configured_feeds() {
        let feeds = vec![feed("a"), feed("b")];
        let discovery = StaticDiscovery::new(feeds.clone());
        assert_eq!(discovery.discover().await.unwrap(), feeds);
    }

    #[tokio::test]
    async fn hub_delivers_published_payloads_in_order() {
        let hub = SimFeedHub::new();
        let publisher = hub.register(&feed("a"));
        let mut stream = hub.subscribe(&feed("a")).await.unwrap();

        publisher.publish_value("sensor_reading", 22.0).await;
        publisher.publish_value("sensor_reading", 19.0).await;

        assert_eq!(stream.next().await.unwrap(), br#"{"sensor_reading":22.0}"#);
        assert_eq!(stream.next().await.unwrap(), br#"{"sensor_reading":19.0}"#);
    }

    #[tokio::test]
    async fn hub_stream_terminates_when_publisher_dropped() {
        let hub = SimFeedHub::new();
        let publisher = hub.register(&feed("a"));
        let mut stream = hub.subscribe(&feed("a")).await.unwrap();

        drop(publisher);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn hub_rejects_unregistered_feed() {
        let hub = SimFeedHub::new();
        let err = match hub.subscribe(&feed("ghost")).await {
            Err(err) => err,
            Ok(_) => panic!("subscribe to unregistered feed must fail"),
        };
        assert!(matches!(err, TwinError::Subscribe { .. }));
    }

    #[tokio::test]
    async fn ramp_publisher_emits_decodable_payloads() {
        let ramp = RampPublisher::new("sensor_reading", 18, 22, Duration::from_millis(1));
        let mut stream = ramp.subscribe(&feed("temp")).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("ramp must emit promptly")
            .expect("ramp stream must stay open");
        let reading = crate::decode_reading(&first, "sensor_reading").unwrap();
        assert!((reading.value - 18.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn recording_sender_records_commands() {
        let sender = RecordingInputSender::new();
        let input = InputHandle::new("did:twin:rad", "radiator_switch");

        sender.send_input(&input, ActuatorCommand::On).await.unwrap();
        sender.send_input(&input, ActuatorCommand::Off).await.unwrap();

        let sends = sender.sends();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].1, ActuatorCommand::On);
        assert_eq!(sends[1].1, ActuatorCommand::Off);
    }

    #[tokio::test]
    async fn recording_sender_injected_failures_are_consumed() {
        let sender = RecordingInputSender::new();
        let input = InputHandle::new("did:twin:rad", "radiator_switch");
        sender.fail_next_sends(1);

        let err = sender.send_input(&input, ActuatorCommand::On).await.unwrap_err();
        assert!(matches!(err, TwinError::SendFailed { .. }));
        assert_eq!(sender.send_count(), 0);

        // The failure budget is spent; the retry goes through.
        sender.send_input(&input, ActuatorCommand::On).await.unwrap();
        assert_eq!(sender.send_count(), 1);
    }
}
