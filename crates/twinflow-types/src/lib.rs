use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifies one outbound data stream (a "feed") owned by a remote twin.
///
/// Resolved once by discovery and immutable afterwards; used as the key of
/// the shared condition map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedHandle {
    /// DID of the twin that owns the feed.
    pub twin_id: String,
    /// Host the twin lives on (empty for the local host).
    pub host_id: String,
    /// Feed identifier within the twin, e.g. "temperature".
    pub feed_id: String,
}

impl FeedHandle {
    pub fn new(
        twin_id: impl Into<String>,
        host_id: impl Into<String>,
        feed_id: impl Into<String>,
    ) -> Self {
        Self {
            twin_id: twin_id.into(),
            host_id: host_id.into(),
            feed_id: feed_id.into(),
        }
    }
}

impl std::fmt::Display for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.host_id, self.twin_id, self.feed_id)
    }
}

/// Identifies one inbound command channel (an "input") owned by a remote
/// twin, e.g. a radiator's `radiator_switch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputHandle {
    /// DID of the twin that owns the input.
    pub twin_id: String,
    /// Input identifier within the twin, e.g. "radiator_switch".
    pub input_id: String,
}

impl InputHandle {
    pub fn new(twin_id: impl Into<String>, input_id: impl Into<String>) -> Self {
        Self {
            twin_id: twin_id.into(),
            input_id: input_id.into(),
        }
    }
}

impl std::fmt::Display for InputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.twin_id, self.input_id)
    }
}

/// One decoded feed message: a named numeric value.
///
/// Readings carry no timestamp of their own; ordering is arrival order
/// within a single feed and nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// The value label the feed publishes under, e.g. "sensor_reading".
    pub label: String,
    pub value: f64,
}

/// Verdict of the threshold predicate for one feed.
///
/// Explicit three-state replacement for a set/cleared flag: a feed that has
/// not produced a reading yet (or whose stream died) is `Absent`, which the
/// aggregation policies treat differently from `Clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// No reading evaluated yet, or the feed's stream has terminated.
    Absent,
    /// The most recent reading satisfied the predicate.
    Holds,
    /// The most recent reading did not satisfy the predicate.
    Clear,
}

impl From<bool> for Condition {
    fn from(verdict: bool) -> Self {
        if verdict { Condition::Holds } else { Condition::Clear }
    }
}

/// Comparison operator of a threshold predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOp {
    /// `value < threshold`
    Below,
    /// `value <= threshold`
    AtOrBelow,
    /// `value > threshold`
    Above,
    /// `value >= threshold`
    AtOrAbove,
}

/// Configurable predicate applied to every reading of one feed,
/// e.g. "temperature at or below 18 degrees".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPredicate {
    pub op: ThresholdOp,
    pub threshold: f64,
}

impl ThresholdPredicate {
    pub fn new(op: ThresholdOp, threshold: f64) -> Self {
        Self { op, threshold }
    }

    /// Evaluate the predicate against a decoded reading.
    pub fn eval(&self, reading: &Reading) -> bool {
        match self.op {
            ThresholdOp::Below => reading.value < self.threshold,
            ThresholdOp::AtOrBelow => reading.value <= self.threshold,
            ThresholdOp::Above => reading.value > self.threshold,
            ThresholdOp::AtOrAbove => reading.value >= self.threshold,
        }
    }
}

impl std::fmt::Display for ThresholdPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.op {
            ThresholdOp::Below => "<",
            ThresholdOp::AtOrBelow => "<=",
            ThresholdOp::Above => ">",
            ThresholdOp::AtOrAbove => ">=",
        };
        write!(f, "value {} {}", op, self.threshold)
    }
}

/// How per-feed conditions combine into one actuation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPolicy {
    /// True iff at least one present condition holds.  Absent feeds are
    /// excluded from consideration.
    Any,
    /// True iff every expected feed has a present, holding condition.
    /// Any absent feed fails the aggregate closed.
    All,
}

impl std::fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationPolicy::Any => write!(f, "any"),
            AggregationPolicy::All => write!(f, "all"),
        }
    }
}

/// The discrete command sent to an actuator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorCommand {
    On,
    Off,
}

impl ActuatorCommand {
    pub fn as_bool(self) -> bool {
        matches!(self, ActuatorCommand::On)
    }
}

impl From<bool> for ActuatorCommand {
    fn from(on: bool) -> Self {
        if on { ActuatorCommand::On } else { ActuatorCommand::Off }
    }
}

impl std::fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActuatorCommand::On => write!(f, "on"),
            ActuatorCommand::Off => write!(f, "off"),
        }
    }
}

/// Operator-facing event emitted by the control core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: ControlPayload,
}

/// Variants of data routed over the internal control event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlPayload {
    /// A watcher stored a different condition for its feed.
    ConditionChanged {
        feed: FeedHandle,
        condition: Condition,
    },
    /// A feed's underlying stream terminated; its condition was reset to
    /// [`Condition::Absent`].
    FeedLost { feed: FeedHandle },
    /// An actuator command was sent and confirmed.
    CommandSent {
        input: InputHandle,
        command: ActuatorCommand,
    },
    /// An actuator send failed or timed out; the transition will be retried.
    SendFailed { input: InputHandle, details: String },
}

/// Error type spanning feed decoding, subscription, and actuation.
#[derive(Error, Debug)]
pub enum TwinError {
    #[error("Decode failure: {0}")]
    Decode(String),

    #[error("Subscription to feed {feed} failed: {details}")]
    Subscribe { feed: String, details: String },

    #[error("Input send to {input} failed: {details}")]
    SendFailed { input: String, details: String },

    #[error("Discovery failed: {0}")]
    Discovery(String),
}
