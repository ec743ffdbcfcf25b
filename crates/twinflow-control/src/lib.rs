//! `twinflow-control` – the follower/synthesiser control core.
//!
//! Subscribes to N live feeds, keeps one boolean condition per feed up to
//! date, aggregates the conditions under an ANY/ALL policy, and drives a
//! debounced actuator command on state transitions only.
//!
//! # Modules
//!
//! - [`state`] – [`ConditionState`][state::ConditionState]: the shared
//!   feed → condition map (one writer per key, concurrent readers).
//! - [`events`] – [`ControlBus`][events::ControlBus]: broadcast channel of
//!   typed [`ControlEvent`][twinflow_types::ControlEvent]s; doubles as the
//!   control loop's change-notification tick source and the operator-facing
//!   record of feed losses and send failures.
//! - [`watcher`] – [`ConditionWatcher`][watcher::ConditionWatcher]: one task
//!   per feed applying the threshold predicate to every decoded reading.
//! - [`aggregator`] – [`ConditionAggregator`][aggregator::ConditionAggregator]:
//!   ANY/ALL evaluation over a state snapshot; ALL fails closed on absent
//!   feeds.
//! - [`actuator`] – [`ActuatorController`][actuator::ActuatorController]:
//!   owns the last commanded state, sends only on transitions, retries a
//!   failed transition by leaving the state untouched.
//! - [`liveness`] – [`FeedLiveness`][liveness::FeedLiveness]: per-feed
//!   last-reading deadlines so silent-but-open feeds are operator-visible.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: spawns
//!   the watchers and runs the tick → aggregate → apply cycle until
//!   cancelled.

pub mod actuator;
pub mod aggregator;
pub mod control_loop;
pub mod events;
pub mod liveness;
pub mod state;
pub mod watcher;

pub use actuator::{ActuatorController, CommandState};
pub use aggregator::ConditionAggregator;
pub use control_loop::{ControlLoop, ControlLoopConfig, FeedSpec, ShutdownHandle};
pub use events::ControlBus;
pub use liveness::FeedLiveness;
pub use state::ConditionState;
pub use watcher::ConditionWatcher;
