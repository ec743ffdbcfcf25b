//! [`ControlLoop`] – the tick → aggregate → apply orchestrator.
//!
//! Spawns one [`ConditionWatcher`] per discovered feed, then reacts to
//! condition-change notifications from the [`ControlBus`], with a fixed
//! fallback interval that bounds actuation latency (and drives retries of
//! failed sends) even if a notification is lost to channel lag.
//!
//! Shutdown is cooperative: signalling the [`ShutdownHandle`] flips a watch
//! channel that every watcher selects on.  The loop waits a bounded grace
//! period for its watchers and exits **without sending a final off
//! command**; callers that need a parked actuator must command it
//! themselves after `run` returns.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{info, warn};
use twinflow_platform::{FeedSubscriber, InputSender};
use twinflow_types::{
    ActuatorCommand, AggregationPolicy, ControlPayload, FeedHandle, InputHandle,
    ThresholdPredicate, TwinError,
};

use crate::actuator::{ActuatorController, CommandState};
use crate::aggregator::ConditionAggregator;
use crate::events::ControlBus;
use crate::liveness::FeedLiveness;
use crate::state::ConditionState;
use crate::watcher::ConditionWatcher;

/// How long the loop waits for its watchers to observe the shutdown signal.
const WATCHER_STOP_GRACE: Duration = Duration::from_secs(5);

/// One feed to follow: its handle plus the per-watcher decode label and
/// threshold predicate.
#[derive(Debug, Clone)]
pub struct FeedSpec {
    pub handle: FeedHandle,
    /// The value label the feed publishes under, e.g. "sensor_reading".
    pub label: String,
    pub predicate: ThresholdPredicate,
}

/// Configuration bundle for [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// How per-feed conditions combine into the actuation decision.
    pub policy: AggregationPolicy,
    /// The actuator input to command.
    pub input: InputHandle,
    /// Fallback tick interval; bounds actuation latency when a change
    /// notification is missed and paces send retries.
    pub tick_interval: Duration,
    /// Upper bound on a single send-input call.
    pub send_timeout: Duration,
    /// Silence period after which a feed is reported as gone quiet.
    pub stale_after: Duration,
}

impl ControlLoopConfig {
    pub fn new(policy: AggregationPolicy, input: InputHandle) -> Self {
        Self {
            policy,
            input,
            tick_interval: Duration::from_millis(250),
            send_timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(30),
        }
    }
}

/// Cheaply clonable handle that requests cooperative shutdown of a running
/// [`ControlLoop`] and all its watchers.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request shutdown.  Idempotent; safe to call from a signal handler
    /// thread.
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }
}

/// The control orchestrator.  Owns the shared condition state, the
/// aggregator, and the actuator controller.
pub struct ControlLoop {
    specs: Vec<FeedSpec>,
    config: ControlLoopConfig,
    state: ConditionState,
    bus: ControlBus,
    liveness: FeedLiveness,
    aggregator: ConditionAggregator,
    controller: ActuatorController,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ControlLoop {
    /// Build a loop following `specs`, actuating through `sender`.
    pub fn new(specs: Vec<FeedSpec>, config: ControlLoopConfig, sender: Arc<dyn InputSender>) -> Self {
        let bus = ControlBus::default();
        let state = ConditionState::new();
        let liveness = FeedLiveness::new(config.stale_after);
        let expected = specs.iter().map(|spec| spec.handle.clone()).collect();
        let aggregator = ConditionAggregator::new(config.policy, expected);
        let controller = ActuatorController::new(
            config.input.clone(),
            sender,
            bus.clone(),
            config.send_timeout,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            specs,
            config,
            state,
            bus,
            liveness,
            aggregator,
            controller,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Clone of the control event channel, for operator tooling.
    pub fn bus(&self) -> ControlBus {
        self.bus.clone()
    }

    /// Handle used to request cooperative shutdown from another task or a
    /// signal handler.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Run until cancelled.
    ///
    /// Subscribes every configured feed, spawns its watcher, then drives the
    /// tick → aggregate → apply cycle.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::Subscribe`] if any feed subscription cannot be
    /// established at startup.  Runtime feed losses and send failures are
    /// not errors here; they are logged, published on the bus, and handled
    /// by the absent-condition and retry rules.
    pub async fn run(mut self, subscriber: Arc<dyn FeedSubscriber>) -> Result<(), TwinError> {
        // Subscribe to our own bus before the watchers start so no change
        // notification can slip past.
        let mut events = self.bus.subscribe();

        let mut watchers = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let stream = match subscriber.subscribe(&spec.handle).await {
                Ok(stream) => stream,
                Err(err) => {
                    // Tear down anything already spawned before bailing.
                    let _ = self.shutdown_tx.send(true);
                    return Err(err);
                }
            };
            let watcher = ConditionWatcher::new(
                spec.handle.clone(),
                spec.label.clone(),
                spec.predicate,
                self.state.clone(),
                self.bus.clone(),
                self.liveness.clone(),
            );
            watchers.push(watcher.spawn(stream, self.shutdown_rx.clone()));
        }

        info!(
            feeds = self.specs.len(),
            policy = %self.config.policy,
            input = %self.config.input,
            "control loop started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown_rx.clone();
        let mut reported_stale: HashSet<FeedHandle> = HashSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => match event.payload {
                        ControlPayload::ConditionChanged { .. }
                        | ControlPayload::FeedLost { .. } => {
                            self.evaluate_and_apply().await;
                        }
                        // Our own actuation records; nothing to react to.
                        ControlPayload::CommandSent { .. }
                        | ControlPayload::SendFailed { .. } => {}
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Notifications were dropped; the state map is still
                        // authoritative, so re-evaluate unconditionally.
                        warn!(lagged_by = n, "control loop fell behind on events");
                        self.evaluate_and_apply().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = interval.tick() => {
                    self.evaluate_and_apply().await;
                    self.report_stale(&mut reported_stale);
                }
            }
        }

        // Cooperative teardown: signal every watcher and give it a bounded
        // grace period.  Deliberately no final off command (see module docs).
        let _ = self.shutdown_tx.send(true);
        for watcher in watchers {
            if timeout(WATCHER_STOP_GRACE, watcher).await.is_err() {
                warn!("watcher did not stop within the grace period");
            }
        }
        info!("control loop stopped");
        Ok(())
    }

    /// One evaluation cycle: aggregate the condition map and drive the
    /// actuator towards the result.
    async fn evaluate_and_apply(&mut self) {
        let active = self.aggregator.evaluate(&self.state);
        let desired = ActuatorCommand::from(active);

        // Never commanded anything yet: a false aggregate has nothing to
        // turn off, so Unset -> Off stays un-actuated.
        if desired == ActuatorCommand::Off && self.controller.state() == CommandState::Unset {
            return;
        }

        // Failures are already logged and published by the controller; the
        // untouched command state makes the next tick retry the transition.
        let _ = self.controller.apply(desired).await;
    }

    /// Warn once per feed when it crosses the staleness deadline.
    fn report_stale(&self, reported: &mut HashSet<FeedHandle>) {
        let stale: HashSet<FeedHandle> = self.liveness.stale().into_iter().collect();
        for feed in stale.difference(reported) {
            warn!(%feed, stale_after = ?self.config.stale_after, "feed has gone quiet");
        }
        *reported = stale;
    }
}
