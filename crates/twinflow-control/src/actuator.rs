//! [`ActuatorController`] – transition-only actuation with retry-by-non-update.
//!
//! The controller sits between the aggregate decision and the platform's
//! send-input capability.  It owns the last successfully commanded state and
//! sends only when the desired command differs from it.  A failed (or timed
//! out) send leaves the stored state untouched, so the next evaluation of
//! the same desired command retries the transition: at-least-once delivery
//! of state *transitions*, not of every evaluation tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};
use twinflow_platform::InputSender;
use twinflow_types::{ActuatorCommand, ControlPayload, InputHandle, TwinError};

use crate::events::ControlBus;

/// The last actuator command confirmed sent, or [`CommandState::Unset`]
/// before the first successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Unset,
    On,
    Off,
}

impl From<ActuatorCommand> for CommandState {
    fn from(command: ActuatorCommand) -> Self {
        match command {
            ActuatorCommand::On => CommandState::On,
            ActuatorCommand::Off => CommandState::Off,
        }
    }
}

/// Sole writer of the command state; invoked only from the control loop's
/// task, so it needs no internal locking.
pub struct ActuatorController {
    input: InputHandle,
    sender: Arc<dyn InputSender>,
    bus: ControlBus,
    state: CommandState,
    send_timeout: Duration,
}

impl ActuatorController {
    pub fn new(
        input: InputHandle,
        sender: Arc<dyn InputSender>,
        bus: ControlBus,
        send_timeout: Duration,
    ) -> Self {
        Self {
            input,
            sender,
            bus,
            state: CommandState::Unset,
            send_timeout,
        }
    }

    /// The last successfully commanded state.
    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Drive the actuator towards `desired`.
    ///
    /// Returns `Ok(false)` when `desired` matches the stored state (no
    /// external call, no observable effect) and `Ok(true)` when a command
    /// was sent and confirmed.  The stored state is updated only after a
    /// confirmed send.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::SendFailed`] when the platform rejects the
    /// command or the send exceeds the configured timeout.  The stored
    /// state is left unchanged so the transition is retried on the next
    /// call with the same `desired`.
    pub async fn apply(&mut self, desired: ActuatorCommand) -> Result<bool, TwinError> {
        if self.state == CommandState::from(desired) {
            return Ok(false);
        }

        let send = self.sender.send_input(&self.input, desired);
        let result = match timeout(self.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(TwinError::SendFailed {
                input: self.input.to_string(),
                details: format!("send timed out after {:?}", self.send_timeout),
            }),
        };

        match result {
            Ok(()) => {
                self.state = desired.into();
                info!(input = %self.input, command = %desired, "actuator command sent");
                self.bus.publish(ControlPayload::CommandSent {
                    input: self.input.clone(),
                    command: desired,
                });
                Ok(true)
            }
            Err(err) => {
                warn!(input = %self.input, command = %desired, error = %err,
                      "actuator send failed; transition will be retried");
                self.bus.publish(ControlPayload::SendFailed {
                    input: self.input.clone(),
                    details: err.to_string(),
                });
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use twinflow_platform::sim::RecordingInputSender;

    fn radiator() -> InputHandle {
        InputHandle::new("did:twin:radiator", "radiator_switch")
    }

    fn controller(sender: Arc<dyn InputSender>) -> ActuatorController {
        ActuatorController::new(radiator(), sender, ControlBus::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn first_apply_sends_from_unset() {
        let sender = Arc::new(RecordingInputSender::new());
        let mut ctrl = controller(sender.clone());

        assert_eq!(ctrl.state(), CommandState::Unset);
        assert!(ctrl.apply(ActuatorCommand::On).await.unwrap());
        assert_eq!(ctrl.state(), CommandState::On);
        assert_eq!(sender.send_count(), 1);
    }

    #[tokio::test]
    async fn repeated_apply_is_a_noop() {
        let sender = Arc::new(RecordingInputSender::new());
        let mut ctrl = controller(sender.clone());

        assert!(ctrl.apply(ActuatorCommand::On).await.unwrap());
        assert!(!ctrl.apply(ActuatorCommand::On).await.unwrap());
        assert!(!ctrl.apply(ActuatorCommand::On).await.unwrap());
        // Exactly one external call despite three evaluations.
        assert_eq!(sender.send_count(), 1);
    }

    #[tokio::test]
    async fn unset_to_off_is_a_real_transition() {
        let sender = Arc::new(RecordingInputSender::new());
        let mut ctrl = controller(sender.clone());

        assert!(ctrl.apply(ActuatorCommand::Off).await.unwrap());
        assert_eq!(ctrl.state(), CommandState::Off);
        assert_eq!(sender.sends()[0].1, ActuatorCommand::Off);
    }

    #[tokio::test]
    async fn failed_send_leaves_state_for_retry() {
        let sender = Arc::new(RecordingInputSender::new());
        sender.fail_next_sends(1);
        let mut ctrl = controller(sender.clone());

        let err = ctrl.apply(ActuatorCommand::On).await.unwrap_err();
        assert!(matches!(err, TwinError::SendFailed { .. }));
        // State untouched: the next apply(On) must not be deduplicated.
        assert_eq!(ctrl.state(), CommandState::Unset);

        assert!(ctrl.apply(ActuatorCommand::On).await.unwrap());
        assert_eq!(ctrl.state(), CommandState::On);
        assert_eq!(sender.send_count(), 1);
    }

    #[tokio::test]
    async fn failure_events_reach_the_bus() {
        let sender = Arc::new(RecordingInputSender::new());
        sender.fail_next_sends(1);
        let bus = ControlBus::default();
        let mut rx = bus.subscribe();
        let mut ctrl =
            ActuatorController::new(radiator(), sender, bus, Duration::from_secs(5));

        let _ = ctrl.apply(ActuatorCommand::On).await;

        let event = rx.try_recv().expect("failure event should be published");
        assert!(matches!(event.payload, ControlPayload::SendFailed { .. }));
    }

    struct HangingSender;

    #[async_trait]
    impl InputSender for HangingSender {
        async fn send_input(
            &self,
            _input: &InputHandle,
            _command: ActuatorCommand,
        ) -> Result<(), TwinError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn hung_send_times_out_and_retries_later() {
        let mut ctrl = ActuatorController::new(
            radiator(),
            Arc::new(HangingSender),
            ControlBus::default(),
            Duration::from_millis(10),
        );

        let err = ctrl.apply(ActuatorCommand::On).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(ctrl.state(), CommandState::Unset);
    }
}
