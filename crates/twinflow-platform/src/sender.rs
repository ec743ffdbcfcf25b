//! [`InputSender`] – directed input-message seam.

use async_trait::async_trait;
use twinflow_types::{ActuatorCommand, InputHandle, TwinError};

/// Sends a command to a remote twin's input channel.
///
/// Fire-and-confirm: `Ok(())` means the platform accepted the message,
/// `Err` means it did not.  Success or failure is the only contract the
/// control core depends on; delivery semantics beyond acceptance belong to
/// the platform.
#[async_trait]
pub trait InputSender: Send + Sync {
    /// Send `command` to `input`.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::SendFailed`] if the platform rejects the message
    /// or the transport fails.
    async fn send_input(
        &self,
        input: &InputHandle,
        command: ActuatorCommand,
    ) -> Result<(), TwinError>;
}
