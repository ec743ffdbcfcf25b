//! [`Discovery`] – feed resolution seam.

use async_trait::async_trait;
use twinflow_types::{FeedHandle, TwinError};

/// Resolves the set of feeds the control loop should follow.
///
/// The real platform exposes a metadata search for this; its criteria and
/// response schema are platform-owned and out of scope here.  The control
/// core only needs the resolved handles, fixed for the lifetime of a run.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Resolve the feed set.  Called once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::Discovery`] if the search cannot be performed.
    async fn discover(&self) -> Result<Vec<FeedHandle>, TwinError>;
}
