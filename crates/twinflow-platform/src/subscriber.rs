//! [`FeedSubscriber`] – live-feed subscription seam.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use twinflow_types::{FeedHandle, TwinError};

/// Raw payload bytes as delivered by the platform, one item per feed message.
///
/// The stream is lazy, unbounded, and non-restartable: no item for a long
/// time means the feed is quiet, not finished.  The stream ending means the
/// underlying transport terminated, which is fatal for that feed's watcher.
pub type RawPayloadStream = BoxStream<'static, Vec<u8>>;

/// Subscribes to a remote feed and yields its raw payloads.
///
/// # Contract
///
/// * `subscribe` may be called once per [`FeedHandle`]; the returned stream
///   is owned by exactly one watcher.
/// * Decoding of individual payloads is the caller's concern; the subscriber
///   never drops or reorders messages within a feed.
#[async_trait]
pub trait FeedSubscriber: Send + Sync {
    /// Open a live subscription to `feed`.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::Subscribe`] if the subscription cannot be
    /// established (unknown feed, transport refused).
    async fn subscribe(&self, feed: &FeedHandle) -> Result<RawPayloadStream, TwinError>;
}
