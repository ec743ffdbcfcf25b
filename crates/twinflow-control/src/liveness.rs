//! [`FeedLiveness`] – per-feed silence detection.
//!
//! A feed whose stream is still open but has stopped producing readings is
//! indistinguishable, from the aggregate's point of view, from one that is
//! merely steady.  Watchers mark their feed on every reading; the control
//! loop asks for the set of feeds whose last reading is older than the
//! configured deadline and reports them to the operator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use twinflow_types::FeedHandle;

/// Tracks the last-reading instant of every registered feed.  Cheaply
/// clonable; all clones share the same underlying table.
#[derive(Clone)]
pub struct FeedLiveness {
    inner: Arc<RwLock<HashMap<FeedHandle, Instant>>>,
    deadline: Duration,
}

impl FeedLiveness {
    /// Create a tracker that considers a feed stale once `deadline` has
    /// passed since its last reading.
    pub fn new(deadline: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            deadline,
        }
    }

    /// Register `feed`, starting its clock at now.
    pub fn register(&self, feed: &FeedHandle) {
        self.inner
            .write()
            .expect("liveness table lock poisoned")
            .insert(feed.clone(), Instant::now());
    }

    /// Record a reading for `feed`, resetting its deadline.  No-ops for
    /// unregistered feeds.
    pub fn mark(&self, feed: &FeedHandle) {
        if let Some(entry) = self
            .inner
            .write()
            .expect("liveness table lock poisoned")
            .get_mut(feed)
        {
            *entry = Instant::now();
        }
    }

    /// Stop tracking `feed` (its stream terminated; silence is expected).
    pub fn unregister(&self, feed: &FeedHandle) {
        self.inner
            .write()
            .expect("liveness table lock poisoned")
            .remove(feed);
    }

    /// Feeds whose last reading is older than the deadline.  Order is
    /// unspecified.
    pub fn stale(&self) -> Vec<FeedHandle> {
        self.inner
            .read()
            .expect("liveness table lock poisoned")
            .iter()
            .filter(|(_, last)| last.elapsed() > self.deadline)
            .map(|(feed, _)| feed.clone())
            .collect()
    }
}
