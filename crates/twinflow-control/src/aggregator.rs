//! [`ConditionAggregator`] – combines per-feed conditions into one verdict.

use twinflow_types::{AggregationPolicy, Condition, FeedHandle};

use crate::state::ConditionState;

/// Evaluates the configured [`AggregationPolicy`] over the expected feed set.
///
/// The expected set is fixed at discovery time; feeds that died mid-run keep
/// their slot and count as [`Condition::Absent`], which is what lets the ALL
/// policy fail closed when a feed silently disappears.
pub struct ConditionAggregator {
    policy: AggregationPolicy,
    expected: Vec<FeedHandle>,
}

impl ConditionAggregator {
    pub fn new(policy: AggregationPolicy, expected: Vec<FeedHandle>) -> Self {
        Self { policy, expected }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// The feed set this aggregator evaluates over.
    pub fn expected(&self) -> &[FeedHandle] {
        &self.expected
    }

    /// Evaluate the aggregate over a consistent snapshot of `state`.
    ///
    /// - `Any`: true iff at least one expected feed currently holds; absent
    ///   feeds are skipped.
    /// - `All`: true iff every expected feed is present and holds; a single
    ///   absent feed makes the aggregate false.
    ///
    /// An empty expected set evaluates to false under both policies: with no
    /// feeds there is no evidence to actuate on.
    pub fn evaluate(&self, state: &ConditionState) -> bool {
        if self.expected.is_empty() {
            return false;
        }
        let snapshot = state.snapshot();
        match self.policy {
            AggregationPolicy::Any => self
                .expected
                .iter()
                .any(|feed| snapshot.get(feed) == Some(&Condition::Holds)),
            AggregationPolicy::All => self
                .expected
                .iter()
                .all(|feed| snapshot.get(feed) == Some(&Condition::Holds)),
        }
    }
}
