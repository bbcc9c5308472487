//! Group and Subscription entities: the sampling unit within a driver node and
//! the publisher→subscriber relation that fans its readings out.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, NeuError, Result};
use crate::ids::NodeId;

/// Minimum legal group tick, matching the scheduler's minimum timer period.
pub const MIN_INTERVAL_MS: u64 = 100;
/// Maximum legal group tick: 24 hours.
pub const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// A sampling unit within a driver node: a fixed set of tags polled together
/// on one timer, and the ordered set of nodes subscribed to its readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub node_id: NodeId,
    pub name: String,
    pub interval_ms: u64,
    pub tag_count: usize,
    /// Subscriber node ids, insertion-ordered (iteration order of a `BTreeSet`
    /// keyed by insertion sequence would lose FIFO order, so we keep a plain
    /// `Vec` for iteration and a `BTreeSet` alongside only for membership
    /// checks where that's the hot path — see `subpipe_set`/`subscribers`).
    subscribers: Vec<NodeId>,
    subscriber_set: BTreeSet<NodeId>,
}

impl Group {
    pub fn new(node_id: NodeId, name: impl Into<String>, interval_ms: u64) -> Result<Self> {
        validate_interval(interval_ms)?;
        Ok(Self {
            node_id,
            name: name.into(),
            interval_ms,
            tag_count: 0,
            subscribers: Vec::new(),
            subscriber_set: BTreeSet::new(),
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn set_interval_ms(&mut self, interval_ms: u64) -> Result<()> {
        validate_interval(interval_ms)?;
        self.interval_ms = interval_ms;
        Ok(())
    }

    /// Insertion-ordered view of `group.subpipe_set`, walked by fan-out.
    pub fn subscribers(&self) -> &[NodeId] {
        &self.subscribers
    }

    pub fn is_subscribed(&self, node_id: NodeId) -> bool {
        self.subscriber_set.contains(&node_id)
    }

    /// Appends `node_id` to the subscriber list if not already present.
    /// Idempotent: re-subscribing is a no-op, not an error.
    pub fn subscribe(&mut self, node_id: NodeId) {
        if self.subscriber_set.insert(node_id) {
            self.subscribers.push(node_id);
        }
    }

    pub fn unsubscribe(&mut self, node_id: NodeId) {
        if self.subscriber_set.remove(&node_id) {
            self.subscribers.retain(|n| *n != node_id);
        }
    }
}

fn validate_interval(interval_ms: u64) -> Result<()> {
    if interval_ms < MIN_INTERVAL_MS || interval_ms > MAX_INTERVAL_MS {
        return Err(NeuError::domain(
            ErrorCode::ParamIsWrong,
            format!("group interval_ms {interval_ms} out of range [{MIN_INTERVAL_MS}, {MAX_INTERVAL_MS}]"),
        ));
    }
    Ok(())
}

/// Relation `(publisher_node_id, subscriber_node_id, group_name)`. Invariant
/// I5: the publisher must be a driver node and the subscriber an app node —
/// enforced by the registry that constructs these, not by this type itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub publisher_node_id: NodeId,
    pub subscriber_node_id: NodeId,
    pub group_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_interval_below_minimum() {
        let err = Group::new(NodeId(1), "g1", 50).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParamIsWrong);
    }

    #[test]
    fn rejects_interval_above_maximum() {
        let err = Group::new(NodeId(1), "g1", MAX_INTERVAL_MS + 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParamIsWrong);
    }

    #[test]
    fn subscribers_preserve_insertion_order() {
        let mut g = Group::new(NodeId(1), "g1", 1000).unwrap();
        g.subscribe(NodeId(3));
        g.subscribe(NodeId(1));
        g.subscribe(NodeId(2));
        assert_eq!(g.subscribers(), &[NodeId(3), NodeId(1), NodeId(2)]);
    }

    #[test]
    fn resubscribe_is_idempotent() {
        let mut g = Group::new(NodeId(1), "g1", 1000).unwrap();
        g.subscribe(NodeId(3));
        g.subscribe(NodeId(3));
        assert_eq!(g.subscribers(), &[NodeId(3)]);
    }

    #[test]
    fn unsubscribe_removes_from_both_views() {
        let mut g = Group::new(NodeId(1), "g1", 1000).unwrap();
        g.subscribe(NodeId(3));
        g.unsubscribe(NodeId(3));
        assert!(g.subscribers().is_empty());
        assert!(!g.is_subscribed(NodeId(3)));
    }
}
