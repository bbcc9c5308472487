//! Per-node counters/gauges and the pull-based process-wide snapshot.
//!
//! Grounded in the original's `plugins/monitor/metric_handle.c`: gauges are
//! computed on demand by `MetricsRegistry::snapshot()`, not pushed eagerly to
//! a collector. The ambient `GET /metrics` endpoint calls `snapshot()` once
//! per request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::node::{LinkState, NodeType, RunningState};

/// Per-node counters and gauges. Cheap to update from the scheduler's hot
/// path; no locking beyond the registry lookup that hands out the `Arc`.
#[derive(Debug, Default)]
pub struct NodeMetrics {
    pub last_rtt_ms: AtomicI64,
    pub tag_reads_total: AtomicU64,
    pub tag_errors_total: AtomicU64,
    pub send_bytes: AtomicU64,
    pub recv_bytes: AtomicU64,
    /// MQTT store-and-forward depth; zero for driver nodes.
    pub cached_msgs: AtomicU64,
}

impl NodeMetrics {
    pub fn set_last_rtt_ms(&self, rtt_ms: i64) {
        self.last_rtt_ms.store(rtt_ms, Ordering::Relaxed);
    }

    pub fn record_tag_read(&self, errored: bool) {
        self.tag_reads_total.fetch_add(1, Ordering::Relaxed);
        if errored {
            self.tag_errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_send_bytes(&self, n: u64) {
        self.send_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_recv_bytes(&self, n: u64) {
        self.recv_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_cached_msgs(&self, n: u64) {
        self.cached_msgs.store(n, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetricsSnapshot {
    pub node_id: NodeId,
    pub last_rtt_ms: i64,
    pub tag_reads_total: u64,
    pub tag_errors_total: u64,
    pub send_bytes: u64,
    pub recv_bytes: u64,
    pub cached_msgs: u64,
}

/// Process-wide gauges, computed fresh on every `snapshot()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub core_dumped: bool,
    pub uptime_seconds: u64,
    pub north_total_nodes: u64,
    pub north_running_nodes: u64,
    pub north_disconnected_nodes: u64,
    pub south_total_nodes: u64,
    pub south_running_nodes: u64,
    pub south_disconnected_nodes: u64,
    pub nodes: Vec<NodeMetricsSnapshot>,
}

/// Minimal per-node facts the snapshot needs from the registry; decoupled
/// from `neu_core::node::Node` so callers can pass a borrowed view instead of
/// cloning full node records on every scrape.
pub struct NodeSummary {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub running_state: RunningState,
    pub link_state: LinkState,
}

pub struct MetricsRegistry {
    per_node: RwLock<HashMap<NodeId, Arc<NodeMetrics>>>,
    started_at: Instant,
    core_dumped: std::sync::atomic::AtomicBool,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            per_node: RwLock::new(HashMap::new()),
            started_at: Instant::now(),
            core_dumped: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Get-or-create the counters for `node_id`.
    pub fn node(&self, node_id: NodeId) -> Arc<NodeMetrics> {
        if let Some(existing) = self.per_node.read().expect("metrics registry poisoned").get(&node_id) {
            return Arc::clone(existing);
        }
        let mut guard = self.per_node.write().expect("metrics registry poisoned");
        Arc::clone(guard.entry(node_id).or_insert_with(|| Arc::new(NodeMetrics::default())))
    }

    pub fn remove_node(&self, node_id: NodeId) {
        self.per_node.write().expect("metrics registry poisoned").remove(&node_id);
    }

    pub fn mark_core_dumped(&self) {
        self.core_dumped.store(true, Ordering::Relaxed);
    }

    /// Compute the full process snapshot. `nodes` is the current registry
    /// view; aggregates are derived here rather than tracked incrementally so
    /// they can never drift from the node registry's actual state.
    pub fn snapshot(&self, nodes: &[NodeSummary]) -> ProcessSnapshot {
        let per_node = self.per_node.read().expect("metrics registry poisoned");

        let mut north_total = 0u64;
        let mut north_running = 0u64;
        let mut north_disconnected = 0u64;
        let mut south_total = 0u64;
        let mut south_running = 0u64;
        let mut south_disconnected = 0u64;

        for n in nodes {
            let (total, running, disconnected) = match n.node_type {
                NodeType::App => (&mut north_total, &mut north_running, &mut north_disconnected),
                NodeType::Driver => (&mut south_total, &mut south_running, &mut south_disconnected),
                NodeType::System => continue,
            };
            *total += 1;
            if n.running_state == RunningState::Running {
                *running += 1;
            }
            if n.link_state == LinkState::Disconnected {
                *disconnected += 1;
            }
        }

        let snapshots = nodes
            .iter()
            .map(|n| {
                let m = per_node.get(&n.node_id);
                NodeMetricsSnapshot {
                    node_id: n.node_id,
                    last_rtt_ms: m.map(|m| m.last_rtt_ms.load(Ordering::Relaxed)).unwrap_or(0),
                    tag_reads_total: m.map(|m| m.tag_reads_total.load(Ordering::Relaxed)).unwrap_or(0),
                    tag_errors_total: m.map(|m| m.tag_errors_total.load(Ordering::Relaxed)).unwrap_or(0),
                    send_bytes: m.map(|m| m.send_bytes.load(Ordering::Relaxed)).unwrap_or(0),
                    recv_bytes: m.map(|m| m.recv_bytes.load(Ordering::Relaxed)).unwrap_or(0),
                    cached_msgs: m.map(|m| m.cached_msgs.load(Ordering::Relaxed)).unwrap_or(0),
                }
            })
            .collect();

        ProcessSnapshot {
            core_dumped: self.core_dumped.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            north_total_nodes: north_total,
            north_running_nodes: north_running,
            north_disconnected_nodes: north_disconnected,
            south_total_nodes: south_total,
            south_running_nodes: south_running,
            south_disconnected_nodes: south_disconnected,
            nodes: snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_metrics_are_created_on_first_access_and_reused() {
        let registry = MetricsRegistry::new();
        let a = registry.node(NodeId(1));
        a.record_tag_read(false);
        let b = registry.node(NodeId(1));
        assert_eq!(b.tag_reads_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn snapshot_aggregates_by_node_type_and_state() {
        let registry = MetricsRegistry::new();
        registry.node(NodeId(1)).record_tag_read(true);

        let nodes = vec![
            NodeSummary {
                node_id: NodeId(1),
                node_type: NodeType::Driver,
                running_state: RunningState::Running,
                link_state: LinkState::Connected,
            },
            NodeSummary {
                node_id: NodeId(2),
                node_type: NodeType::App,
                running_state: RunningState::Init,
                link_state: LinkState::Disconnected,
            },
        ];
        let snap = registry.snapshot(&nodes);
        assert_eq!(snap.south_total_nodes, 1);
        assert_eq!(snap.south_running_nodes, 1);
        assert_eq!(snap.north_total_nodes, 1);
        assert_eq!(snap.north_disconnected_nodes, 1);
        assert_eq!(snap.nodes[0].tag_reads_total, 1);
        assert_eq!(snap.nodes[0].tag_errors_total, 1);
    }

    #[test]
    fn removed_node_is_dropped_from_registry_but_snapshot_falls_back_to_zero() {
        let registry = MetricsRegistry::new();
        registry.node(NodeId(1)).record_tag_read(false);
        registry.remove_node(NodeId(1));
        let nodes = vec![NodeSummary {
            node_id: NodeId(1),
            node_type: NodeType::Driver,
            running_state: RunningState::Stopped,
            link_state: LinkState::Disconnected,
        }];
        let snap = registry.snapshot(&nodes);
        assert_eq!(snap.nodes[0].tag_reads_total, 0);
    }
}
