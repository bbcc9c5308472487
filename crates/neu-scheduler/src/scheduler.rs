//! Ties one timer per `(node, group)` to the driver plugin invocation and
//! the subscriber fan-out — the realization of §4.3's algorithm.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use neu_core::error::{ErrorCode, NeuError, Result};
use neu_core::ids::NodeId;
use neu_core::metrics::MetricsRegistry;
use neu_core::node::LinkState;
use neu_reactor::{Reactor, TimerHandle, TimerMode};

use crate::driver::{DriverPlugin, GroupTickContext};
use crate::fanout::SubscriberRegistry;
use crate::registry::NodeRegistry;

type GroupKey = (NodeId, String);

/// Owns the live per-group timers. One instance per running gateway; it
/// does not own the `Reactor`, `NodeRegistry`, `SubscriberRegistry` or
/// `MetricsRegistry` it schedules against — those are handed in by the
/// caller (the `neu-gateway` binary) as `Arc`s, per the `SystemContext`
/// discipline of passing shared state explicitly rather than reaching for
/// a global.
pub struct GroupScheduler {
    reactor: Arc<Reactor>,
    registry: Arc<NodeRegistry>,
    subscribers: Arc<SubscriberRegistry>,
    metrics: Arc<MetricsRegistry>,
    timers: Mutex<HashMap<GroupKey, TimerHandle>>,
}

impl GroupScheduler {
    pub fn new(
        reactor: Arc<Reactor>,
        registry: Arc<NodeRegistry>,
        subscribers: Arc<SubscriberRegistry>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            reactor,
            registry,
            subscribers,
            metrics,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Arm the group's timer at its configured interval. One call per group
    /// per running driver node; starting an already-running group is
    /// rejected rather than silently replacing the timer.
    pub fn start_group(&self, node_id: NodeId, group_name: &str, plugin: Arc<dyn DriverPlugin>, mode: TimerMode) -> Result<()> {
        let key = (node_id, group_name.to_string());
        if self.timers.lock().expect("scheduler timers poisoned").contains_key(&key) {
            return Err(NeuError::domain(ErrorCode::EBusy, format!("group '{group_name}' is already scheduled")));
        }
        let anchor = self.registry.group_anchor(node_id, group_name)?;
        let interval_ms = anchor.current().group.interval_ms;

        let registry = Arc::clone(&self.registry);
        let subscribers = Arc::clone(&self.subscribers);
        let metrics = Arc::clone(&self.metrics);
        let group_name_owned = group_name.to_string();

        let handle = self.reactor.add_timer_async(interval_ms, mode, move || {
            let registry = Arc::clone(&registry);
            let subscribers = Arc::clone(&subscribers);
            let metrics = Arc::clone(&metrics);
            let plugin = Arc::clone(&plugin);
            let group_name = group_name_owned.clone();
            async move {
                run_tick(node_id, group_name, registry, subscribers, metrics, plugin).await;
            }
        })?;

        self.timers.lock().expect("scheduler timers poisoned").insert(key, handle);
        Ok(())
    }

    /// Synchronous under cancellation (inherits that guarantee from
    /// `Reactor::del_timer`): once this returns, no further tick for this
    /// group will run.
    pub async fn stop_group(&self, node_id: NodeId, group_name: &str) -> Result<()> {
        let handle = self
            .timers
            .lock()
            .expect("scheduler timers poisoned")
            .remove(&(node_id, group_name.to_string()));
        match handle {
            Some(h) => self.reactor.del_timer(h).await,
            None => Err(NeuError::domain(ErrorCode::ENoEnt, format!("group '{group_name}' is not scheduled"))),
        }
    }

    pub fn is_running(&self, node_id: NodeId, group_name: &str) -> bool {
        self.timers
            .lock()
            .expect("scheduler timers poisoned")
            .contains_key(&(node_id, group_name.to_string()))
    }
}

/// One group tick: invoke the plugin under the current config generation,
/// record metrics, and fan the readings out. A plugin-reported aggregate
/// fault (not a per-tag error) transitions the node to disconnected but
/// never suspends the timer itself (§4.3 failure model).
async fn run_tick(
    node_id: NodeId,
    group_name: String,
    registry: Arc<NodeRegistry>,
    subscribers: Arc<SubscriberRegistry>,
    metrics: Arc<MetricsRegistry>,
    plugin: Arc<dyn DriverPlugin>,
) {
    let anchor = match registry.group_anchor(node_id, &group_name) {
        Ok(a) => a,
        Err(_) => {
            tracing::warn!(%node_id, group = %group_name, "tick fired for a group that no longer exists");
            return;
        }
    };
    let config = anchor.current();
    let node_metrics = metrics.node(node_id);

    let mut ctx = GroupTickContext::new(node_id, group_name.clone());
    let started = Instant::now();
    let result = plugin.group_timer(&mut ctx).await;
    node_metrics.set_last_rtt_ms(started.elapsed().as_millis() as i64);

    match result {
        Ok(()) => {
            let errored = ctx.has_any_error();
            node_metrics.record_tag_read(errored);
            subscribers.fan_out(node_id, &group_name, config.group.subscribers(), ctx.readings()).await;
        }
        Err(e) => {
            node_metrics.record_tag_read(true);
            tracing::warn!(%node_id, group = %group_name, error = %e, "aggregate fault from driver plugin; marking node disconnected");
            if let Ok(mut node) = registry.get_node(node_id) {
                node.link_state = LinkState::Disconnected;
                let _ = registry.update_node(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::Subscriber;
    use async_trait::async_trait;
    use neu_core::ids::TagId;
    use neu_core::node::{Node, NodeType};
    use neu_core::value::DValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedPlugin {
        ticks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DriverPlugin for FixedPlugin {
        async fn group_timer(&self, ctx: &mut GroupTickContext) -> neu_core::error::Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            ctx.driver_update(TagId(1), "t1", 0, DValue::U16(0x1234));
            Ok(())
        }
    }

    struct FailingPlugin;

    #[async_trait]
    impl DriverPlugin for FailingPlugin {
        async fn group_timer(&self, _ctx: &mut GroupTickContext) -> neu_core::error::Result<()> {
            Err(NeuError::domain(ErrorCode::EInternal, "device unreachable"))
        }
    }

    struct CountingSubscriber(Arc<AtomicUsize>);

    #[async_trait]
    impl Subscriber for CountingSubscriber {
        async fn trans_data(&self, _publisher: NodeId, _group_name: &str, readings: &[neu_core::value::TagReading]) {
            self.0.fetch_add(readings.len(), Ordering::SeqCst);
        }
    }

    fn wire() -> (Arc<Reactor>, Arc<NodeRegistry>, Arc<SubscriberRegistry>, Arc<MetricsRegistry>) {
        (
            Arc::new(Reactor::new()),
            Arc::new(NodeRegistry::new()),
            Arc::new(SubscriberRegistry::new()),
            Arc::new(MetricsRegistry::new()),
        )
    }

    #[tokio::test]
    async fn group_ticks_roughly_matches_interval_over_a_window() {
        let (reactor, registry, subs, metrics) = wire();
        registry.add_node(Node::new(NodeId(1), "mb1", NodeType::Driver, "modbus-tcp")).unwrap();
        registry.add_group(NodeId(1), neu_core::group::Group::new(NodeId(1), "g1", 20).unwrap()).unwrap();

        let scheduler = GroupScheduler::new(reactor, registry, subs, metrics);
        let ticks = Arc::new(AtomicUsize::new(0));
        let plugin = Arc::new(FixedPlugin { ticks: Arc::clone(&ticks) });
        scheduler.start_group(NodeId(1), "g1", plugin, TimerMode::Blocking).unwrap();

        tokio::time::sleep(Duration::from_millis(210)).await;
        scheduler.stop_group(NodeId(1), "g1").await.unwrap();
        let count = ticks.load(Ordering::SeqCst);
        assert!((8..=11).contains(&count), "ticked {count} times");
    }

    #[tokio::test]
    async fn readings_are_fanned_out_to_subscribers_each_tick() {
        let (reactor, registry, subs, metrics) = wire();
        registry.add_node(Node::new(NodeId(1), "mb1", NodeType::Driver, "modbus-tcp")).unwrap();
        registry.add_node(Node::new(NodeId(2), "mqtt1", NodeType::App, "mqtt")).unwrap();
        registry.add_group(NodeId(1), neu_core::group::Group::new(NodeId(1), "g1", 20).unwrap()).unwrap();
        registry.subscribe(NodeId(1), "g1", NodeId(2)).unwrap();

        let delivered = Arc::new(AtomicUsize::new(0));
        subs.register(NodeId(2), Arc::new(CountingSubscriber(Arc::clone(&delivered))));

        let scheduler = GroupScheduler::new(reactor, registry, subs, metrics);
        let ticks = Arc::new(AtomicUsize::new(0));
        let plugin = Arc::new(FixedPlugin { ticks });
        scheduler.start_group(NodeId(1), "g1", plugin, TimerMode::Blocking).unwrap();

        tokio::time::sleep(Duration::from_millis(70)).await;
        scheduler.stop_group(NodeId(1), "g1").await.unwrap();
        assert!(delivered.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn aggregate_fault_transitions_node_to_disconnected() {
        let (reactor, registry, subs, metrics) = wire();
        registry.add_node(Node::new(NodeId(1), "mb1", NodeType::Driver, "modbus-tcp")).unwrap();
        registry.add_group(NodeId(1), neu_core::group::Group::new(NodeId(1), "g1", 20).unwrap()).unwrap();

        let scheduler = GroupScheduler::new(reactor, Arc::clone(&registry), subs, metrics);
        scheduler.start_group(NodeId(1), "g1", Arc::new(FailingPlugin), TimerMode::Blocking).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        scheduler.stop_group(NodeId(1), "g1").await.unwrap();
        assert_eq!(registry.get_node(NodeId(1)).unwrap().link_state, LinkState::Disconnected);
    }

    #[tokio::test]
    async fn starting_an_already_running_group_is_rejected() {
        let (reactor, registry, subs, metrics) = wire();
        registry.add_node(Node::new(NodeId(1), "mb1", NodeType::Driver, "modbus-tcp")).unwrap();
        registry.add_group(NodeId(1), neu_core::group::Group::new(NodeId(1), "g1", 100).unwrap()).unwrap();

        let scheduler = GroupScheduler::new(reactor, registry, subs, metrics);
        let ticks = Arc::new(AtomicUsize::new(0));
        scheduler
            .start_group(NodeId(1), "g1", Arc::new(FixedPlugin { ticks: Arc::clone(&ticks) }), TimerMode::Blocking)
            .unwrap();
        let err = scheduler
            .start_group(NodeId(1), "g1", Arc::new(FixedPlugin { ticks }), TimerMode::Blocking)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EBusy);
    }
}
