//! Publish fan-out: deliver each tick's readings to every currently
//! subscribed node, in subscription-insertion order, best-effort.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use neu_core::ids::NodeId;
use neu_core::value::TagReading;

#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn trans_data(&self, publisher: NodeId, group_name: &str, readings: &[TagReading]);
}

/// Maps subscriber `NodeId` to its registered handler. Looked up once per
/// tick per subscriber; a missing entry is logged and skipped rather than
/// treated as a fatal error (a subscriber may unregister mid-flight).
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<NodeId, Arc<dyn Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node_id: NodeId, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.write().expect("subscriber registry poisoned").insert(node_id, subscriber);
    }

    pub fn unregister(&self, node_id: NodeId) {
        self.subscribers.write().expect("subscriber registry poisoned").remove(&node_id);
    }

    /// Walk `subscribers` in the order given (insertion order from
    /// `group.subscribers()`) and deliver to each; one subscriber's error
    /// never blocks delivery to the rest.
    pub async fn fan_out(&self, publisher: NodeId, group_name: &str, subscribers: &[NodeId], readings: &[TagReading]) {
        if readings.is_empty() {
            return;
        }
        let handlers: Vec<(NodeId, Arc<dyn Subscriber>)> = {
            let guard = self.subscribers.read().expect("subscriber registry poisoned");
            subscribers.iter().filter_map(|id| guard.get(id).map(|s| (*id, Arc::clone(s)))).collect()
        };
        for (subscriber_id, handler) in handlers {
            handler.trans_data(publisher, group_name, readings).await;
            tracing::trace!(%publisher, %subscriber_id, group = group_name, "delivered group tick to subscriber");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neu_core::error::ErrorCode;
    use neu_core::ids::TagId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSubscriber(Arc<AtomicUsize>);

    #[async_trait]
    impl Subscriber for CountingSubscriber {
        async fn trans_data(&self, _publisher: NodeId, _group_name: &str, readings: &[TagReading]) {
            self.0.fetch_add(readings.len(), Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fan_out_delivers_to_every_registered_subscriber_in_order() {
        let registry = SubscriberRegistry::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        registry.register(NodeId(2), Arc::new(CountingSubscriber(Arc::clone(&count_a))));
        registry.register(NodeId(3), Arc::new(CountingSubscriber(Arc::clone(&count_b))));

        let readings = vec![TagReading::error(TagId(1), "t1", 0, ErrorCode::ETimedOut)];
        registry.fan_out(NodeId(1), "g1", &[NodeId(2), NodeId(3)], &readings).await;

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fan_out_skips_unregistered_subscribers() {
        let registry = SubscriberRegistry::new();
        let readings = vec![TagReading::error(TagId(1), "t1", 0, ErrorCode::ETimedOut)];
        registry.fan_out(NodeId(1), "g1", &[NodeId(99)], &readings).await;
    }
}
