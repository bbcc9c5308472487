//! The bounded store-and-forward cache: a strict-FIFO queue of unsent QoS≥1
//! publishes, capped both by byte size and item count, with oldest-first
//! eviction when either cap is exceeded (§4.4, invariant I6).

use std::collections::VecDeque;

use neu_core::metrics::NodeMetrics;
use std::sync::Arc;

/// What became of a cached publish, handed back to its caller's callback
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Broker acked the publish (or, for QoS 0, the socket write completed).
    Delivered,
    /// Evicted to make room for newer items before it could be sent.
    Evicted,
    /// The client closed with this item still queued.
    ClientClosed,
}

pub type PublishCallback = Box<dyn FnOnce(PublishOutcome) + Send>;

/// One queued outbound publish. `payload`/`topic` are owned copies (the
/// spec's "payload-dup, topic-dup") so the caller's buffers are free to
/// drop immediately after calling `publish`.
pub struct CachedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: u8,
    pub callback: Option<PublishCallback>,
}

impl CachedPublish {
    fn size_bytes(&self) -> usize {
        self.topic.len() + self.payload.len()
    }

    fn resolve(mut self, outcome: PublishOutcome) {
        if let Some(cb) = self.callback.take() {
            cb(outcome);
        }
    }
}

/// Mirrors §4.4's two caps: `mem_cap_bytes` and `item_cap`. Nothing here
/// touches disk; the spec treats disk spill as opportunistic and the
/// in-memory queue is the only representation this implementation keeps
/// (an item that doesn't fit is evicted, never partially persisted).
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub mem_cap_bytes: u64,
    pub item_cap: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 16 * 1024 * 1024,
            item_cap: 10_000,
        }
    }
}

/// Strict-FIFO bounded queue of unsent publishes. Guarded by whatever
/// mutex the owning client holds it behind; this type itself assumes
/// exclusive access per call.
pub struct OutboxCache {
    config: CacheConfig,
    items: VecDeque<CachedPublish>,
    bytes: u64,
    metrics: Option<Arc<NodeMetrics>>,
}

impl OutboxCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            items: VecDeque::new(),
            bytes: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<NodeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Enqueue a publish, evicting the oldest items first if needed to stay
    /// within both caps. An item larger than the entire cap evicts
    /// everything and is enqueued anyway — the cache always accepts the
    /// newest write rather than silently dropping it.
    pub fn push(&mut self, item: CachedPublish) {
        let incoming = item.size_bytes() as u64;
        while !self.items.is_empty()
            && (self.items.len() >= self.config.item_cap || self.bytes + incoming > self.config.mem_cap_bytes)
        {
            if let Some(evicted) = self.items.pop_front() {
                self.bytes -= evicted.size_bytes() as u64;
                evicted.resolve(PublishOutcome::Evicted);
            }
        }
        self.bytes += incoming;
        self.items.push_back(item);
        self.sync_gauge();
    }

    /// Look at (without removing) the head of the queue, for the cache-sync
    /// timer to attempt a republish.
    pub fn front(&self) -> Option<&CachedPublish> {
        self.items.front()
    }

    /// Remove the head after a successful republish.
    pub fn pop_delivered(&mut self) {
        if let Some(item) = self.items.pop_front() {
            self.bytes -= item.size_bytes() as u64;
            item.resolve(PublishOutcome::Delivered);
        }
        self.sync_gauge();
    }

    /// Drain everything, resolving callbacks as closed-without-delivery —
    /// used on `close()`.
    pub fn drain_closed(&mut self) {
        while let Some(item) = self.items.pop_front() {
            item.resolve(PublishOutcome::ClientClosed);
        }
        self.bytes = 0;
        self.sync_gauge();
    }

    fn sync_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_cached_msgs(self.items.len() as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(topic: &str, payload_len: usize) -> CachedPublish {
        CachedPublish {
            topic: topic.to_string(),
            payload: vec![0u8; payload_len],
            qos: 1,
            callback: None,
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let mut cache = OutboxCache::new(CacheConfig { mem_cap_bytes: 1024, item_cap: 10 });
        cache.push(item("a", 4));
        cache.push(item("b", 4));
        assert_eq!(cache.front().unwrap().topic, "a");
        cache.pop_delivered();
        assert_eq!(cache.front().unwrap().topic, "b");
    }

    #[test]
    fn item_cap_evicts_oldest() {
        let mut cache = OutboxCache::new(CacheConfig { mem_cap_bytes: 1024 * 1024, item_cap: 2 });
        let evicted = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&evicted);
        cache.push(CachedPublish {
            topic: "a".into(),
            payload: vec![],
            qos: 1,
            callback: Some(Box::new(move |outcome| {
                if outcome == PublishOutcome::Evicted {
                    e.fetch_add(1, Ordering::SeqCst);
                }
            })),
        });
        cache.push(item("b", 0));
        cache.push(item("c", 0));
        assert_eq!(cache.len(), 2);
        assert_eq!(evicted.load(Ordering::SeqCst), 1);
        assert_eq!(cache.front().unwrap().topic, "b");
    }

    #[test]
    fn mem_cap_evicts_oldest_by_bytes() {
        let mut cache = OutboxCache::new(CacheConfig { mem_cap_bytes: 20, item_cap: 100 });
        cache.push(item("t", 10));
        cache.push(item("t", 10));
        // third push needs 10 more bytes; cap is 20, so the oldest is evicted.
        cache.push(item("t", 10));
        assert_eq!(cache.len(), 2);
        assert!(cache.bytes() <= 20);
    }

    #[test]
    fn drain_closed_resolves_every_pending_callback() {
        let mut cache = OutboxCache::new(CacheConfig::default());
        let closed = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = Arc::clone(&closed);
            cache.push(CachedPublish {
                topic: "t".into(),
                payload: vec![],
                qos: 1,
                callback: Some(Box::new(move |outcome| {
                    if outcome == PublishOutcome::ClientClosed {
                        c.fetch_add(1, Ordering::SeqCst);
                    }
                })),
            });
        }
        cache.drain_closed();
        assert_eq!(closed.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }
}
