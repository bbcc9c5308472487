//! Async MQTT (v3.1/3.1.1/v5) client with a bounded store-and-forward
//! cache that replays unsent QoS≥1 publishes after reconnection (§4.4).

pub mod cache;
pub mod client;
pub mod config;
pub mod topic;

pub use cache::{CacheConfig, CachedPublish, OutboxCache, PublishOutcome};
pub use client::{MqttClient, TraceContext};
pub use config::{MqttConfig, MqttVersion, TlsConfig};
pub use topic::{is_valid_topic_filter, is_valid_topic_name, topic_filter_is_match};
