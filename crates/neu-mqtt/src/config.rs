//! Client configuration: broker address, credentials, TLS material and the
//! cache/backoff knobs §4.4 pins down.

use std::time::Duration;

use crate::cache::CacheConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttVersion {
    V31,
    V311,
    V5,
}

#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub ca_pem: Option<Vec<u8>>,
    pub client_cert_pem: Option<Vec<u8>>,
    pub client_key_pem: Option<Vec<u8>>,
    pub key_passphrase: Option<String>,
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.ca_pem.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub version: MqttVersion,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: TlsConfig,
    pub keep_alive: Duration,
    /// Cache-sync cadence; clamped to §4.4's `[10 ms, 12 s]` range by
    /// [`MqttConfig::sync_interval`].
    pub sync_interval_ms: u64,
    pub cache: CacheConfig,
}

impl MqttConfig {
    pub const MIN_SYNC_INTERVAL_MS: u64 = 10;
    pub const MAX_SYNC_INTERVAL_MS: u64 = 12_000;
    pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 100;
    pub const MIN_RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
    pub const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(365 * 24 * 3600);

    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            client_id: client_id.into(),
            host: host.into(),
            port,
            version: MqttVersion::V311,
            username: None,
            password: None,
            tls: TlsConfig::default(),
            keep_alive: Duration::from_secs(60),
            sync_interval_ms: Self::DEFAULT_SYNC_INTERVAL_MS,
            cache: CacheConfig::default(),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.clamp(Self::MIN_SYNC_INTERVAL_MS, Self::MAX_SYNC_INTERVAL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_interval_clamps_to_spec_range() {
        let mut cfg = MqttConfig::new("c1", "localhost", 1883);
        cfg.sync_interval_ms = 1;
        assert_eq!(cfg.sync_interval(), Duration::from_millis(10));
        cfg.sync_interval_ms = 100_000;
        assert_eq!(cfg.sync_interval(), Duration::from_millis(12_000));
        cfg.sync_interval_ms = 250;
        assert_eq!(cfg.sync_interval(), Duration::from_millis(250));
    }
}
