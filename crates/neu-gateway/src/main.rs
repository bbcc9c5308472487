//! neu-gateway — the IIoT edge gateway binary.
//!
//! Reads config from env vars:
//!   NEU_DATABASE_URL      — Postgres connection string (optional; persistence
//!                           layer runs in-memory-only when unset)
//!   NEU_BIND_ADDR         — health/metrics listen address (default 0.0.0.0:7000)
//!   NEU_MQTT_BROKER_ADDR  — `host:port` of the northbound MQTT broker (optional)
//!   NEU_MQTT_CLIENT_ID    — MQTT client id (default "neu-gateway")
//!   NEU_MQTT_TOPIC_PREFIX — publish topic root (default "neuron")
//!
//! Wires the reactor, node/group registry, scheduler, MQTT client and
//! persistence pool, then serves the ambient health/metrics surface until a
//! SIGTERM/SIGINT triggers the same teardown order the original's
//! `sig_handler` walks: reactor close, MQTT client close, pool drop.

mod config;
mod mqtt_bridge;
mod routes;

use std::sync::Arc;

use config::GatewayConfig;
use mqtt_bridge::MqttAppNode;
use neu_core::ids::NodeId;
use neu_core::metrics::MetricsRegistry;
use neu_mqtt::{MqttClient, MqttConfig};
use neu_reactor::Reactor;
use neu_scheduler::{GroupScheduler, NodeRegistry, SubscriberRegistry};
use routes::AppState;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,neu_gateway=debug".into()),
        )
        .init();

    let config = GatewayConfig::from_env();

    let pool = match &config.database_url {
        Some(url) => match PgPoolOptions::new().max_connections(10).connect(url).await {
            Ok(pool) => {
                tracing::info!("connected to persistence database");
                Some(pool)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to persistence database; continuing with in-memory state only");
                None
            }
        },
        None => {
            tracing::warn!("NEU_DATABASE_URL not set; persistence layer disabled for this run");
            None
        }
    };
    // The persistence pool is consulted only on configuration-change events
    // (§4.5), never the scheduler's hot path; holding it here is enough to
    // keep it alive for whatever control-plane surface the REST collaborator
    // builds on top of this binary.
    let _pool = pool;

    let reactor = Arc::new(Reactor::new());
    let registry = Arc::new(NodeRegistry::new());
    let subscribers = Arc::new(SubscriberRegistry::new());
    let metrics = Arc::new(MetricsRegistry::new());

    if let Some(broker) = &config.mqtt_broker_addr {
        match open_mqtt_bridge(broker, &config, Arc::clone(&subscribers)).await {
            Ok(node_id) => tracing::info!(%node_id, "mqtt bridge node opened"),
            Err(e) => tracing::error!(error = %e, "failed to open mqtt bridge; northbound delivery disabled"),
        }
    } else {
        tracing::warn!("NEU_MQTT_BROKER_ADDR not set; no northbound MQTT node configured");
    }

    let scheduler = Arc::new(GroupScheduler::new(
        Arc::clone(&reactor),
        Arc::clone(&registry),
        Arc::clone(&subscribers),
        Arc::clone(&metrics),
    ));
    // Held for the process lifetime: driver plugins register their groups
    // against this scheduler as the (out-of-scope) plugin-loading
    // collaborator starts them.
    let _scheduler = scheduler;

    let app = routes::build_router(AppState {
        registry: Arc::clone(&registry),
        metrics: Arc::clone(&metrics),
    });

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {}: {e}", config.bind_addr));
    tracing::info!(addr = %config.bind_addr, "neu-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    reactor.close().await;
    tracing::info!("neu-gateway shut down cleanly");
}

/// Opens the northbound MQTT client and registers an app node (`NodeId(1)`,
/// reserved for the gateway's own bridge) as its subscriber-fan-out target.
async fn open_mqtt_bridge(
    broker_addr: &str,
    config: &GatewayConfig,
    subscribers: Arc<SubscriberRegistry>,
) -> neu_core::error::Result<NodeId> {
    let (host, port) = broker_addr
        .rsplit_once(':')
        .ok_or_else(|| neu_core::error::NeuError::domain(neu_core::error::ErrorCode::EAddrInval, "NEU_MQTT_BROKER_ADDR must be host:port"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| neu_core::error::NeuError::domain(neu_core::error::ErrorCode::EAddrInval, "NEU_MQTT_BROKER_ADDR port is not numeric"))?;

    let mqtt_config = MqttConfig::new(config.mqtt_client_id.clone(), host, port);
    let client = Arc::new(MqttClient::new(mqtt_config));
    client.open().await?;

    let node_id = NodeId(1);
    subscribers.register(node_id, Arc::new(MqttAppNode::new(Arc::clone(&client), config.mqtt_topic_prefix.clone())));
    Ok(node_id)
}

/// Waits for SIGTERM or SIGINT (ctrl-c), mirroring the original's
/// `sig_handler` registration for both signals.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
