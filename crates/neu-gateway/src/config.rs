//! Environment-variable-driven bootstrap configuration, following the
//! teacher's `sem_os_server::main` pattern: `std::env::var(...).expect(...)`
//! for settings with no sane default, `.unwrap_or_else` for the rest.

pub struct GatewayConfig {
    /// Postgres connection string for the persistence layer (§4.5). Optional:
    /// a gateway may run with persistence disabled for a pure pass-through
    /// deployment, in which case node/group/tag state lives only in memory.
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// `host:port` of the northbound MQTT broker. Optional: a gateway with no
    /// MQTT node configured simply never opens a client.
    pub mqtt_broker_addr: Option<String>,
    pub mqtt_client_id: String,
    /// Topic prefix readings are published under: `{prefix}/{group_name}`.
    pub mqtt_topic_prefix: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("NEU_DATABASE_URL").ok(),
            bind_addr: std::env::var("NEU_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7000".into()),
            mqtt_broker_addr: std::env::var("NEU_MQTT_BROKER_ADDR").ok(),
            mqtt_client_id: std::env::var("NEU_MQTT_CLIENT_ID").unwrap_or_else(|_| "neu-gateway".into()),
            mqtt_topic_prefix: std::env::var("NEU_MQTT_TOPIC_PREFIX").unwrap_or_else(|_| "neuron".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        std::env::remove_var("NEU_BIND_ADDR");
        std::env::remove_var("NEU_MQTT_TOPIC_PREFIX");
        let cfg = GatewayConfig::from_env();
        assert_eq!(cfg.bind_addr, "0.0.0.0:7000");
        assert_eq!(cfg.mqtt_topic_prefix, "neuron");
    }
}
