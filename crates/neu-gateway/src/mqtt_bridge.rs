//! Bridges the scheduler's publish fan-out (§4.6) to the MQTT client (§4.4):
//! a northbound app node whose `trans_data` serializes a group tick's
//! readings to JSON and hands them to `MqttClient::publish` at QoS 1,
//! the reliability level the store-and-forward cache exists to serve.

use std::sync::Arc;

use async_trait::async_trait;

use neu_core::dto::TagValueDto;
use neu_core::ids::NodeId;
use neu_core::value::TagReading;
use neu_mqtt::MqttClient;
use neu_scheduler::Subscriber;

/// One instance per MQTT app node subscribed to one or more groups.
/// `topic_prefix` is that node's configured publish root; the wire topic for
/// a given tick is `{topic_prefix}/{publisher_node_id}/{group_name}`.
pub struct MqttAppNode {
    client: Arc<MqttClient>,
    topic_prefix: String,
}

impl MqttAppNode {
    pub fn new(client: Arc<MqttClient>, topic_prefix: impl Into<String>) -> Self {
        Self {
            client,
            topic_prefix: topic_prefix.into(),
        }
    }

    fn topic(&self, publisher: NodeId, group_name: &str) -> String {
        format!("{}/{}/{}", self.topic_prefix, publisher, group_name)
    }
}

#[async_trait]
impl Subscriber for MqttAppNode {
    async fn trans_data(&self, publisher: NodeId, group_name: &str, readings: &[TagReading]) {
        let dtos: Vec<TagValueDto> = readings
            .iter()
            .map(|r| TagValueDto::from_value(&r.tag_name, r.timestamp_ms, &r.value))
            .collect();
        let payload = match serde_json::to_vec(&dtos) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(%publisher, group = group_name, error = %e, "failed to encode tick as JSON; dropping");
                return;
            }
        };
        let topic = self.topic(publisher, group_name);
        if let Err(e) = self.client.publish(1, topic, payload, None).await {
            tracing::warn!(%publisher, group = group_name, error = %e, "mqtt publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neu_core::ids::TagId;
    use neu_core::value::DValue;
    use neu_mqtt::MqttConfig;

    #[tokio::test]
    async fn topic_is_prefix_slash_node_slash_group() {
        let client = Arc::new(MqttClient::new(MqttConfig::new("bridge-test", "127.0.0.1", 18900)));
        let node = MqttAppNode::new(client, "neuron");
        assert_eq!(node.topic(NodeId(7), "g1"), "neuron/7/g1");
    }

    #[tokio::test]
    async fn trans_data_on_unopened_client_does_not_panic() {
        let client = Arc::new(MqttClient::new(MqttConfig::new("bridge-test2", "127.0.0.1", 18901)));
        let node = MqttAppNode::new(client, "neuron");
        let readings = vec![TagReading::ok(TagId(1), "t1", 0, DValue::U16(0x1234))];
        node.trans_data(NodeId(1), "g1", &readings).await;
    }
}
