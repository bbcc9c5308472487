//! The driver plugin contract: what the scheduler calls into on every group
//! tick, and what it hands the plugin back in return (`GroupTickContext`).

use async_trait::async_trait;
use neu_core::error::ErrorCode;
use neu_core::ids::{NodeId, TagId};
use neu_core::value::{DValue, TagReading};

/// Per-tick scratch handed to the plugin: where `driver_update`,
/// `update_metric` and `write_response` calls land for this tick.
pub struct GroupTickContext {
    pub node_id: NodeId,
    pub group_name: String,
    readings: Vec<TagReading>,
    metric_updates: Vec<MetricUpdate>,
    write_responses: Vec<WriteResponse>,
}

#[derive(Debug, Clone)]
pub struct MetricUpdate {
    pub name: String,
    pub value: f64,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WriteResponse {
    pub req_token: u64,
    pub status: ErrorCode,
}

impl GroupTickContext {
    pub fn new(node_id: NodeId, group_name: impl Into<String>) -> Self {
        Self {
            node_id,
            group_name: group_name.into(),
            readings: Vec::new(),
            metric_updates: Vec::new(),
            write_responses: Vec::new(),
        }
    }

    /// `driver_update(node, group_name, tag_name, value)` — record a point result.
    pub fn driver_update(&mut self, tag_id: TagId, tag_name: impl Into<String>, timestamp_ms: i64, value: DValue) {
        self.readings.push(TagReading::ok(tag_id, tag_name, timestamp_ms, value));
    }

    pub fn driver_update_error(&mut self, tag_id: TagId, tag_name: impl Into<String>, timestamp_ms: i64, code: ErrorCode) {
        self.readings.push(TagReading::error(tag_id, tag_name, timestamp_ms, code));
    }

    /// `update_metric(node, metric_name, value, label)`.
    pub fn update_metric(&mut self, name: impl Into<String>, value: f64, label: Option<String>) {
        self.metric_updates.push(MetricUpdate { name: name.into(), value, label });
    }

    /// `write_response(node, req_token, status)`.
    pub fn write_response(&mut self, req_token: u64, status: ErrorCode) {
        self.write_responses.push(WriteResponse { req_token, status });
    }

    pub fn readings(&self) -> &[TagReading] {
        &self.readings
    }

    pub fn metric_updates(&self) -> &[MetricUpdate] {
        &self.metric_updates
    }

    pub fn write_responses(&self) -> &[WriteResponse] {
        &self.write_responses
    }

    pub fn has_any_error(&self) -> bool {
        self.readings.iter().any(|r| r.value.is_error())
    }
}

/// Implemented by a south-bound driver (e.g. Modbus, OPC UA). The scheduler
/// invokes `group_timer` once per configured interval, under the owning
/// node's cooperative lock.
#[async_trait]
pub trait DriverPlugin: Send + Sync {
    /// Perform device reads for every tag in this group tick, recording
    /// results into `ctx`. Returning `Err` signals an aggregate fault (the
    /// node transitions to disconnected); per-tag failures should instead be
    /// recorded via `driver_update_error` and `Ok(())` returned.
    async fn group_timer(&self, ctx: &mut GroupTickContext) -> neu_core::error::Result<()>;
}
