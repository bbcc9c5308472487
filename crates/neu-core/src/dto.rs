//! REST/JSON DTOs that flow through the core unchanged. The wire vocabulary
//! itself (routes, auth headers, pagination) is out of scope; these are the
//! typed payload shapes named in the external-interfaces contract.
//!
//! Plain `serde`-derived structs, no hand-written (de)serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{NodeId, TagId};
use crate::tag::{AttributeSet, TagType};
use crate::value::DValue;

// ---- tags -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSpec {
    pub name: String,
    pub address: String,
    pub tag_type: TagType,
    pub attributes: AttributeSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTagsReq {
    pub node_id: NodeId,
    pub group_name: String,
    pub tags: Vec<TagSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTagsRes {
    pub added: Vec<TagId>,
    pub failed: Vec<TagFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagFailure {
    pub name: String,
    pub error_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelTagsReq {
    pub node_id: NodeId,
    pub group_name: String,
    pub tag_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelTagsRes {
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTagsReq {
    pub node_id: NodeId,
    pub group_name: String,
    pub tags: Vec<TagSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTagsRes {
    pub updated: Vec<String>,
    pub failed: Vec<TagFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTagsReq {
    pub node_id: NodeId,
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTagsRes {
    pub tags: Vec<TagSpec>,
}

// ---- read/write -------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReq {
    pub node_id: NodeId,
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRes {
    pub readings: Vec<TagValueDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagValueDto {
    pub tag_name: String,
    pub timestamp_ms: i64,
    pub value: Value,
}

impl TagValueDto {
    pub fn from_value(tag_name: impl Into<String>, timestamp_ms: i64, value: &DValue) -> Self {
        Self {
            tag_name: tag_name.into(),
            timestamp_ms,
            value: value.to_json(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReq {
    pub node_id: NodeId,
    pub group_name: String,
    pub tag_name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRes {
    pub error_code: i32,
}

// ---- groups -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddGroupReq {
    pub node_id: NodeId,
    pub name: String,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddGroupRes {
    pub error_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelGroupReq {
    pub node_id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGroupReq {
    pub node_id: NodeId,
    pub name: String,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetGroupRes {
    pub groups: Vec<GroupDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDto {
    pub name: String,
    pub interval_ms: u64,
    pub tag_count: usize,
}

// ---- subscriptions ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeReq {
    pub publisher_node_id: NodeId,
    pub subscriber_node_id: NodeId,
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeReq {
    pub publisher_node_id: NodeId,
    pub subscriber_node_id: NodeId,
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSubscriptionsRes {
    pub subscriptions: Vec<SubscriptionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDto {
    pub publisher_node_id: NodeId,
    pub subscriber_node_id: NodeId,
    pub group_name: String,
}

// ---- templates ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTemplateReq {
    pub name: String,
    pub plugin_name: String,
    pub groups: Vec<crate::template::TemplateGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantiateTemplateReq {
    pub template_name: String,
    pub node_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantiateTemplateRes {
    pub node_id: NodeId,
    pub groups_created: usize,
    pub tags_created: usize,
}

// ---- certs / auth / policy --------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCertReq {
    pub app_name: String,
    pub cert_pem: String,
    pub key_pem: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCertReq {
    pub app_name: String,
    pub fingerprint: String,
    pub cert_pem: String,
    pub trust_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicyReq {
    pub app_name: String,
    pub policy_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettingsReq {
    pub app_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUserReq {
    pub app_name: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_value_dto_base64_encodes_bytes() {
        let dto = TagValueDto::from_value("t1", 0, &DValue::Bytes(vec![1, 2, 3]));
        assert!(dto.value.is_string());
    }

    #[test]
    fn add_tags_req_round_trips_through_json() {
        let req = AddTagsReq {
            node_id: NodeId(1),
            group_name: "g1".into(),
            tags: vec![TagSpec {
                name: "t1".into(),
                address: "1!400001".into(),
                tag_type: TagType::U16,
                attributes: AttributeSet::read_only(),
            }],
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: AddTagsReq = serde_json::from_str(&json).unwrap();
        assert_eq!(back.group_name, "g1");
        assert_eq!(back.tags.len(), 1);
    }
}
