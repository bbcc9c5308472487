//! In-memory node/group registry. Group config (tags + subscriber set) is
//! held behind a `GenerationAnchor` so the scheduler's hot path never blocks
//! on a config writer and never observes a torn read (I1-I6, §4.3).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use neu_core::anchor::GenerationAnchor;
use neu_core::error::{ErrorCode, NeuError, Result};
use neu_core::group::Group;
use neu_core::ids::NodeId;
use neu_core::node::{Node, NodeType};
use neu_core::tag::Tag;

/// One group's live configuration: its core `Group` record (interval,
/// subscriber set) plus the tags it polls each tick.
#[derive(Clone)]
pub struct GroupConfig {
    pub group: Group,
    pub tags: Vec<Tag>,
}

type GroupKey = (NodeId, String);

pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, Node>>,
    groups: RwLock<HashMap<GroupKey, Arc<GenerationAnchor<GroupConfig>>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// I1: no two nodes share a name.
    pub fn add_node(&self, node: Node) -> Result<()> {
        let mut nodes = self.nodes.write().expect("node registry poisoned");
        if nodes.values().any(|n| n.name == node.name) {
            return Err(NeuError::node_exist(&node.name));
        }
        nodes.insert(node.node_id, node);
        Ok(())
    }

    pub fn remove_node(&self, node_id: NodeId) -> Result<Node> {
        self.nodes
            .write()
            .expect("node registry poisoned")
            .remove(&node_id)
            .ok_or_else(|| NeuError::domain(ErrorCode::NodeNotExist, format!("node {node_id} does not exist")))
    }

    pub fn get_node(&self, node_id: NodeId) -> Result<Node> {
        self.nodes
            .read()
            .expect("node registry poisoned")
            .get(&node_id)
            .cloned()
            .ok_or_else(|| NeuError::domain(ErrorCode::NodeNotExist, format!("node {node_id} does not exist")))
    }

    pub fn update_node(&self, node: Node) -> Result<()> {
        let mut nodes = self.nodes.write().expect("node registry poisoned");
        if !nodes.contains_key(&node.node_id) {
            return Err(NeuError::domain(ErrorCode::NodeNotExist, format!("node {} does not exist", node.node_id)));
        }
        nodes.insert(node.node_id, node);
        Ok(())
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.nodes.read().expect("node registry poisoned").values().cloned().collect()
    }

    /// I2: no two groups share `(node_id, name)`.
    pub fn add_group(&self, node_id: NodeId, group: Group) -> Result<()> {
        let key = (node_id, group.name.clone());
        let mut groups = self.groups.write().expect("group registry poisoned");
        if groups.contains_key(&key) {
            return Err(NeuError::group_config_exist(&group.name));
        }
        groups.insert(key, Arc::new(GenerationAnchor::new(GroupConfig { group, tags: Vec::new() })));
        Ok(())
    }

    pub fn remove_group(&self, node_id: NodeId, name: &str) -> Result<()> {
        self.groups
            .write()
            .expect("group registry poisoned")
            .remove(&(node_id, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| NeuError::group_config_not_exist(name))
    }

    /// The anchor itself, so callers (the group runtime) can hold a cheap
    /// `Arc` across ticks without re-locking the registry map each time.
    pub fn group_anchor(&self, node_id: NodeId, name: &str) -> Result<Arc<GenerationAnchor<GroupConfig>>> {
        self.groups
            .read()
            .expect("group registry poisoned")
            .get(&(node_id, name.to_string()))
            .cloned()
            .ok_or_else(|| NeuError::group_config_not_exist(name))
    }

    /// Publish a new generation for the group with `tags` replaced/extended
    /// and the same subscriber set carried forward.
    pub fn set_tags(&self, node_id: NodeId, name: &str, tags: Vec<Tag>) -> Result<()> {
        let anchor = self.group_anchor(node_id, name)?;
        let mut next = (*anchor.current()).clone();
        next.group.tag_count = tags.len();
        next.tags = tags;
        anchor.publish(next);
        Ok(())
    }

    /// I5: the publisher must be a driver node and the subscriber an app node.
    pub fn subscribe(&self, publisher: NodeId, group_name: &str, subscriber: NodeId) -> Result<()> {
        let publisher_node = self.get_node(publisher)?;
        let subscriber_node = self.get_node(subscriber)?;
        if publisher_node.node_type != NodeType::Driver || subscriber_node.node_type != NodeType::App {
            return Err(NeuError::node_type_invalid(format!(
                "subscription publisher '{}' must be a driver node and subscriber '{}' must be an app node",
                publisher_node.name, subscriber_node.name
            )));
        }

        let anchor = self.group_anchor(publisher, group_name)?;
        let mut next = (*anchor.current()).clone();
        next.group.subscribe(subscriber);
        anchor.publish(next);
        Ok(())
    }

    pub fn unsubscribe(&self, publisher: NodeId, group_name: &str, subscriber: NodeId) -> Result<()> {
        let anchor = self.group_anchor(publisher, group_name)?;
        let mut next = (*anchor.current()).clone();
        next.group.unsubscribe(subscriber);
        anchor.publish(next);
        Ok(())
    }

    pub fn groups_for_node(&self, node_id: NodeId) -> Vec<String> {
        self.groups
            .read()
            .expect("group registry poisoned")
            .keys()
            .filter(|(n, _)| *n == node_id)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neu_core::node::NodeType;

    fn driver(id: u32, name: &str) -> Node {
        Node::new(NodeId(id), name, NodeType::Driver, "modbus-tcp")
    }

    fn app(id: u32, name: &str) -> Node {
        Node::new(NodeId(id), name, NodeType::App, "mqtt")
    }

    #[test]
    fn duplicate_node_name_is_rejected() {
        let reg = NodeRegistry::new();
        reg.add_node(driver(1, "mb1")).unwrap();
        let err = reg.add_node(driver(2, "mb1")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NodeExist);
    }

    #[test]
    fn duplicate_group_key_is_rejected() {
        let reg = NodeRegistry::new();
        reg.add_node(driver(1, "mb1")).unwrap();
        reg.add_group(NodeId(1), Group::new(NodeId(1), "g1", 1000).unwrap()).unwrap();
        let err = reg.add_group(NodeId(1), Group::new(NodeId(1), "g1", 2000).unwrap()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::GrpConfigExist);
    }

    #[test]
    fn subscribe_publishes_a_new_generation() {
        let reg = NodeRegistry::new();
        reg.add_node(driver(1, "mb1")).unwrap();
        reg.add_node(app(2, "mqtt1")).unwrap();
        reg.add_group(NodeId(1), Group::new(NodeId(1), "g1", 1000).unwrap()).unwrap();
        let anchor = reg.group_anchor(NodeId(1), "g1").unwrap();
        let before = anchor.generation();
        reg.subscribe(NodeId(1), "g1", NodeId(2)).unwrap();
        assert_eq!(anchor.generation(), before + 1);
        assert!(anchor.current().group.is_subscribed(NodeId(2)));
    }

    #[test]
    fn old_generation_reader_keeps_its_view_after_subscribe() {
        let reg = NodeRegistry::new();
        reg.add_node(driver(1, "mb1")).unwrap();
        reg.add_node(app(2, "mqtt1")).unwrap();
        reg.add_group(NodeId(1), Group::new(NodeId(1), "g1", 1000).unwrap()).unwrap();
        let anchor = reg.group_anchor(NodeId(1), "g1").unwrap();
        let old_view = anchor.current();
        reg.subscribe(NodeId(1), "g1", NodeId(2)).unwrap();
        assert!(!old_view.group.is_subscribed(NodeId(2)));
    }

    #[test]
    fn subscribe_rejects_non_driver_publisher() {
        let reg = NodeRegistry::new();
        reg.add_node(app(1, "mqtt-src")).unwrap();
        reg.add_node(app(2, "mqtt1")).unwrap();
        reg.add_group(NodeId(1), Group::new(NodeId(1), "g1", 1000).unwrap()).unwrap();
        let err = reg.subscribe(NodeId(1), "g1", NodeId(2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NodeTypeInvalid);
    }

    #[test]
    fn subscribe_rejects_non_app_subscriber() {
        let reg = NodeRegistry::new();
        reg.add_node(driver(1, "mb1")).unwrap();
        reg.add_node(driver(2, "mb2")).unwrap();
        reg.add_group(NodeId(1), Group::new(NodeId(1), "g1", 1000).unwrap()).unwrap();
        let err = reg.subscribe(NodeId(1), "g1", NodeId(2)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NodeTypeInvalid);
    }
}
