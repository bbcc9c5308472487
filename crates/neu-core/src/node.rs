//! Node entity: the registered unit of configuration that drives either a
//! south-bound driver plugin or a north-bound app plugin.

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Driver,
    App,
    System,
}

/// Connection status of a node's underlying transport. Distinct from
/// `RunningState`: a node can be `Ready`/`Running` while its link bounces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Lifecycle state of a node as driven by start/stop control plane calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunningState {
    Init,
    Ready,
    Running,
    Stopped,
}

impl RunningState {
    /// Whether `start` is a legal transition from this state.
    pub fn can_start(self) -> bool {
        matches!(self, RunningState::Ready | RunningState::Stopped)
    }

    /// Whether `stop` is a legal transition from this state.
    pub fn can_stop(self) -> bool {
        matches!(self, RunningState::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub plugin_name: String,
    /// Opaque, plugin-specific configuration blob (parsed by the plugin, not
    /// by the registry). Kept as JSON so unknown keys round-trip untouched.
    pub settings: serde_json::Value,
    pub link_state: LinkState,
    pub running_state: RunningState,
}

impl Node {
    pub fn new(node_id: NodeId, name: impl Into<String>, node_type: NodeType, plugin_name: impl Into<String>) -> Self {
        Self {
            node_id,
            name: name.into(),
            node_type,
            plugin_name: plugin_name.into(),
            settings: serde_json::Value::Null,
            link_state: LinkState::Disconnected,
            running_state: RunningState::Init,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_state_transitions() {
        assert!(RunningState::Ready.can_start());
        assert!(RunningState::Stopped.can_start());
        assert!(!RunningState::Running.can_start());
        assert!(RunningState::Running.can_stop());
        assert!(!RunningState::Init.can_stop());
    }

    #[test]
    fn new_node_starts_disconnected_and_uninitialized() {
        let n = Node::new(NodeId(1), "plc-1", NodeType::Driver, "modbus-tcp");
        assert_eq!(n.link_state, LinkState::Disconnected);
        assert_eq!(n.running_state, RunningState::Init);
    }
}
