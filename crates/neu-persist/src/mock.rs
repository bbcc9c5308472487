//! In-memory mocks of every port trait, for scheduler/fan-out unit tests
//! and for exercising the ports themselves without a live database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use neu_core::error::{NeuError, Result};
use neu_core::ids::NodeId;

use crate::ports::*;

#[derive(Default)]
pub struct MockNodeStore {
    rows: Mutex<HashMap<u32, StoredNode>>,
}

#[async_trait]
impl NodeStore for MockNodeStore {
    async fn store(&self, node: &StoredNode) -> Result<()> {
        let mut rows = self.rows.lock().expect("mock node store poisoned");
        if rows.values().any(|n| n.name == node.name && n.id != node.id) {
            return Err(NeuError::node_exist(&node.name));
        }
        rows.insert(node.id.0, node.clone());
        Ok(())
    }

    async fn update(&self, node: &StoredNode) -> Result<()> {
        let mut rows = self.rows.lock().expect("mock node store poisoned");
        if !rows.contains_key(&node.id.0) {
            return Err(NeuError::node_not_exist(&node.name));
        }
        rows.insert(node.id.0, node.clone());
        Ok(())
    }

    async fn load(&self, id: NodeId) -> Result<Option<StoredNode>> {
        Ok(self.rows.lock().expect("mock node store poisoned").get(&id.0).cloned())
    }

    async fn load_all(&self) -> Result<Vec<StoredNode>> {
        Ok(self.rows.lock().expect("mock node store poisoned").values().cloned().collect())
    }

    async fn delete(&self, id: NodeId) -> Result<()> {
        self.rows.lock().expect("mock node store poisoned").remove(&id.0);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPluginStore {
    rows: Mutex<HashMap<String, StoredPlugin>>,
}

#[async_trait]
impl PluginStore for MockPluginStore {
    async fn store(&self, plugin: &StoredPlugin) -> Result<()> {
        self.rows.lock().expect("mock plugin store poisoned").insert(plugin.name.clone(), plugin.clone());
        Ok(())
    }
    async fn load(&self, name: &str) -> Result<Option<StoredPlugin>> {
        Ok(self.rows.lock().expect("mock plugin store poisoned").get(name).cloned())
    }
    async fn load_all(&self) -> Result<Vec<StoredPlugin>> {
        Ok(self.rows.lock().expect("mock plugin store poisoned").values().cloned().collect())
    }
    async fn delete(&self, name: &str) -> Result<()> {
        self.rows.lock().expect("mock plugin store poisoned").remove(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockGroupStore {
    rows: Mutex<HashMap<(u32, String), StoredGroup>>,
}

#[async_trait]
impl GroupStore for MockGroupStore {
    async fn store(&self, group: &StoredGroup) -> Result<()> {
        let key = (group.node_id.0, group.name.clone());
        let mut rows = self.rows.lock().expect("mock group store poisoned");
        if rows.contains_key(&key) {
            return Err(NeuError::group_config_exist(&group.name));
        }
        rows.insert(key, group.clone());
        Ok(())
    }
    async fn update(&self, group: &StoredGroup) -> Result<()> {
        let key = (group.node_id.0, group.name.clone());
        let mut rows = self.rows.lock().expect("mock group store poisoned");
        if !rows.contains_key(&key) {
            return Err(NeuError::group_config_not_exist(&group.name));
        }
        rows.insert(key, group.clone());
        Ok(())
    }
    async fn load(&self, node_id: NodeId, name: &str) -> Result<Option<StoredGroup>> {
        Ok(self.rows.lock().expect("mock group store poisoned").get(&(node_id.0, name.to_string())).cloned())
    }
    async fn load_by_node(&self, node_id: NodeId) -> Result<Vec<StoredGroup>> {
        Ok(self
            .rows
            .lock()
            .expect("mock group store poisoned")
            .values()
            .filter(|g| g.node_id == node_id)
            .cloned()
            .collect())
    }
    async fn delete(&self, node_id: NodeId, name: &str) -> Result<()> {
        self.rows.lock().expect("mock group store poisoned").remove(&(node_id.0, name.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTagStore {
    rows: Mutex<HashMap<(u32, String, String), StoredTag>>,
}

#[async_trait]
impl TagStore for MockTagStore {
    async fn store(&self, tag: &StoredTag) -> Result<()> {
        let key = (tag.node_id.0, tag.group_name.clone(), tag.name.clone());
        let mut rows = self.rows.lock().expect("mock tag store poisoned");
        if rows.contains_key(&key) {
            return Err(NeuError::tag_name_exist(&tag.name));
        }
        rows.insert(key, tag.clone());
        Ok(())
    }
    async fn update(&self, tag: &StoredTag) -> Result<()> {
        let key = (tag.node_id.0, tag.group_name.clone(), tag.name.clone());
        self.rows.lock().expect("mock tag store poisoned").insert(key, tag.clone());
        Ok(())
    }
    async fn load(&self, node_id: NodeId, group_name: &str, name: &str) -> Result<Option<StoredTag>> {
        Ok(self
            .rows
            .lock()
            .expect("mock tag store poisoned")
            .get(&(node_id.0, group_name.to_string(), name.to_string()))
            .cloned())
    }
    async fn load_by_group(&self, node_id: NodeId, group_name: &str) -> Result<Vec<StoredTag>> {
        Ok(self
            .rows
            .lock()
            .expect("mock tag store poisoned")
            .values()
            .filter(|t| t.node_id == node_id && t.group_name == group_name)
            .cloned()
            .collect())
    }
    async fn delete(&self, node_id: NodeId, group_name: &str, name: &str) -> Result<()> {
        self.rows
            .lock()
            .expect("mock tag store poisoned")
            .remove(&(node_id.0, group_name.to_string(), name.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSubscriptionStore {
    rows: Mutex<Vec<StoredSubscription>>,
}

#[async_trait]
impl SubscriptionStore for MockSubscriptionStore {
    async fn store(&self, sub: &StoredSubscription) -> Result<()> {
        self.rows.lock().expect("mock subscription store poisoned").push(sub.clone());
        Ok(())
    }
    async fn load_by_group(&self, publisher_node: NodeId, group_name: &str) -> Result<Vec<StoredSubscription>> {
        Ok(self
            .rows
            .lock()
            .expect("mock subscription store poisoned")
            .iter()
            .filter(|s| s.publisher_node == publisher_node && s.group_name == group_name)
            .cloned()
            .collect())
    }
    async fn delete(&self, publisher_node: NodeId, subscriber_node: NodeId, group_name: &str) -> Result<()> {
        self.rows
            .lock()
            .expect("mock subscription store poisoned")
            .retain(|s| !(s.publisher_node == publisher_node && s.subscriber_node == subscriber_node && s.group_name == group_name));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTemplateStore {
    rows: Mutex<HashMap<String, StoredTemplate>>,
}

#[async_trait]
impl TemplateStore for MockTemplateStore {
    async fn store(&self, template: &StoredTemplate) -> Result<()> {
        self.rows.lock().expect("mock template store poisoned").insert(template.name.clone(), template.clone());
        Ok(())
    }
    async fn load(&self, name: &str) -> Result<Option<StoredTemplate>> {
        Ok(self.rows.lock().expect("mock template store poisoned").get(name).cloned())
    }
    async fn load_all(&self) -> Result<Vec<StoredTemplate>> {
        Ok(self.rows.lock().expect("mock template store poisoned").values().cloned().collect())
    }
    async fn delete(&self, name: &str) -> Result<()> {
        self.rows.lock().expect("mock template store poisoned").remove(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockServerCertStore {
    rows: Mutex<HashMap<String, ServerCert>>,
}

#[async_trait]
impl ServerCertStore for MockServerCertStore {
    async fn store(&self, cert: &ServerCert) -> Result<()> {
        self.rows.lock().expect("mock server cert store poisoned").insert(cert.app_name.clone(), cert.clone());
        Ok(())
    }
    async fn load(&self, app_name: &str) -> Result<Option<ServerCert>> {
        Ok(self.rows.lock().expect("mock server cert store poisoned").get(app_name).cloned())
    }
    async fn delete(&self, app_name: &str) -> Result<()> {
        self.rows.lock().expect("mock server cert store poisoned").remove(app_name);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockClientCertStore {
    rows: Mutex<HashMap<String, ClientCert>>,
}

#[async_trait]
impl ClientCertStore for MockClientCertStore {
    async fn store(&self, cert: &ClientCert) -> Result<()> {
        self.rows.lock().expect("mock client cert store poisoned").insert(cert.fingerprint.clone(), cert.clone());
        Ok(())
    }
    async fn load(&self, fingerprint: &str) -> Result<Option<ClientCert>> {
        Ok(self.rows.lock().expect("mock client cert store poisoned").get(fingerprint).cloned())
    }
    async fn load_by_app(&self, app_name: &str) -> Result<Vec<ClientCert>> {
        Ok(self
            .rows
            .lock()
            .expect("mock client cert store poisoned")
            .values()
            .filter(|c| c.app_name == app_name)
            .cloned()
            .collect())
    }
    async fn delete(&self, fingerprint: &str) -> Result<()> {
        self.rows.lock().expect("mock client cert store poisoned").remove(fingerprint);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSecurityPolicyStore {
    rows: Mutex<HashMap<String, SecurityPolicy>>,
}

#[async_trait]
impl SecurityPolicyStore for MockSecurityPolicyStore {
    async fn store(&self, policy: &SecurityPolicy) -> Result<()> {
        self.rows.lock().expect("mock security policy store poisoned").insert(policy.app_name.clone(), policy.clone());
        Ok(())
    }
    async fn load(&self, app_name: &str) -> Result<Option<SecurityPolicy>> {
        Ok(self.rows.lock().expect("mock security policy store poisoned").get(app_name).cloned())
    }
    async fn delete(&self, app_name: &str) -> Result<()> {
        self.rows.lock().expect("mock security policy store poisoned").remove(app_name);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockAuthSettingsStore {
    rows: Mutex<HashMap<String, AuthSettings>>,
}

#[async_trait]
impl AuthSettingsStore for MockAuthSettingsStore {
    async fn store(&self, settings: &AuthSettings) -> Result<()> {
        self.rows.lock().expect("mock auth settings store poisoned").insert(settings.app_name.clone(), settings.clone());
        Ok(())
    }
    async fn load(&self, app_name: &str) -> Result<Option<AuthSettings>> {
        Ok(self.rows.lock().expect("mock auth settings store poisoned").get(app_name).cloned())
    }
    async fn delete(&self, app_name: &str) -> Result<()> {
        self.rows.lock().expect("mock auth settings store poisoned").remove(app_name);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockAuthUsersStore {
    rows: Mutex<HashMap<(String, String), AuthUser>>,
}

#[async_trait]
impl AuthUsersStore for MockAuthUsersStore {
    async fn store(&self, user: &AuthUser) -> Result<()> {
        let key = (user.app_name.clone(), user.username.clone());
        self.rows.lock().expect("mock auth users store poisoned").insert(key, user.clone());
        Ok(())
    }
    async fn load(&self, app_name: &str, username: &str) -> Result<Option<AuthUser>> {
        Ok(self
            .rows
            .lock()
            .expect("mock auth users store poisoned")
            .get(&(app_name.to_string(), username.to_string()))
            .cloned())
    }
    async fn load_by_app(&self, app_name: &str) -> Result<Vec<AuthUser>> {
        Ok(self
            .rows
            .lock()
            .expect("mock auth users store poisoned")
            .values()
            .filter(|u| u.app_name == app_name)
            .cloned()
            .collect())
    }
    async fn delete(&self, app_name: &str, username: &str) -> Result<()> {
        self.rows
            .lock()
            .expect("mock auth users store poisoned")
            .remove(&(app_name.to_string(), username.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neu_core::ids::NodeId;
    use serde_json::json;

    #[tokio::test]
    async fn node_store_enforces_unique_name() {
        let store = MockNodeStore::default();
        let n1 = StoredNode {
            id: NodeId(1),
            name: "mb1".into(),
            node_type: "driver".into(),
            plugin_name: "modbus-tcp".into(),
            state_blob: json!({}),
        };
        store.store(&n1).await.unwrap();
        let n2 = StoredNode { id: NodeId(2), ..n1.clone() };
        let err = store.store(&n2).await.unwrap_err();
        assert_eq!(err.code(), neu_core::error::ErrorCode::NodeExist);
    }

    #[tokio::test]
    async fn group_store_round_trips() {
        let store = MockGroupStore::default();
        let g = StoredGroup { node_id: NodeId(1), name: "g1".into(), interval_ms: 1000 };
        store.store(&g).await.unwrap();
        assert_eq!(store.load(NodeId(1), "g1").await.unwrap(), Some(g));
        assert_eq!(store.load_by_node(NodeId(1)).await.unwrap().len(), 1);
    }
}
