//! Entity records and the async store traits every table-specific adapter
//! implements. §4.5's closed table set, modeled as plain data plus a trait
//! per table rather than one god-object repository — the same seam
//! `sem_os_postgres` draws around `PgSnapshotStore`/`PgObjectStore`/etc.

use async_trait::async_trait;
use serde_json::Value;

use neu_core::error::Result;
use neu_core::ids::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub id: NodeId,
    pub name: String,
    pub node_type: String,
    pub plugin_name: String,
    pub state_blob: Value,
}

#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn store(&self, node: &StoredNode) -> Result<()>;
    async fn update(&self, node: &StoredNode) -> Result<()>;
    async fn load(&self, id: NodeId) -> Result<Option<StoredNode>>;
    async fn load_all(&self) -> Result<Vec<StoredNode>>;
    async fn delete(&self, id: NodeId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlugin {
    pub name: String,
    pub so_path: String,
}

#[async_trait]
pub trait PluginStore: Send + Sync {
    async fn store(&self, plugin: &StoredPlugin) -> Result<()>;
    async fn load(&self, name: &str) -> Result<Option<StoredPlugin>>;
    async fn load_all(&self) -> Result<Vec<StoredPlugin>>;
    async fn delete(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredGroup {
    pub node_id: NodeId,
    pub name: String,
    pub interval_ms: u64,
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn store(&self, group: &StoredGroup) -> Result<()>;
    async fn update(&self, group: &StoredGroup) -> Result<()>;
    async fn load(&self, node_id: NodeId, name: &str) -> Result<Option<StoredGroup>>;
    async fn load_by_node(&self, node_id: NodeId) -> Result<Vec<StoredGroup>>;
    async fn delete(&self, node_id: NodeId, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTag {
    pub node_id: NodeId,
    pub group_name: String,
    pub id: u64,
    pub name: String,
    pub address: String,
    pub tag_type: String,
    pub attribute: i32,
    pub option_blob: Value,
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn store(&self, tag: &StoredTag) -> Result<()>;
    async fn update(&self, tag: &StoredTag) -> Result<()>;
    async fn load(&self, node_id: NodeId, group_name: &str, name: &str) -> Result<Option<StoredTag>>;
    async fn load_by_group(&self, node_id: NodeId, group_name: &str) -> Result<Vec<StoredTag>>;
    async fn delete(&self, node_id: NodeId, group_name: &str, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSubscription {
    pub publisher_node: NodeId,
    pub subscriber_node: NodeId,
    pub group_name: String,
    pub extra_blob: Value,
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn store(&self, sub: &StoredSubscription) -> Result<()>;
    async fn load_by_group(&self, publisher_node: NodeId, group_name: &str) -> Result<Vec<StoredSubscription>>;
    async fn delete(&self, publisher_node: NodeId, subscriber_node: NodeId, group_name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTemplateTag {
    pub name: String,
    pub address: String,
    pub tag_type: String,
    pub attribute: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTemplateGroup {
    pub name: String,
    pub interval_ms: u64,
    pub tags: Vec<StoredTemplateTag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTemplate {
    pub name: String,
    pub plugin_name: String,
    pub groups: Vec<StoredTemplateGroup>,
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn store(&self, template: &StoredTemplate) -> Result<()>;
    async fn load(&self, name: &str) -> Result<Option<StoredTemplate>>;
    async fn load_all(&self) -> Result<Vec<StoredTemplate>>;
    async fn delete(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerCert {
    pub app_name: String,
    pub cert: String,
    pub key: String,
    pub subject: String,
    pub issuer: String,
    pub valid_from: chrono::DateTime<chrono::Utc>,
    pub valid_to: chrono::DateTime<chrono::Utc>,
    pub fingerprint: String,
}

#[async_trait]
pub trait ServerCertStore: Send + Sync {
    async fn store(&self, cert: &ServerCert) -> Result<()>;
    async fn load(&self, app_name: &str) -> Result<Option<ServerCert>>;
    async fn delete(&self, app_name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientCert {
    pub app_name: String,
    pub fingerprint: String,
    pub cert: String,
    pub subject: String,
    pub issuer: String,
    pub trust_status: String,
}

#[async_trait]
pub trait ClientCertStore: Send + Sync {
    async fn store(&self, cert: &ClientCert) -> Result<()>;
    async fn load(&self, fingerprint: &str) -> Result<Option<ClientCert>>;
    async fn load_by_app(&self, app_name: &str) -> Result<Vec<ClientCert>>;
    async fn delete(&self, fingerprint: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityPolicy {
    pub app_name: String,
    pub policy_name: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait SecurityPolicyStore: Send + Sync {
    async fn store(&self, policy: &SecurityPolicy) -> Result<()>;
    async fn load(&self, app_name: &str) -> Result<Option<SecurityPolicy>>;
    async fn delete(&self, app_name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    pub app_name: String,
    pub enabled: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait AuthSettingsStore: Send + Sync {
    async fn store(&self, settings: &AuthSettings) -> Result<()>;
    async fn load(&self, app_name: &str) -> Result<Option<AuthSettings>>;
    async fn delete(&self, app_name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub app_name: String,
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait AuthUsersStore: Send + Sync {
    async fn store(&self, user: &AuthUser) -> Result<()>;
    async fn load(&self, app_name: &str, username: &str) -> Result<Option<AuthUser>>;
    async fn load_by_app(&self, app_name: &str) -> Result<Vec<AuthUser>>;
    async fn delete(&self, app_name: &str, username: &str) -> Result<()>;
}
