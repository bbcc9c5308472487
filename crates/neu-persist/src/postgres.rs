//! Postgres implementations of every port trait (§4.5).
//!
//! Each adapter is a newtype over `PgPool`, following `sem_os_postgres`'s
//! pattern: all SQL is runtime-checked (`sqlx::query`/`query_as`, never the
//! compile-time `query!` macro) so the crate builds without a live
//! database, and every row maps through a `#[derive(sqlx::FromRow)]` struct
//! local to this module.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use neu_core::error::{NeuError, Result};
use neu_core::ids::NodeId;

use crate::ports::*;

fn internal(e: sqlx::Error) -> NeuError {
    NeuError::Internal(anyhow!(e))
}

// ---- nodes ------------------------------------------------------------

pub struct PgNodeStore {
    pool: PgPool,
}

impl PgNodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: i64,
    name: String,
    node_type: String,
    plugin_name: String,
    state_blob: Value,
}

impl From<NodeRow> for StoredNode {
    fn from(r: NodeRow) -> Self {
        StoredNode {
            id: NodeId(r.id as u32),
            name: r.name,
            node_type: r.node_type,
            plugin_name: r.plugin_name,
            state_blob: r.state_blob,
        }
    }
}

#[async_trait]
impl NodeStore for PgNodeStore {
    async fn store(&self, node: &StoredNode) -> Result<()> {
        sqlx::query(
            "INSERT INTO nodes (id, name, type, plugin_name, state_blob) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(node.id.0 as i64)
        .bind(&node.name)
        .bind(&node.node_type)
        .bind(&node.plugin_name)
        .bind(&node.state_blob)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn update(&self, node: &StoredNode) -> Result<()> {
        sqlx::query("UPDATE nodes SET name = $2, type = $3, plugin_name = $4, state_blob = $5 WHERE id = $1")
            .bind(node.id.0 as i64)
            .bind(&node.name)
            .bind(&node.node_type)
            .bind(&node.plugin_name)
            .bind(&node.state_blob)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, id: NodeId) -> Result<Option<StoredNode>> {
        let row = sqlx::query_as::<_, NodeRow>("SELECT id, name, type as node_type, plugin_name, state_blob FROM nodes WHERE id = $1")
            .bind(id.0 as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn load_all(&self) -> Result<Vec<StoredNode>> {
        let rows = sqlx::query_as::<_, NodeRow>("SELECT id, name, type as node_type, plugin_name, state_blob FROM nodes ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: NodeId) -> Result<()> {
        sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id.0 as i64)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }
}

// ---- plugins ------------------------------------------------------------

pub struct PgPluginStore {
    pool: PgPool,
}

impl PgPluginStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PluginRow {
    name: String,
    so_path: String,
}

impl From<PluginRow> for StoredPlugin {
    fn from(r: PluginRow) -> Self {
        StoredPlugin { name: r.name, so_path: r.so_path }
    }
}

#[async_trait]
impl PluginStore for PgPluginStore {
    async fn store(&self, plugin: &StoredPlugin) -> Result<()> {
        sqlx::query("INSERT INTO plugins (name, so_path) VALUES ($1, $2) ON CONFLICT (name) DO UPDATE SET so_path = EXCLUDED.so_path")
            .bind(&plugin.name)
            .bind(&plugin.so_path)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<StoredPlugin>> {
        let row = sqlx::query_as::<_, PluginRow>("SELECT name, so_path FROM plugins WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn load_all(&self) -> Result<Vec<StoredPlugin>> {
        let rows = sqlx::query_as::<_, PluginRow>("SELECT name, so_path FROM plugins ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM plugins WHERE name = $1").bind(name).execute(&self.pool).await.map_err(internal)?;
        Ok(())
    }
}

// ---- groups ------------------------------------------------------------

pub struct PgGroupStore {
    pool: PgPool,
}

impl PgGroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    node_id: i64,
    name: String,
    interval_ms: i64,
}

impl From<GroupRow> for StoredGroup {
    fn from(r: GroupRow) -> Self {
        StoredGroup { node_id: NodeId(r.node_id as u32), name: r.name, interval_ms: r.interval_ms as u64 }
    }
}

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn store(&self, group: &StoredGroup) -> Result<()> {
        sqlx::query("INSERT INTO groups (node_id, name, interval_ms) VALUES ($1, $2, $3)")
            .bind(group.node_id.0 as i64)
            .bind(&group.name)
            .bind(group.interval_ms as i64)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn update(&self, group: &StoredGroup) -> Result<()> {
        sqlx::query("UPDATE groups SET interval_ms = $3 WHERE node_id = $1 AND name = $2")
            .bind(group.node_id.0 as i64)
            .bind(&group.name)
            .bind(group.interval_ms as i64)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, node_id: NodeId, name: &str) -> Result<Option<StoredGroup>> {
        let row = sqlx::query_as::<_, GroupRow>("SELECT node_id, name, interval_ms FROM groups WHERE node_id = $1 AND name = $2")
            .bind(node_id.0 as i64)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn load_by_node(&self, node_id: NodeId) -> Result<Vec<StoredGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>("SELECT node_id, name, interval_ms FROM groups WHERE node_id = $1 ORDER BY name")
            .bind(node_id.0 as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, node_id: NodeId, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM groups WHERE node_id = $1 AND name = $2")
            .bind(node_id.0 as i64)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }
}

// ---- tags ------------------------------------------------------------

pub struct PgTagStore {
    pool: PgPool,
}

impl PgTagStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    node_id: i64,
    group_name: String,
    id: i64,
    name: String,
    address: String,
    tag_type: String,
    attribute: i32,
    option_blob: Value,
}

impl From<TagRow> for StoredTag {
    fn from(r: TagRow) -> Self {
        StoredTag {
            node_id: NodeId(r.node_id as u32),
            group_name: r.group_name,
            id: r.id as u64,
            name: r.name,
            address: r.address,
            tag_type: r.tag_type,
            attribute: r.attribute,
            option_blob: r.option_blob,
        }
    }
}

#[async_trait]
impl TagStore for PgTagStore {
    async fn store(&self, tag: &StoredTag) -> Result<()> {
        sqlx::query(
            "INSERT INTO tags (node_id, group_name, id, name, address, type, attribute, option_blob) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(tag.node_id.0 as i64)
        .bind(&tag.group_name)
        .bind(tag.id as i64)
        .bind(&tag.name)
        .bind(&tag.address)
        .bind(&tag.tag_type)
        .bind(tag.attribute)
        .bind(&tag.option_blob)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn update(&self, tag: &StoredTag) -> Result<()> {
        sqlx::query("UPDATE tags SET address = $4, type = $5, attribute = $6, option_blob = $7 WHERE node_id = $1 AND group_name = $2 AND name = $3")
            .bind(tag.node_id.0 as i64)
            .bind(&tag.group_name)
            .bind(&tag.name)
            .bind(&tag.address)
            .bind(&tag.tag_type)
            .bind(tag.attribute)
            .bind(&tag.option_blob)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, node_id: NodeId, group_name: &str, name: &str) -> Result<Option<StoredTag>> {
        let row = sqlx::query_as::<_, TagRow>(
            "SELECT node_id, group_name, id, name, address, type as tag_type, attribute, option_blob \
             FROM tags WHERE node_id = $1 AND group_name = $2 AND name = $3",
        )
        .bind(node_id.0 as i64)
        .bind(group_name)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn load_by_group(&self, node_id: NodeId, group_name: &str) -> Result<Vec<StoredTag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT node_id, group_name, id, name, address, type as tag_type, attribute, option_blob \
             FROM tags WHERE node_id = $1 AND group_name = $2 ORDER BY name",
        )
        .bind(node_id.0 as i64)
        .bind(group_name)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, node_id: NodeId, group_name: &str, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM tags WHERE node_id = $1 AND group_name = $2 AND name = $3")
            .bind(node_id.0 as i64)
            .bind(group_name)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }
}

// ---- subscriptions ------------------------------------------------------

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    publisher_node: i64,
    subscriber_node: i64,
    group_name: String,
    extra_blob: Value,
}

impl From<SubscriptionRow> for StoredSubscription {
    fn from(r: SubscriptionRow) -> Self {
        StoredSubscription {
            publisher_node: NodeId(r.publisher_node as u32),
            subscriber_node: NodeId(r.subscriber_node as u32),
            group_name: r.group_name,
            extra_blob: r.extra_blob,
        }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn store(&self, sub: &StoredSubscription) -> Result<()> {
        sqlx::query("INSERT INTO subscriptions (publisher_node, subscriber_node, group_name, extra_blob) VALUES ($1, $2, $3, $4)")
            .bind(sub.publisher_node.0 as i64)
            .bind(sub.subscriber_node.0 as i64)
            .bind(&sub.group_name)
            .bind(&sub.extra_blob)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn load_by_group(&self, publisher_node: NodeId, group_name: &str) -> Result<Vec<StoredSubscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT publisher_node, subscriber_node, group_name, extra_blob FROM subscriptions WHERE publisher_node = $1 AND group_name = $2",
        )
        .bind(publisher_node.0 as i64)
        .bind(group_name)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, publisher_node: NodeId, subscriber_node: NodeId, group_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM subscriptions WHERE publisher_node = $1 AND subscriber_node = $2 AND group_name = $3")
            .bind(publisher_node.0 as i64)
            .bind(subscriber_node.0 as i64)
            .bind(group_name)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }
}

// ---- templates ------------------------------------------------------------

pub struct PgTemplateStore {
    pool: PgPool,
}

impl PgTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn store(&self, template: &StoredTemplate) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(internal)?;
        sqlx::query("INSERT INTO templates (name, plugin_name) VALUES ($1, $2) ON CONFLICT (name) DO UPDATE SET plugin_name = EXCLUDED.plugin_name")
            .bind(&template.name)
            .bind(&template.plugin_name)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        sqlx::query("DELETE FROM template_groups WHERE template = $1").bind(&template.name).execute(&mut *tx).await.map_err(internal)?;
        for group in &template.groups {
            sqlx::query("INSERT INTO template_groups (template, name, interval_ms) VALUES ($1, $2, $3)")
                .bind(&template.name)
                .bind(&group.name)
                .bind(group.interval_ms as i64)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            for tag in &group.tags {
                sqlx::query(
                    "INSERT INTO template_tags (template, \"group\", name, address, type, attribute) VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(&template.name)
                .bind(&group.name)
                .bind(&tag.name)
                .bind(&tag.address)
                .bind(&tag.tag_type)
                .bind(tag.attribute)
                .execute(&mut *tx)
                .await
                .map_err(internal)?;
            }
        }
        tx.commit().await.map_err(internal)?;
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<StoredTemplate>> {
        #[derive(sqlx::FromRow)]
        struct TplRow {
            plugin_name: String,
        }
        let Some(tpl) = sqlx::query_as::<_, TplRow>("SELECT plugin_name FROM templates WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
        else {
            return Ok(None);
        };

        #[derive(sqlx::FromRow)]
        struct TplGroupRow {
            name: String,
            interval_ms: i64,
        }
        let group_rows = sqlx::query_as::<_, TplGroupRow>("SELECT name, interval_ms FROM template_groups WHERE template = $1 ORDER BY name")
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        let mut groups = Vec::with_capacity(group_rows.len());
        for g in group_rows {
            #[derive(sqlx::FromRow)]
            struct TplTagRow {
                name: String,
                address: String,
                tag_type: String,
                attribute: i32,
            }
            let tag_rows = sqlx::query_as::<_, TplTagRow>(
                "SELECT name, address, type as tag_type, attribute FROM template_tags WHERE template = $1 AND \"group\" = $2 ORDER BY name",
            )
            .bind(name)
            .bind(&g.name)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
            groups.push(StoredTemplateGroup {
                name: g.name,
                interval_ms: g.interval_ms as u64,
                tags: tag_rows
                    .into_iter()
                    .map(|t| StoredTemplateTag { name: t.name, address: t.address, tag_type: t.tag_type, attribute: t.attribute })
                    .collect(),
            });
        }

        Ok(Some(StoredTemplate { name: name.to_string(), plugin_name: tpl.plugin_name, groups }))
    }

    async fn load_all(&self) -> Result<Vec<StoredTemplate>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM templates ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(t) = self.load(&name).await? {
                out.push(t);
            }
        }
        Ok(out)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM templates WHERE name = $1").bind(name).execute(&self.pool).await.map_err(internal)?;
        Ok(())
    }
}

// ---- certs / security / auth --------------------------------------------

pub struct PgServerCertStore {
    pool: PgPool,
}

impl PgServerCertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ServerCertRow {
    app_name: String,
    cert: String,
    key: String,
    subject: String,
    issuer: String,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    fingerprint: String,
}

impl From<ServerCertRow> for ServerCert {
    fn from(r: ServerCertRow) -> Self {
        ServerCert {
            app_name: r.app_name,
            cert: r.cert,
            key: r.key,
            subject: r.subject,
            issuer: r.issuer,
            valid_from: r.valid_from,
            valid_to: r.valid_to,
            fingerprint: r.fingerprint,
        }
    }
}

#[async_trait]
impl ServerCertStore for PgServerCertStore {
    async fn store(&self, cert: &ServerCert) -> Result<()> {
        sqlx::query(
            "INSERT INTO server_certs (app_name, cert, key, subject, issuer, valid_from, valid_to, fingerprint) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (app_name) DO UPDATE SET cert = EXCLUDED.cert, key = EXCLUDED.key, subject = EXCLUDED.subject, \
             issuer = EXCLUDED.issuer, valid_from = EXCLUDED.valid_from, valid_to = EXCLUDED.valid_to, fingerprint = EXCLUDED.fingerprint",
        )
        .bind(&cert.app_name)
        .bind(&cert.cert)
        .bind(&cert.key)
        .bind(&cert.subject)
        .bind(&cert.issuer)
        .bind(cert.valid_from)
        .bind(cert.valid_to)
        .bind(&cert.fingerprint)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, app_name: &str) -> Result<Option<ServerCert>> {
        let row = sqlx::query_as::<_, ServerCertRow>(
            "SELECT app_name, cert, key, subject, issuer, valid_from, valid_to, fingerprint FROM server_certs WHERE app_name = $1",
        )
        .bind(app_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, app_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM server_certs WHERE app_name = $1").bind(app_name).execute(&self.pool).await.map_err(internal)?;
        Ok(())
    }
}

pub struct PgClientCertStore {
    pool: PgPool,
}

impl PgClientCertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ClientCertRow {
    app_name: String,
    fingerprint: String,
    cert: String,
    subject: String,
    issuer: String,
    trust_status: String,
}

impl From<ClientCertRow> for ClientCert {
    fn from(r: ClientCertRow) -> Self {
        ClientCert { app_name: r.app_name, fingerprint: r.fingerprint, cert: r.cert, subject: r.subject, issuer: r.issuer, trust_status: r.trust_status }
    }
}

#[async_trait]
impl ClientCertStore for PgClientCertStore {
    async fn store(&self, cert: &ClientCert) -> Result<()> {
        sqlx::query(
            "INSERT INTO client_certs (app_name, fingerprint, cert, subject, issuer, trust_status) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (fingerprint) DO UPDATE SET trust_status = EXCLUDED.trust_status",
        )
        .bind(&cert.app_name)
        .bind(&cert.fingerprint)
        .bind(&cert.cert)
        .bind(&cert.subject)
        .bind(&cert.issuer)
        .bind(&cert.trust_status)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, fingerprint: &str) -> Result<Option<ClientCert>> {
        let row = sqlx::query_as::<_, ClientCertRow>(
            "SELECT app_name, fingerprint, cert, subject, issuer, trust_status FROM client_certs WHERE fingerprint = $1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn load_by_app(&self, app_name: &str) -> Result<Vec<ClientCert>> {
        let rows = sqlx::query_as::<_, ClientCertRow>(
            "SELECT app_name, fingerprint, cert, subject, issuer, trust_status FROM client_certs WHERE app_name = $1",
        )
        .bind(app_name)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, fingerprint: &str) -> Result<()> {
        sqlx::query("DELETE FROM client_certs WHERE fingerprint = $1").bind(fingerprint).execute(&self.pool).await.map_err(internal)?;
        Ok(())
    }
}

pub struct PgSecurityPolicyStore {
    pool: PgPool,
}

impl PgSecurityPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SecurityPolicyRow {
    app_name: String,
    policy_name: String,
    updated_at: DateTime<Utc>,
}

impl From<SecurityPolicyRow> for SecurityPolicy {
    fn from(r: SecurityPolicyRow) -> Self {
        SecurityPolicy { app_name: r.app_name, policy_name: r.policy_name, updated_at: r.updated_at }
    }
}

#[async_trait]
impl SecurityPolicyStore for PgSecurityPolicyStore {
    async fn store(&self, policy: &SecurityPolicy) -> Result<()> {
        sqlx::query(
            "INSERT INTO security_policies (app_name, policy_name, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (app_name) DO UPDATE SET policy_name = EXCLUDED.policy_name, updated_at = EXCLUDED.updated_at",
        )
        .bind(&policy.app_name)
        .bind(&policy.policy_name)
        .bind(policy.updated_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, app_name: &str) -> Result<Option<SecurityPolicy>> {
        let row = sqlx::query_as::<_, SecurityPolicyRow>("SELECT app_name, policy_name, updated_at FROM security_policies WHERE app_name = $1")
            .bind(app_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, app_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM security_policies WHERE app_name = $1").bind(app_name).execute(&self.pool).await.map_err(internal)?;
        Ok(())
    }
}

pub struct PgAuthSettingsStore {
    pool: PgPool,
}

impl PgAuthSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AuthSettingsRow {
    app_name: String,
    enabled: bool,
    updated_at: DateTime<Utc>,
}

impl From<AuthSettingsRow> for AuthSettings {
    fn from(r: AuthSettingsRow) -> Self {
        AuthSettings { app_name: r.app_name, enabled: r.enabled, updated_at: r.updated_at }
    }
}

#[async_trait]
impl AuthSettingsStore for PgAuthSettingsStore {
    async fn store(&self, settings: &AuthSettings) -> Result<()> {
        sqlx::query(
            "INSERT INTO auth_settings (app_name, enabled, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (app_name) DO UPDATE SET enabled = EXCLUDED.enabled, updated_at = EXCLUDED.updated_at",
        )
        .bind(&settings.app_name)
        .bind(settings.enabled)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, app_name: &str) -> Result<Option<AuthSettings>> {
        let row = sqlx::query_as::<_, AuthSettingsRow>("SELECT app_name, enabled, updated_at FROM auth_settings WHERE app_name = $1")
            .bind(app_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, app_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_settings WHERE app_name = $1").bind(app_name).execute(&self.pool).await.map_err(internal)?;
        Ok(())
    }
}

pub struct PgAuthUsersStore {
    pool: PgPool,
}

impl PgAuthUsersStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AuthUserRow {
    app_name: String,
    username: String,
    password_hash: String,
}

impl From<AuthUserRow> for AuthUser {
    fn from(r: AuthUserRow) -> Self {
        AuthUser { app_name: r.app_name, username: r.username, password_hash: r.password_hash }
    }
}

#[async_trait]
impl AuthUsersStore for PgAuthUsersStore {
    async fn store(&self, user: &AuthUser) -> Result<()> {
        sqlx::query(
            "INSERT INTO auth_users (app_name, username, password_hash) VALUES ($1, $2, $3) \
             ON CONFLICT (app_name, username) DO UPDATE SET password_hash = EXCLUDED.password_hash",
        )
        .bind(&user.app_name)
        .bind(&user.username)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn load(&self, app_name: &str, username: &str) -> Result<Option<AuthUser>> {
        let row = sqlx::query_as::<_, AuthUserRow>("SELECT app_name, username, password_hash FROM auth_users WHERE app_name = $1 AND username = $2")
            .bind(app_name)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn load_by_app(&self, app_name: &str) -> Result<Vec<AuthUser>> {
        let rows = sqlx::query_as::<_, AuthUserRow>("SELECT app_name, username, password_hash FROM auth_users WHERE app_name = $1")
            .bind(app_name)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, app_name: &str, username: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_users WHERE app_name = $1 AND username = $2")
            .bind(app_name)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }
}
