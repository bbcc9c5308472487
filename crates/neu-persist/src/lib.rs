//! Durable store for nodes, plugin bindings, groups, tags, subscriptions,
//! templates, certificates and security policies (§4.5). The scheduler hot
//! path never touches this crate; it is consulted only on configuration
//! change.
//!
//! One async trait per table (`ports`), a Postgres adapter per table
//! (`postgres`, via `sqlx`), and an in-memory mock of every trait (`mock`)
//! so the scheduler/fan-out crates can be unit-tested without a database —
//! the same adapter-over-trait-ports seam `sem_os_postgres` draws around
//! its stores.

pub mod mock;
pub mod ports;
pub mod postgres;

pub use ports::{
    AuthSettings, AuthSettingsStore, AuthUser, AuthUsersStore, ClientCert, ClientCertStore, GroupStore, NodeStore,
    PluginStore, SecurityPolicy, SecurityPolicyStore, ServerCert, ServerCertStore, StoredGroup, StoredNode,
    StoredPlugin, StoredSubscription, StoredTag, StoredTemplate, StoredTemplateGroup, StoredTemplateTag,
    SubscriptionStore, TagStore, TemplateStore,
};
