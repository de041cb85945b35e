//! Collaborator interfaces.
//!
//! The generator never talks to real infrastructure itself. It consumes an
//! [`AppDescriptor`] for app-level settings, an [`InfraManager`] that
//! resolves provider-level connection parameters (already provisioned
//! elsewhere), and a [`ServiceRoutes`] address book for local inter-process
//! routing. All three are synchronous; a single lookup failure aborts the
//! whole graph build.

use std::net::SocketAddr;

use gantry_core::{
    AppFile, CacheClusterMeta, CorsConfig, PubSubTopicMeta, SqlDatabaseMeta, SubscriptionMeta,
};

/// App-level settings: platform identity, global CORS, descriptor file.
pub trait AppDescriptor {
    /// The platform-assigned app id, if the app is linked.
    fn platform_id(&self) -> Option<String>;
    /// The platform id, falling back to the locally-generated id.
    fn platform_or_local_id(&self) -> String;
    fn global_cors(&self) -> anyhow::Result<CorsConfig>;
    fn app_file(&self) -> anyhow::Result<AppFile>;
}

/// Resolves provider-level configuration for declared infrastructure.
pub trait InfraManager {
    fn sql_server_config(&self) -> anyhow::Result<SqlServerConfig>;
    fn sql_database_config(&self, db: &SqlDatabaseMeta) -> anyhow::Result<SqlDatabaseConfig>;
    fn pubsub_provider_config(&self) -> anyhow::Result<PubSubProviderConfig>;
    fn pubsub_topic_config(&self, topic: &PubSubTopicMeta) -> anyhow::Result<PubSubTopicConfig>;
    fn pubsub_subscription_config(
        &self,
        topic: &PubSubTopicMeta,
        sub: &SubscriptionMeta,
    ) -> anyhow::Result<PubSubSubscriptionConfig>;
    fn redis_config(
        &self,
        cluster: &CacheClusterMeta,
    ) -> anyhow::Result<(RedisServerConfig, RedisDatabaseConfig)>;
    /// Provider config plus the public base URL for public buckets.
    fn bucket_provider_config(&self) -> anyhow::Result<(BucketProviderConfig, String)>;
}

/// Local address book: registers a service's listen address and returns the
/// base URL other local processes should use to reach it.
pub trait ServiceRoutes {
    fn register_service(&mut self, name: &str, addr: SocketAddr) -> String;
}

#[derive(Debug, Clone)]
pub struct SqlServerConfig {
    pub host: String,
    pub server_ca_cert: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SqlDatabaseConfig {
    pub name: String,
    pub cloud_name: String,
    pub user: String,
    pub password: String,
    pub min_connections: i32,
    pub max_connections: i32,
}

#[derive(Debug, Clone)]
pub struct PubSubProviderConfig {
    pub nsq_hosts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PubSubTopicConfig {
    /// The provider-side name of the topic.
    pub cloud_name: String,
}

#[derive(Debug, Clone)]
pub struct PubSubSubscriptionConfig {
    /// The provider-side name of the subscription.
    pub cloud_name: String,
    /// Whether the provider pushes messages instead of being polled.
    pub push_only: bool,
}

#[derive(Debug, Clone)]
pub struct RedisServerConfig {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub enable_tls: bool,
    pub server_ca_cert: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedisDatabaseConfig {
    pub database_idx: i32,
    pub key_prefix: Option<String>,
    pub min_connections: i32,
    pub max_connections: i32,
}

#[derive(Debug, Clone)]
pub struct BucketProviderConfig {
    pub endpoint: String,
}
