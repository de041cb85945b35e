//! Canonical runtime configuration model.
//!
//! These types describe everything a spawned process needs at boot: its
//! environment identity, the infrastructure resources it may reach, and the
//! deployment-specific data (hosted services, auth, service discovery).
//! The model is encoding-agnostic; the wire forms live in [`crate::encode`].

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::rid::Rid;

/// The complete runtime configuration handed to one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub environment: Environment,
    /// Platform link, if the app is connected to the hosted platform.
    pub platform: Option<PlatformConfig>,
    pub infra: Infrastructure,
    pub deployment: DeploymentConfig,
}

/// Identity of the app/env/deployment being configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub app_id: String,
    /// Platform-assigned slug, if any.
    pub app_slug: Option<String>,
    pub env_id: String,
    pub env_name: String,
    pub env_type: EnvType,
    pub cloud: CloudKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvType {
    Development,
    Test,
    Production,
    Ephemeral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudKind {
    Local,
    Aws,
    Gcp,
    Azure,
}

/// Platform-level configuration shared by every process in the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Active signing keys for service-to-service auth. More than one key
    /// may be active during rotation; every consumer must see the same set.
    pub signing_keys: Vec<AuthKey>,
}

/// A signing key used to authenticate service-to-service calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthKey {
    pub id: u32,
    pub data: SecretData,
}

/// A secret payload with its source kind.
///
/// Local/dev configurations embed the plaintext directly. Production
/// backends would add variants referencing externally-managed secret
/// stores; those are not modeled here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretData {
    Embedded(Vec<u8>),
}

impl SecretData {
    pub fn embedded(bytes: impl Into<Vec<u8>>) -> Self {
        SecretData::Embedded(bytes.into())
    }

    /// The raw secret bytes, for sinks that inline plaintext.
    pub fn expose(&self) -> &[u8] {
        match self {
            SecretData::Embedded(b) => b,
        }
    }
}

/// An auth method a caller can use when talking to a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAuth {
    /// Request signing with the shared platform keys.
    SigningKey { keys: Vec<AuthKey> },
}

/// Trace export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracingProvider {
    pub rid: Rid,
    pub endpoint: String,
    /// Fraction of traces to sample, in [0, 1].
    pub sampling_rate: f64,
}

/// Per-service runtime knobs, one entry per declared service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedService {
    pub name: String,
    pub log_config: Option<String>,
    /// Worker thread pool size; zero means "let the runtime pick".
    pub worker_threads: Option<i32>,
}

/// Graceful shutdown windows. The handler-drain window fits inside the
/// shutdown-hook window, which fits inside the total window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GracefulShutdown {
    pub total: Duration,
    pub shutdown_hooks: Duration,
    pub handlers: Duration,
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(10),
            shutdown_hooks: Duration::from_secs(4),
            handlers: Duration::from_secs(2),
        }
    }
}

// ── Infrastructure ───────────────────────────────────────────────

/// All infrastructure resources visible to a process, plus the credentials
/// they reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Infrastructure {
    pub credentials: Credentials,
    pub resources: Resources,
}

/// Credential objects, referenced from resources by Rid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub sql_roles: Vec<SqlRole>,
    pub redis_roles: Vec<RedisRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub gateways: Vec<Gateway>,
    pub sql_clusters: Vec<SqlCluster>,
    pub pubsub_clusters: Vec<PubSubCluster>,
    pub redis_clusters: Vec<RedisCluster>,
    pub bucket_clusters: Vec<BucketCluster>,
    pub app_secrets: Vec<AppSecret>,
}

/// A named ingress point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    pub rid: Rid,
    pub name: String,
    pub base_url: String,
    pub hostnames: Vec<String>,
    pub cors: CorsPolicy,
}

/// CORS policy for one gateway, derived once from the app-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorsPolicy {
    pub debug: bool,
    pub disable_credentials: bool,
    pub extra_allowed_headers: Vec<String>,
    pub extra_exposed_headers: Vec<String>,
    pub allowed_origins_with_credentials: CredentialedOrigins,
    pub allowed_origins_without_credentials: Vec<String>,
    pub allow_private_network_access: bool,
}

/// Origins allowed to send credentialed requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialedOrigins {
    Origins(Vec<String>),
    /// Allow any origin to send credentials. Only safe for local dev; used
    /// when the app supplied no explicit origin list.
    UnsafeAllowAll,
}

// ── Pub/sub ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubCluster {
    pub rid: Rid,
    pub provider: PubSubProvider,
    pub topics: Vec<PubSubTopic>,
    pub subscriptions: Vec<PubSubSubscription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PubSubProvider {
    Nsq { hosts: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryGuarantee {
    AtLeastOnce,
    ExactlyOnce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubTopic {
    pub rid: Rid,
    pub name: String,
    pub cloud_name: String,
    pub delivery_guarantee: DeliveryGuarantee,
    pub ordering_attr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubSubscription {
    pub rid: Rid,
    pub topic_name: String,
    pub name: String,
    pub topic_cloud_name: String,
    pub cloud_name: String,
    pub push_only: bool,
}

// ── SQL ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Primary,
    ReadReplica,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub server_ca_cert: Option<String>,
    pub disable_ca_validation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCluster {
    pub rid: Rid,
    pub servers: Vec<SqlServer>,
    pub databases: Vec<SqlDatabase>,
}

impl SqlCluster {
    pub fn new(rid: Rid) -> Self {
        Self { rid, servers: Vec::new(), databases: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlServer {
    pub rid: Rid,
    pub kind: ServerKind,
    pub host: String,
    pub tls: Option<TlsConfig>,
}

/// A credential set on a SQL cluster. Its Rid is derived from
/// (cluster Rid, username) so that shared users collapse to one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlRole {
    pub rid: Rid,
    pub username: String,
    pub password: SecretData,
    pub client_cert_rid: Option<Rid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlDatabase {
    pub rid: Rid,
    pub name: String,
    pub cloud_name: String,
    pub conn_pools: Vec<SqlConnectionPool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlConnectionPool {
    pub is_readonly: bool,
    pub role_rid: Rid,
    pub min_connections: i32,
    pub max_connections: i32,
}

// ── Cache (redis) ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisCluster {
    pub rid: Rid,
    pub servers: Vec<RedisServer>,
    pub databases: Vec<RedisDatabase>,
}

impl RedisCluster {
    pub fn new(rid: Rid) -> Self {
        Self { rid, servers: Vec::new(), databases: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisServer {
    pub rid: Rid,
    pub kind: ServerKind,
    pub host: String,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisRole {
    pub rid: Rid,
    pub auth: Option<RedisAuth>,
    pub client_cert_rid: Option<Rid>,
}

/// Credential shape for a redis role, depending on what the server expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedisAuth {
    /// ACL-style auth with username and password.
    Acl { username: String, password: SecretData },
    /// Password-only AUTH string.
    AuthString(SecretData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisDatabase {
    pub rid: Rid,
    pub name: String,
    pub database_idx: i32,
    pub key_prefix: Option<String>,
    pub conn_pools: Vec<RedisConnectionPool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisConnectionPool {
    pub is_readonly: bool,
    pub role_rid: Rid,
    pub min_connections: i32,
    pub max_connections: i32,
}

// ── Object storage ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCluster {
    pub rid: Rid,
    pub provider: BucketProvider,
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketProvider {
    Gcs {
        endpoint: String,
        anonymous: bool,
        local_sign: Option<LocalSignOptions>,
    },
}

/// Local-dev signing credential for generating signed object URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSignOptions {
    pub base_url: String,
    pub access_id: String,
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub rid: Rid,
    pub name: String,
    pub cloud_name: String,
    pub public_base_url: Option<String>,
}

// ── Secrets ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSecret {
    pub rid: Rid,
    pub name: String,
    pub data: SecretData,
}

// ── Deployment ───────────────────────────────────────────────────

/// Deployment-specific configuration: what this process hosts and how it
/// reaches its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub rid: Rid,
    pub deploy_id: Option<String>,
    pub deployed_at: Option<SystemTime>,
    /// Rids of the gateways hosted by this process.
    pub hosted_gateways: Vec<Rid>,
    /// Configs of the services hosted by this process.
    pub hosted_services: Vec<HostedService>,
    pub auth_methods: Vec<ServiceAuth>,
    pub service_discovery: ServiceDiscovery,
    pub graceful_shutdown: Option<GracefulShutdown>,
    pub tracing: Option<TracingProvider>,
}

/// Address book mapping service name to base URL and accepted auth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiscovery {
    pub services: BTreeMap<String, ServiceLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLocation {
    pub base_url: String,
    pub auth_methods: Vec<ServiceAuth>,
}
