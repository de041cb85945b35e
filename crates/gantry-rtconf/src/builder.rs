//! Infra graph builder.
//!
//! An additive, idempotent-per-call builder for the full resource graph of
//! an environment. Every add is a get-or-create keyed by the logical
//! identity of the object (gateway name, cluster Rid, role Rid, nested
//! names within a cluster), so adding the same object twice never allocates
//! a second identity. Cross-references stay Rid-based; the arenas own every
//! resource and handles are plain indexes into them, never live aliases.

use std::collections::BTreeMap;
use std::time::SystemTime;

use tracing::debug;

use crate::model::*;
use crate::rid::Rid;

/// Builds the full resource graph for one environment.
///
/// Populate it once (environment, platform, defaults, infra), then call
/// [`Builder::deployment`] any number of times to reduce it for individual
/// deployment units. Reduction never mutates the builder.
#[derive(Debug, Default)]
pub struct Builder {
    pub(crate) env: Option<Environment>,
    pub(crate) deploy_id: Option<String>,
    pub(crate) deployed_at: Option<SystemTime>,
    pub(crate) platform: Option<PlatformConfig>,
    pub(crate) tracing: Option<TracingProvider>,
    pub(crate) service_configs: BTreeMap<String, HostedService>,
    pub(crate) auth_methods: Vec<ServiceAuth>,
    pub(crate) graceful_shutdown: Option<GracefulShutdown>,
    pub infra: InfraBuilder,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the environment identity. Intended to be called exactly once.
    pub fn env(&mut self, env: Environment) -> &mut Self {
        self.env = Some(env);
        self
    }

    pub fn deploy_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.deploy_id = Some(id.into());
        self
    }

    pub fn deployed_at(&mut self, at: SystemTime) -> &mut Self {
        self.deployed_at = Some(at);
        self
    }

    pub fn platform(&mut self, platform: PlatformConfig) -> &mut Self {
        self.platform = Some(platform);
        self
    }

    pub fn tracing_provider(&mut self, provider: TracingProvider) -> &mut Self {
        self.tracing = Some(provider);
        self
    }

    /// Register the per-service runtime config, keyed by service name.
    pub fn service_config(&mut self, config: HostedService) -> &mut Self {
        self.service_configs.insert(config.name.clone(), config);
        self
    }

    /// Set the auth methods every hosted service accepts.
    pub fn auth_methods(&mut self, methods: Vec<ServiceAuth>) -> &mut Self {
        self.auth_methods = methods;
        self
    }

    pub fn default_graceful_shutdown(&mut self, gs: GracefulShutdown) -> &mut Self {
        self.graceful_shutdown = Some(gs);
        self
    }

    /// The auth methods configured via [`Builder::auth_methods`].
    pub fn configured_auth_methods(&self) -> &[ServiceAuth] {
        &self.auth_methods
    }
}

/// Arena-backed registries for every infrastructure resource kind.
#[derive(Debug, Default)]
pub struct InfraBuilder {
    pub(crate) gateways: Vec<Gateway>,
    gateway_idx: BTreeMap<String, usize>,

    pub(crate) sql_clusters: Vec<SqlCluster>,
    sql_cluster_idx: BTreeMap<Rid, usize>,
    pub(crate) sql_roles: Vec<SqlRole>,
    sql_role_idx: BTreeMap<Rid, usize>,

    pub(crate) redis_clusters: Vec<RedisCluster>,
    redis_cluster_idx: BTreeMap<Rid, usize>,
    pub(crate) redis_roles: Vec<RedisRole>,
    redis_role_idx: BTreeMap<Rid, usize>,

    pub(crate) pubsub_clusters: Vec<PubSubCluster>,
    pubsub_cluster_idx: BTreeMap<Rid, usize>,

    pub(crate) bucket_clusters: Vec<BucketCluster>,
    bucket_cluster_idx: BTreeMap<Rid, usize>,

    pub(crate) app_secrets: Vec<AppSecret>,
    app_secret_idx: BTreeMap<String, usize>,
}

impl InfraBuilder {
    /// Add a gateway, keyed by name.
    pub fn gateway(&mut self, gw: Gateway) -> &Gateway {
        let idx = match self.gateway_idx.get(&gw.name) {
            Some(&i) => i,
            None => {
                debug!(name = %gw.name, rid = %gw.rid, "gateway added");
                self.gateways.push(gw);
                let i = self.gateways.len() - 1;
                self.gateway_idx.insert(self.gateways[i].name.clone(), i);
                i
            }
        };
        &self.gateways[idx]
    }

    /// Add a SQL cluster, keyed by Rid, returning a handle for nesting
    /// servers and databases under it.
    pub fn sql_cluster(&mut self, cluster: SqlCluster) -> SqlClusterHandle<'_> {
        let idx = match self.sql_cluster_idx.get(&cluster.rid) {
            Some(&i) => i,
            None => {
                self.sql_clusters.push(cluster);
                let i = self.sql_clusters.len() - 1;
                self.sql_cluster_idx.insert(self.sql_clusters[i].rid.clone(), i);
                i
            }
        };
        SqlClusterHandle { infra: self, idx }
    }

    /// Add a SQL role, keyed by Rid. Adding a role with an existing Rid
    /// returns the original; the credentials never fork.
    pub fn sql_role(&mut self, role: SqlRole) -> &SqlRole {
        let idx = match self.sql_role_idx.get(&role.rid) {
            Some(&i) => i,
            None => {
                self.sql_roles.push(role);
                let i = self.sql_roles.len() - 1;
                self.sql_role_idx.insert(self.sql_roles[i].rid.clone(), i);
                i
            }
        };
        &self.sql_roles[idx]
    }

    /// Add a redis cluster, keyed by Rid.
    pub fn redis_cluster(&mut self, cluster: RedisCluster) -> RedisClusterHandle<'_> {
        let idx = match self.redis_cluster_idx.get(&cluster.rid) {
            Some(&i) => i,
            None => {
                self.redis_clusters.push(cluster);
                let i = self.redis_clusters.len() - 1;
                self.redis_cluster_idx.insert(self.redis_clusters[i].rid.clone(), i);
                i
            }
        };
        RedisClusterHandle { infra: self, idx }
    }

    /// Get-or-create a redis role by Rid. The closure runs only when the
    /// role does not exist yet.
    pub fn redis_role_with(&mut self, rid: Rid, make: impl FnOnce() -> RedisRole) -> &RedisRole {
        let idx = match self.redis_role_idx.get(&rid) {
            Some(&i) => i,
            None => {
                self.redis_roles.push(make());
                let i = self.redis_roles.len() - 1;
                self.redis_role_idx.insert(rid, i);
                i
            }
        };
        &self.redis_roles[idx]
    }

    /// Add a pub/sub cluster, keyed by Rid.
    pub fn pubsub_cluster(&mut self, cluster: PubSubCluster) -> PubSubClusterHandle<'_> {
        let idx = match self.pubsub_cluster_idx.get(&cluster.rid) {
            Some(&i) => i,
            None => {
                self.pubsub_clusters.push(cluster);
                let i = self.pubsub_clusters.len() - 1;
                self.pubsub_cluster_idx.insert(self.pubsub_clusters[i].rid.clone(), i);
                i
            }
        };
        PubSubClusterHandle { infra: self, idx }
    }

    /// Add a bucket cluster, keyed by Rid.
    pub fn bucket_cluster(&mut self, cluster: BucketCluster) -> BucketClusterHandle<'_> {
        let idx = match self.bucket_cluster_idx.get(&cluster.rid) {
            Some(&i) => i,
            None => {
                self.bucket_clusters.push(cluster);
                let i = self.bucket_clusters.len() - 1;
                self.bucket_cluster_idx.insert(self.bucket_clusters[i].rid.clone(), i);
                i
            }
        };
        BucketClusterHandle { infra: self, idx }
    }

    /// Add an app secret, keyed by secret name.
    pub fn app_secret(&mut self, secret: AppSecret) -> &AppSecret {
        let idx = match self.app_secret_idx.get(&secret.name) {
            Some(&i) => i,
            None => {
                self.app_secrets.push(secret);
                let i = self.app_secrets.len() - 1;
                self.app_secret_idx.insert(self.app_secrets[i].name.clone(), i);
                i
            }
        };
        &self.app_secrets[idx]
    }

    pub(crate) fn sql_role_by_rid(&self, rid: &Rid) -> Option<&SqlRole> {
        self.sql_role_idx.get(rid).map(|&i| &self.sql_roles[i])
    }

    pub(crate) fn redis_role_by_rid(&self, rid: &Rid) -> Option<&RedisRole> {
        self.redis_role_idx.get(rid).map(|&i| &self.redis_roles[i])
    }
}

/// Handle to a SQL cluster in the arena.
pub struct SqlClusterHandle<'a> {
    infra: &'a mut InfraBuilder,
    idx: usize,
}

impl SqlClusterHandle<'_> {
    pub fn rid(&self) -> Rid {
        self.infra.sql_clusters[self.idx].rid.clone()
    }

    /// Add a server to the cluster, keyed by Rid.
    pub fn sql_server(&mut self, server: SqlServer) -> &mut Self {
        let cluster = &mut self.infra.sql_clusters[self.idx];
        if !cluster.servers.iter().any(|s| s.rid == server.rid) {
            cluster.servers.push(server);
        }
        self
    }

    /// Add a database to the cluster, keyed by logical name.
    pub fn sql_database(&mut self, db: SqlDatabase) -> SqlDatabaseHandle<'_> {
        let cluster = &mut self.infra.sql_clusters[self.idx];
        let db_idx = match cluster.databases.iter().position(|d| d.name == db.name) {
            Some(i) => i,
            None => {
                cluster.databases.push(db);
                cluster.databases.len() - 1
            }
        };
        SqlDatabaseHandle { infra: &mut *self.infra, cluster_idx: self.idx, db_idx }
    }
}

/// Handle to a database within a SQL cluster.
pub struct SqlDatabaseHandle<'a> {
    infra: &'a mut InfraBuilder,
    cluster_idx: usize,
    db_idx: usize,
}

impl SqlDatabaseHandle<'_> {
    pub fn connection_pool(&mut self, pool: SqlConnectionPool) -> &mut Self {
        self.infra.sql_clusters[self.cluster_idx].databases[self.db_idx]
            .conn_pools
            .push(pool);
        self
    }
}

/// Handle to a redis cluster in the arena.
pub struct RedisClusterHandle<'a> {
    infra: &'a mut InfraBuilder,
    idx: usize,
}

impl RedisClusterHandle<'_> {
    pub fn rid(&self) -> Rid {
        self.infra.redis_clusters[self.idx].rid.clone()
    }

    pub fn redis_server(&mut self, server: RedisServer) -> &mut Self {
        let cluster = &mut self.infra.redis_clusters[self.idx];
        if !cluster.servers.iter().any(|s| s.rid == server.rid) {
            cluster.servers.push(server);
        }
        self
    }

    pub fn redis_database(&mut self, db: RedisDatabase) -> RedisDatabaseHandle<'_> {
        let cluster = &mut self.infra.redis_clusters[self.idx];
        let db_idx = match cluster.databases.iter().position(|d| d.name == db.name) {
            Some(i) => i,
            None => {
                cluster.databases.push(db);
                cluster.databases.len() - 1
            }
        };
        RedisDatabaseHandle { infra: &mut *self.infra, cluster_idx: self.idx, db_idx }
    }
}

/// Handle to a database within a redis cluster.
pub struct RedisDatabaseHandle<'a> {
    infra: &'a mut InfraBuilder,
    cluster_idx: usize,
    db_idx: usize,
}

impl RedisDatabaseHandle<'_> {
    pub fn connection_pool(&mut self, pool: RedisConnectionPool) -> &mut Self {
        self.infra.redis_clusters[self.cluster_idx].databases[self.db_idx]
            .conn_pools
            .push(pool);
        self
    }
}

/// Handle to a pub/sub cluster in the arena.
pub struct PubSubClusterHandle<'a> {
    infra: &'a mut InfraBuilder,
    idx: usize,
}

impl PubSubClusterHandle<'_> {
    pub fn rid(&self) -> Rid {
        self.infra.pubsub_clusters[self.idx].rid.clone()
    }

    /// Add a topic, keyed by logical name.
    pub fn topic(&mut self, topic: PubSubTopic) -> &mut Self {
        let cluster = &mut self.infra.pubsub_clusters[self.idx];
        if !cluster.topics.iter().any(|t| t.name == topic.name) {
            cluster.topics.push(topic);
        }
        self
    }

    /// Add a subscription, keyed by (topic name, subscription name).
    pub fn subscription(&mut self, sub: PubSubSubscription) -> &mut Self {
        let cluster = &mut self.infra.pubsub_clusters[self.idx];
        if !cluster
            .subscriptions
            .iter()
            .any(|s| s.topic_name == sub.topic_name && s.name == sub.name)
        {
            cluster.subscriptions.push(sub);
        }
        self
    }
}

/// Handle to a bucket cluster in the arena.
pub struct BucketClusterHandle<'a> {
    infra: &'a mut InfraBuilder,
    idx: usize,
}

impl BucketClusterHandle<'_> {
    pub fn rid(&self) -> Rid {
        self.infra.bucket_clusters[self.idx].rid.clone()
    }

    /// Add a bucket, keyed by logical name.
    pub fn bucket(&mut self, bucket: Bucket) -> &mut Self {
        let cluster = &mut self.infra.bucket_clusters[self.idx];
        if !cluster.buckets.iter().any(|b| b.name == bucket.name) {
            cluster.buckets.push(bucket);
        }
        self
    }
}
