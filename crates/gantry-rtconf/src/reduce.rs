//! Deployment reducer.
//!
//! Given the full graph and a chosen subset of hosted services/gateways,
//! computes the minimal sub-graph reachable from that subset via the usage
//! edges declared in the application metadata, and emits a self-contained
//! [`RuntimeConfig`]. Reduction is read-only over the builder: the same
//! subset against the same graph always yields identical content, so
//! multiple processes in one deployment agree on every shared Rid.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use gantry_core::AppMeta;

use crate::builder::Builder;
use crate::model::*;
use crate::rid::Rid;

/// Errors from reducing a deployment request.
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("no environment configured on the builder")]
    MissingEnvironment,

    #[error("hosted service not present in metadata: {0}")]
    UnknownService(String),

    #[error("hosted gateway not present in metadata: {0}")]
    UnknownGateway(String),

    #[error("connection pool references unknown role: {0}")]
    DanglingRole(Rid),

    #[error("hosted gateway not present in infra graph: {0}")]
    GatewayNotBuilt(String),
}

/// A single deployment-unit reduction request.
///
/// Created via [`Builder::deployment`]; consumed by
/// [`DeploymentBuilder::reduce_with_meta`].
pub struct DeploymentBuilder<'a> {
    builder: &'a Builder,
    rid: Rid,
    service_discovery: ServiceDiscovery,
    hosted_services: BTreeSet<String>,
    hosted_gateways: BTreeSet<String>,
}

impl Builder {
    /// Start a deployment reduction against this graph.
    pub fn deployment(&self, rid: Rid) -> DeploymentBuilder<'_> {
        DeploymentBuilder {
            builder: self,
            rid,
            service_discovery: ServiceDiscovery::default(),
            hosted_services: BTreeSet::new(),
            hosted_gateways: BTreeSet::new(),
        }
    }
}

impl DeploymentBuilder<'_> {
    /// Attach the address book the hosted subset uses to reach its siblings.
    pub fn service_discovery(mut self, sd: ServiceDiscovery) -> Self {
        self.service_discovery = sd;
        self
    }

    pub fn hosts_service(mut self, name: impl Into<String>) -> Self {
        self.hosted_services.insert(name.into());
        self
    }

    pub fn hosts_gateway(mut self, name: impl Into<String>) -> Self {
        self.hosted_gateways.insert(name.into());
        self
    }

    /// Reduce the graph to the subset reachable from the hosted services and
    /// gateways, using the metadata's declared usage edges.
    pub fn reduce_with_meta(self, meta: &AppMeta) -> Result<RuntimeConfig, ReduceError> {
        let b = self.builder;
        let environment = b.env.clone().ok_or(ReduceError::MissingEnvironment)?;

        // Requesting a name the metadata does not declare is a configuration
        // error; fail fast instead of emitting an empty config.
        for svc in &self.hosted_services {
            if meta.service(svc).is_none() {
                return Err(ReduceError::UnknownService(svc.clone()));
            }
        }
        for gw in &self.hosted_gateways {
            if meta.gateway(gw).is_none() {
                return Err(ReduceError::UnknownGateway(gw.clone()));
            }
        }

        let usage = Usage::for_services(meta, &self.hosted_services);

        let mut resources = Resources::default();
        let mut sql_role_rids = BTreeSet::new();
        let mut redis_role_rids = BTreeSet::new();

        for gw_name in &self.hosted_gateways {
            let gw = b
                .infra
                .gateways
                .iter()
                .find(|g| &g.name == gw_name)
                .ok_or_else(|| ReduceError::GatewayNotBuilt(gw_name.clone()))?;
            resources.gateways.push(gw.clone());
        }

        for cluster in &b.infra.sql_clusters {
            let databases: Vec<SqlDatabase> = cluster
                .databases
                .iter()
                .filter(|db| usage.databases.contains(&db.name))
                .cloned()
                .collect();
            if databases.is_empty() {
                continue;
            }
            for db in &databases {
                for pool in &db.conn_pools {
                    sql_role_rids.insert(pool.role_rid.clone());
                }
            }
            resources.sql_clusters.push(SqlCluster {
                rid: cluster.rid.clone(),
                servers: cluster.servers.clone(),
                databases,
            });
        }

        for cluster in &b.infra.redis_clusters {
            let databases: Vec<RedisDatabase> = cluster
                .databases
                .iter()
                .filter(|db| usage.cache_clusters.contains(&db.name))
                .cloned()
                .collect();
            if databases.is_empty() {
                continue;
            }
            for db in &databases {
                for pool in &db.conn_pools {
                    redis_role_rids.insert(pool.role_rid.clone());
                }
            }
            resources.redis_clusters.push(RedisCluster {
                rid: cluster.rid.clone(),
                servers: cluster.servers.clone(),
                databases,
            });
        }

        for cluster in &b.infra.pubsub_clusters {
            let topics: Vec<PubSubTopic> = cluster
                .topics
                .iter()
                .filter(|t| usage.topics.contains(&t.name))
                .cloned()
                .collect();
            if topics.is_empty() {
                continue;
            }
            // A process only runs the subscriptions owned by its hosted
            // services; publishing needs the topic alone.
            let subscriptions: Vec<PubSubSubscription> = cluster
                .subscriptions
                .iter()
                .filter(|s| usage.subscriptions.contains(&(s.topic_name.clone(), s.name.clone())))
                .cloned()
                .collect();
            resources.pubsub_clusters.push(PubSubCluster {
                rid: cluster.rid.clone(),
                provider: cluster.provider.clone(),
                topics,
                subscriptions,
            });
        }

        for cluster in &b.infra.bucket_clusters {
            let buckets: Vec<Bucket> = cluster
                .buckets
                .iter()
                .filter(|bk| usage.buckets.contains(&bk.name))
                .cloned()
                .collect();
            if buckets.is_empty() {
                continue;
            }
            resources.bucket_clusters.push(BucketCluster {
                rid: cluster.rid.clone(),
                provider: cluster.provider.clone(),
                buckets,
            });
        }

        resources.app_secrets = b
            .infra
            .app_secrets
            .iter()
            .filter(|s| usage.secrets.contains(&s.name))
            .cloned()
            .collect();

        // Every pool's role must resolve; a dangling Rid means the graph was
        // assembled inconsistently.
        let mut credentials = Credentials::default();
        for rid in &sql_role_rids {
            let role = b
                .infra
                .sql_role_by_rid(rid)
                .ok_or_else(|| ReduceError::DanglingRole(rid.clone()))?;
            credentials.sql_roles.push(role.clone());
        }
        for rid in &redis_role_rids {
            let role = b
                .infra
                .redis_role_by_rid(rid)
                .ok_or_else(|| ReduceError::DanglingRole(rid.clone()))?;
            credentials.redis_roles.push(role.clone());
        }

        let hosted_services: Vec<HostedService> = self
            .hosted_services
            .iter()
            .map(|name| {
                b.service_configs.get(name).cloned().unwrap_or(HostedService {
                    name: name.clone(),
                    log_config: None,
                    worker_threads: None,
                })
            })
            .collect();

        let hosted_gateways: Vec<Rid> =
            resources.gateways.iter().map(|g| g.rid.clone()).collect();

        debug!(
            services = hosted_services.len(),
            gateways = hosted_gateways.len(),
            sql_clusters = resources.sql_clusters.len(),
            pubsub_clusters = resources.pubsub_clusters.len(),
            "deployment reduced"
        );

        Ok(RuntimeConfig {
            environment,
            platform: b.platform.clone(),
            infra: Infrastructure { credentials, resources },
            deployment: DeploymentConfig {
                rid: self.rid,
                deploy_id: b.deploy_id.clone(),
                deployed_at: b.deployed_at,
                hosted_gateways,
                hosted_services,
                auth_methods: b.auth_methods.clone(),
                service_discovery: self.service_discovery,
                graceful_shutdown: b.graceful_shutdown.clone(),
                tracing: b.tracing.clone(),
            },
        })
    }
}

/// The usage closure for a set of hosted services, read off the metadata.
struct Usage {
    databases: BTreeSet<String>,
    topics: BTreeSet<String>,
    subscriptions: BTreeSet<(String, String)>,
    cache_clusters: BTreeSet<String>,
    buckets: BTreeSet<String>,
    secrets: BTreeSet<String>,
}

impl Usage {
    fn for_services(meta: &AppMeta, hosted: &BTreeSet<String>) -> Self {
        let mut usage = Usage {
            databases: BTreeSet::new(),
            topics: BTreeSet::new(),
            subscriptions: BTreeSet::new(),
            cache_clusters: BTreeSet::new(),
            buckets: BTreeSet::new(),
            secrets: BTreeSet::new(),
        };

        for svc in meta.svcs.iter().filter(|s| hosted.contains(&s.name)) {
            usage.databases.extend(svc.databases.iter().cloned());
            usage.buckets.extend(svc.buckets.iter().cloned());
        }

        for topic in &meta.pubsub_topics {
            let publishes = topic.publishers.iter().any(|p| hosted.contains(p));
            let mut subscribes = false;
            for sub in &topic.subscriptions {
                if hosted.contains(&sub.service_name) {
                    subscribes = true;
                    usage
                        .subscriptions
                        .insert((topic.name.clone(), sub.name.clone()));
                }
            }
            if publishes || subscribes {
                usage.topics.insert(topic.name.clone());
            }
        }

        for cluster in &meta.cache_clusters {
            if cluster.keyspaces.iter().any(|k| hosted.contains(&k.service)) {
                usage.cache_clusters.insert(cluster.name.clone());
            }
        }

        for pkg in &meta.pkgs {
            let shared = pkg.service_name.is_none();
            let owned = pkg
                .service_name
                .as_ref()
                .is_some_and(|s| hosted.contains(s));
            if shared || owned {
                usage.secrets.extend(pkg.secrets.iter().cloned());
            }
        }

        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::*;

    fn sample_meta() -> AppMeta {
        AppMeta {
            svcs: vec![
                Service {
                    name: "shop".into(),
                    databases: vec!["orders".into()],
                    buckets: vec!["media".into()],
                },
                Service { name: "mailer".into(), ..Default::default() },
            ],
            gateways: vec![GatewayMeta { name: "api".into() }],
            sql_databases: vec![SqlDatabaseMeta { name: "orders".into() }],
            pubsub_topics: vec![PubSubTopicMeta {
                name: "order-events".into(),
                delivery_guarantee: "at-least-once".into(),
                ordering_key: None,
                publishers: vec!["shop".into()],
                subscriptions: vec![SubscriptionMeta {
                    name: "send-receipt".into(),
                    service_name: "mailer".into(),
                }],
            }],
            cache_clusters: vec![],
            buckets: vec![BucketMeta { name: "media".into(), public: false }],
            pkgs: vec![PackageMeta {
                rel_path: "shop".into(),
                service_name: Some("shop".into()),
                secrets: vec!["StripeKey".into()],
            }],
        }
    }

    fn sample_builder(meta: &AppMeta) -> Builder {
        let mut b = Builder::new();
        b.env(Environment {
            app_id: "demo".into(),
            app_slug: None,
            env_id: "local".into(),
            env_name: "local".into(),
            env_type: EnvType::Development,
            cloud: CloudKind::Local,
        });
        b.auth_methods(vec![ServiceAuth::SigningKey {
            keys: vec![AuthKey { id: 1, data: SecretData::embedded("k") }],
        }]);
        for svc in &meta.svcs {
            b.service_config(HostedService {
                name: svc.name.clone(),
                log_config: None,
                worker_threads: None,
            });
        }

        b.infra.gateway(Gateway {
            rid: Rid::fresh(),
            name: "api".into(),
            base_url: "http://localhost:4000".into(),
            hostnames: vec![],
            cors: CorsPolicy {
                debug: false,
                disable_credentials: false,
                extra_allowed_headers: vec![],
                extra_exposed_headers: vec![],
                allowed_origins_with_credentials: CredentialedOrigins::UnsafeAllowAll,
                allowed_origins_without_credentials: vec!["*".into()],
                allow_private_network_access: true,
            },
        });

        let cluster_rid = Rid::fresh();
        let role_rid = Rid::role(&cluster_rid, "app");
        b.infra.sql_role(SqlRole {
            rid: role_rid.clone(),
            username: "app".into(),
            password: SecretData::embedded("pw"),
            client_cert_rid: None,
        });
        b.infra
            .sql_cluster(SqlCluster::new(cluster_rid))
            .sql_database(SqlDatabase {
                rid: Rid::fresh(),
                name: "orders".into(),
                cloud_name: "orders".into(),
                conn_pools: vec![],
            })
            .connection_pool(SqlConnectionPool {
                is_readonly: false,
                role_rid,
                min_connections: 0,
                max_connections: 10,
            });

        b.infra
            .pubsub_cluster(PubSubCluster {
                rid: Rid::fresh(),
                provider: PubSubProvider::Nsq { hosts: vec!["localhost:4150".into()] },
                topics: vec![],
                subscriptions: vec![],
            })
            .topic(PubSubTopic {
                rid: Rid::fresh(),
                name: "order-events".into(),
                cloud_name: "order-events".into(),
                delivery_guarantee: DeliveryGuarantee::AtLeastOnce,
                ordering_attr: None,
            })
            .subscription(PubSubSubscription {
                rid: Rid::fresh(),
                topic_name: "order-events".into(),
                name: "send-receipt".into(),
                topic_cloud_name: "order-events".into(),
                cloud_name: "send-receipt".into(),
                push_only: false,
            });

        b.infra
            .bucket_cluster(BucketCluster {
                rid: Rid::fresh(),
                provider: BucketProvider::Gcs {
                    endpoint: "http://localhost:9000".into(),
                    anonymous: true,
                    local_sign: None,
                },
                buckets: vec![],
            })
            .bucket(Bucket {
                rid: Rid::fresh(),
                name: "media".into(),
                cloud_name: "media".into(),
                public_base_url: None,
            });

        b.infra.app_secret(AppSecret {
            rid: Rid::fresh(),
            name: "StripeKey".into(),
            data: SecretData::embedded("sk_test"),
        });

        b
    }

    #[test]
    fn reduction_is_deterministic() {
        let meta = sample_meta();
        let b = sample_builder(&meta);
        let rid = Rid::from("res_deploy");

        let first = b
            .deployment(rid.clone())
            .hosts_service("shop")
            .reduce_with_meta(&meta)
            .unwrap();
        let second = b
            .deployment(rid)
            .hosts_service("shop")
            .reduce_with_meta(&meta)
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn reduction_prunes_to_usage_closure() {
        let meta = sample_meta();
        let b = sample_builder(&meta);

        let shop = b
            .deployment(Rid::fresh())
            .hosts_service("shop")
            .reduce_with_meta(&meta)
            .unwrap();
        assert_eq!(shop.infra.resources.sql_clusters.len(), 1);
        assert_eq!(shop.infra.resources.bucket_clusters.len(), 1);
        assert_eq!(shop.infra.resources.app_secrets.len(), 1);
        // shop publishes: topic present, mailer's subscription is not.
        assert_eq!(shop.infra.resources.pubsub_clusters[0].topics.len(), 1);
        assert!(shop.infra.resources.pubsub_clusters[0].subscriptions.is_empty());
        assert_eq!(shop.infra.credentials.sql_roles.len(), 1);
        assert!(shop.infra.resources.gateways.is_empty());

        let mailer = b
            .deployment(Rid::fresh())
            .hosts_service("mailer")
            .reduce_with_meta(&meta)
            .unwrap();
        assert!(mailer.infra.resources.sql_clusters.is_empty());
        assert!(mailer.infra.resources.bucket_clusters.is_empty());
        assert!(mailer.infra.resources.app_secrets.is_empty());
        assert_eq!(mailer.infra.resources.pubsub_clusters[0].subscriptions.len(), 1);
        assert!(mailer.infra.credentials.sql_roles.is_empty());
    }

    #[test]
    fn shared_rids_agree_across_processes() {
        let meta = sample_meta();
        let b = sample_builder(&meta);

        let shop = b
            .deployment(Rid::fresh())
            .hosts_service("shop")
            .reduce_with_meta(&meta)
            .unwrap();
        let all = b
            .deployment(Rid::fresh())
            .hosts_service("shop")
            .hosts_service("mailer")
            .hosts_gateway("api")
            .reduce_with_meta(&meta)
            .unwrap();

        assert_eq!(shop.deployment.auth_methods, all.deployment.auth_methods);
        assert_eq!(
            shop.infra.resources.sql_clusters[0].rid,
            all.infra.resources.sql_clusters[0].rid,
        );
        assert_eq!(
            shop.infra.credentials.sql_roles[0].rid,
            all.infra.credentials.sql_roles[0].rid,
        );
    }

    #[test]
    fn unknown_names_fail_fast() {
        let meta = sample_meta();
        let b = sample_builder(&meta);

        let err = b
            .deployment(Rid::fresh())
            .hosts_gateway("backoffice")
            .reduce_with_meta(&meta)
            .unwrap_err();
        assert!(matches!(err, ReduceError::UnknownGateway(name) if name == "backoffice"));

        let err = b
            .deployment(Rid::fresh())
            .hosts_service("ghost")
            .reduce_with_meta(&meta)
            .unwrap_err();
        assert!(matches!(err, ReduceError::UnknownService(name) if name == "ghost"));
    }

    #[test]
    fn dangling_role_is_an_error() {
        let meta = sample_meta();
        let mut b = sample_builder(&meta);

        // Wire a pool to a role that was never registered.
        b.infra
            .sql_cluster(SqlCluster::new(Rid::fresh()))
            .sql_database(SqlDatabase {
                rid: Rid::fresh(),
                name: "orders".into(),
                cloud_name: "orders".into(),
                conn_pools: vec![],
            })
            .connection_pool(SqlConnectionPool {
                is_readonly: false,
                role_rid: Rid::from("role:res_missing:nobody"),
                min_connections: 0,
                max_connections: 0,
            });

        let err = b
            .deployment(Rid::fresh())
            .hosts_service("shop")
            .reduce_with_meta(&meta)
            .unwrap_err();
        assert!(matches!(err, ReduceError::DanglingRole(_)));
    }

    #[test]
    fn missing_environment_is_an_error() {
        let meta = sample_meta();
        let b = Builder::new();
        let err = b
            .deployment(Rid::fresh())
            .reduce_with_meta(&meta)
            .unwrap_err();
        assert!(matches!(err, ReduceError::MissingEnvironment));
    }
}
