//! Downgrade to the legacy JSON wire format.
//!
//! Runtimes deployed before the binary config format understand a flat,
//! JSON-shaped structure. The downgrade inlines every secret as plaintext:
//! the legacy format has no secret-reference mode, so there is nothing else
//! it could carry. Roles are resolved into each database entry rather than
//! referenced, and durations become integral milliseconds.

use std::collections::BTreeMap;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::*;
use crate::rid::Rid;

#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("secret value for {0} is not valid UTF-8")]
    NonUtf8Secret(String),

    #[error("connection pool references unknown role: {0}")]
    DanglingRole(Rid),

    #[error("cluster {0} has no primary server")]
    NoPrimaryServer(Rid),
}

/// The legacy runtime configuration, as JSON-encoded for old runtimes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyConfig {
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_slug: Option<String>,
    pub env_id: String,
    pub env_name: String,
    pub env_type: String,
    pub env_cloud: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<u64>,

    pub auth_keys: Vec<LegacyAuthKey>,
    pub hosted_services: Vec<String>,
    pub gateways: Vec<LegacyGateway>,
    pub service_discovery: BTreeMap<String, LegacyServiceLocation>,

    pub sql_servers: Vec<LegacySqlServer>,
    pub sql_databases: Vec<LegacySqlDatabase>,
    pub redis_servers: Vec<LegacyRedisServer>,
    pub redis_databases: Vec<LegacyRedisDatabase>,
    pub pubsub_providers: Vec<LegacyPubSubProvider>,
    pub pubsub_topics: BTreeMap<String, LegacyPubSubTopic>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_sampling_rate: Option<f64>,

    pub shutdown_total_ms: Option<u64>,
    pub shutdown_hooks_ms: Option<u64>,
    pub shutdown_handlers_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyAuthKey {
    pub id: u32,
    /// Plaintext key material.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyGateway {
    pub name: String,
    pub base_url: String,
    pub hostnames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyServiceLocation {
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySqlServer {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_ca_cert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySqlDatabase {
    pub name: String,
    pub database_name: String,
    pub host: String,
    pub user: String,
    /// Plaintext password.
    pub password: String,
    pub min_connections: i32,
    pub max_connections: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRedisServer {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_ca_cert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRedisDatabase {
    pub name: String,
    pub host: String,
    pub database_idx: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Plaintext password, if the role carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub min_connections: i32,
    pub max_connections: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPubSubProvider {
    pub kind: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPubSubTopic {
    pub name: String,
    pub delivery_guarantee: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_key: Option<String>,
    pub subscriptions: Vec<String>,
}

fn plaintext(secret: &SecretData, what: &str) -> Result<String, LegacyError> {
    String::from_utf8(secret.expose().to_vec())
        .map_err(|_| LegacyError::NonUtf8Secret(what.to_string()))
}

/// Downgrade a canonical runtime configuration to the legacy shape.
pub fn to_legacy(cfg: &RuntimeConfig) -> Result<LegacyConfig, LegacyError> {
    let mut out = LegacyConfig {
        app_id: cfg.environment.app_id.clone(),
        app_slug: cfg.environment.app_slug.clone(),
        env_id: cfg.environment.env_id.clone(),
        env_name: cfg.environment.env_name.clone(),
        env_type: format!("{:?}", cfg.environment.env_type).to_lowercase(),
        env_cloud: format!("{:?}", cfg.environment.cloud).to_lowercase(),
        deploy_id: cfg.deployment.deploy_id.clone(),
        deployed_at: cfg.deployment.deployed_at.and_then(|t| {
            t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
        }),
        ..Default::default()
    };

    if let Some(platform) = &cfg.platform {
        for key in &platform.signing_keys {
            out.auth_keys.push(LegacyAuthKey {
                id: key.id,
                data: plaintext(&key.data, "auth key")?,
            });
        }
    }

    out.hosted_services = cfg
        .deployment
        .hosted_services
        .iter()
        .map(|s| s.name.clone())
        .collect();

    for gw in &cfg.infra.resources.gateways {
        out.gateways.push(LegacyGateway {
            name: gw.name.clone(),
            base_url: gw.base_url.clone(),
            hostnames: gw.hostnames.clone(),
        });
    }

    for (name, loc) in &cfg.deployment.service_discovery.services {
        out.service_discovery.insert(
            name.clone(),
            LegacyServiceLocation { base_url: loc.base_url.clone() },
        );
    }

    let sql_roles: BTreeMap<&Rid, &SqlRole> = cfg
        .infra
        .credentials
        .sql_roles
        .iter()
        .map(|r| (&r.rid, r))
        .collect();
    for cluster in &cfg.infra.resources.sql_clusters {
        let primary = cluster
            .servers
            .iter()
            .find(|s| s.kind == ServerKind::Primary)
            .ok_or_else(|| LegacyError::NoPrimaryServer(cluster.rid.clone()))?;
        out.sql_servers.push(LegacySqlServer {
            host: primary.host.clone(),
            server_ca_cert: primary.tls.as_ref().and_then(|t| t.server_ca_cert.clone()),
        });
        for db in &cluster.databases {
            for pool in &db.conn_pools {
                let role = sql_roles
                    .get(&pool.role_rid)
                    .ok_or_else(|| LegacyError::DanglingRole(pool.role_rid.clone()))?;
                out.sql_databases.push(LegacySqlDatabase {
                    name: db.name.clone(),
                    database_name: db.cloud_name.clone(),
                    host: primary.host.clone(),
                    user: role.username.clone(),
                    password: plaintext(&role.password, &db.name)?,
                    min_connections: pool.min_connections,
                    max_connections: pool.max_connections,
                });
            }
        }
    }

    let redis_roles: BTreeMap<&Rid, &RedisRole> = cfg
        .infra
        .credentials
        .redis_roles
        .iter()
        .map(|r| (&r.rid, r))
        .collect();
    for cluster in &cfg.infra.resources.redis_clusters {
        let primary = cluster
            .servers
            .iter()
            .find(|s| s.kind == ServerKind::Primary)
            .ok_or_else(|| LegacyError::NoPrimaryServer(cluster.rid.clone()))?;
        out.redis_servers.push(LegacyRedisServer {
            host: primary.host.clone(),
            server_ca_cert: primary.tls.as_ref().and_then(|t| t.server_ca_cert.clone()),
        });
        for db in &cluster.databases {
            for pool in &db.conn_pools {
                let role = redis_roles
                    .get(&pool.role_rid)
                    .ok_or_else(|| LegacyError::DanglingRole(pool.role_rid.clone()))?;
                let (user, password) = match &role.auth {
                    Some(RedisAuth::Acl { username, password }) => {
                        (Some(username.clone()), Some(plaintext(password, &db.name)?))
                    }
                    Some(RedisAuth::AuthString(secret)) => {
                        (None, Some(plaintext(secret, &db.name)?))
                    }
                    None => (None, None),
                };
                out.redis_databases.push(LegacyRedisDatabase {
                    name: db.name.clone(),
                    host: primary.host.clone(),
                    database_idx: db.database_idx,
                    key_prefix: db.key_prefix.clone(),
                    user,
                    password,
                    min_connections: pool.min_connections,
                    max_connections: pool.max_connections,
                });
            }
        }
    }

    for cluster in &cfg.infra.resources.pubsub_clusters {
        match &cluster.provider {
            PubSubProvider::Nsq { hosts } => out.pubsub_providers.push(LegacyPubSubProvider {
                kind: "nsq".into(),
                hosts: hosts.clone(),
            }),
        }
        for topic in &cluster.topics {
            let subscriptions = cluster
                .subscriptions
                .iter()
                .filter(|s| s.topic_name == topic.name)
                .map(|s| s.name.clone())
                .collect();
            out.pubsub_topics.insert(
                topic.name.clone(),
                LegacyPubSubTopic {
                    name: topic.cloud_name.clone(),
                    delivery_guarantee: match topic.delivery_guarantee {
                        DeliveryGuarantee::AtLeastOnce => "at-least-once".into(),
                        DeliveryGuarantee::ExactlyOnce => "exactly-once".into(),
                    },
                    ordering_key: topic.ordering_attr.clone(),
                    subscriptions,
                },
            );
        }
    }

    if let Some(tracing) = &cfg.deployment.tracing {
        out.trace_endpoint = Some(tracing.endpoint.clone());
        out.trace_sampling_rate = Some(tracing.sampling_rate);
    }

    if let Some(gs) = &cfg.deployment.graceful_shutdown {
        out.shutdown_total_ms = Some(gs.total.as_millis() as u64);
        out.shutdown_hooks_ms = Some(gs.shutdown_hooks.as_millis() as u64);
        out.shutdown_handlers_ms = Some(gs.handlers.as_millis() as u64);
    }

    Ok(out)
}
