//! Application metadata model.
//!
//! `AppMeta` is the parsed, language-agnostic description of an application:
//! its services, gateways, databases, pub/sub topics, cache clusters, object
//! buckets, and packages. It is produced by the app parser and consumed by
//! the runtime configuration builder, which treats it as already validated.

use serde::{Deserialize, Serialize};

/// Parsed application metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppMeta {
    /// Declared services, in declaration order.
    pub svcs: Vec<Service>,
    /// Declared API gateways.
    pub gateways: Vec<GatewayMeta>,
    /// Declared SQL databases.
    pub sql_databases: Vec<SqlDatabaseMeta>,
    /// Declared pub/sub topics with their subscriptions.
    pub pubsub_topics: Vec<PubSubTopicMeta>,
    /// Declared cache clusters.
    pub cache_clusters: Vec<CacheClusterMeta>,
    /// Declared object storage buckets.
    pub buckets: Vec<BucketMeta>,
    /// Packages making up the application, with their resource usage.
    pub pkgs: Vec<PackageMeta>,
}

/// A declared service and the resources it uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// Names of SQL databases this service uses.
    #[serde(default)]
    pub databases: Vec<String>,
    /// Names of buckets this service uses.
    #[serde(default)]
    pub buckets: Vec<String>,
}

/// A declared API gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMeta {
    pub name: String,
}

/// A declared SQL database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlDatabaseMeta {
    pub name: String,
}

/// A declared pub/sub topic.
///
/// The delivery guarantee is carried as the raw string from the parser;
/// mapping it onto the runtime enum (and rejecting unknown values) is the
/// config builder's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubTopicMeta {
    pub name: String,
    pub delivery_guarantee: String,
    #[serde(default)]
    pub ordering_key: Option<String>,
    /// Services that publish to this topic.
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionMeta>,
}

/// A subscription on a pub/sub topic, owned by a single service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionMeta {
    pub name: String,
    pub service_name: String,
}

/// A declared cache cluster and the keyspaces carved out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheClusterMeta {
    pub name: String,
    #[serde(default)]
    pub keyspaces: Vec<CacheKeyspaceMeta>,
}

/// A cache keyspace, owned by a single service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheKeyspaceMeta {
    pub service: String,
}

/// A declared object storage bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMeta {
    pub name: String,
    /// Whether objects in the bucket are publicly reachable.
    #[serde(default)]
    pub public: bool,
}

/// A package within the application.
///
/// A package with no `service_name` is shared/global code; its secrets are
/// visible to every service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMeta {
    pub rel_path: String,
    #[serde(default)]
    pub service_name: Option<String>,
    /// Secret names this package loads.
    #[serde(default)]
    pub secrets: Vec<String>,
}

impl AppMeta {
    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.svcs.iter().find(|s| s.name == name)
    }

    /// Look up a gateway by name.
    pub fn gateway(&self, name: &str) -> Option<&GatewayMeta> {
        self.gateways.iter().find(|g| g.name == name)
    }

    /// Names of all declared services, in declaration order.
    pub fn service_names(&self) -> Vec<&str> {
        self.svcs.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_by_name() {
        let meta = AppMeta {
            svcs: vec![Service {
                name: "billing".into(),
                databases: vec!["invoices".into()],
                ..Default::default()
            }],
            gateways: vec![GatewayMeta { name: "api".into() }],
            ..Default::default()
        };

        assert!(meta.service("billing").is_some());
        assert!(meta.service("nope").is_none());
        assert!(meta.gateway("api").is_some());
        assert_eq!(meta.service_names(), vec!["billing"]);
    }

    #[test]
    fn meta_json_round_trips() {
        let meta = AppMeta {
            pubsub_topics: vec![PubSubTopicMeta {
                name: "orders".into(),
                delivery_guarantee: "at-least-once".into(),
                ordering_key: None,
                publishers: vec!["shop".into()],
                subscriptions: vec![SubscriptionMeta {
                    name: "fulfil".into(),
                    service_name: "warehouse".into(),
                }],
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: AppMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
