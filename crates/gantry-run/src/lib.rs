//! Runtime config generation for locally-run applications.
//!
//! [`generator::RuntimeConfigGenerator`] assembles the full infrastructure
//! graph for an environment (once, guarded), then produces per-process
//! launch configurations: one reduced runtime config per deployment unit,
//! plus the environment variables (scoped secrets, per-service config
//! blobs, listen address) each spawned process consumes at boot.

pub mod error;
pub mod generator;
pub mod infra;
pub mod launch;
pub mod scope;

pub use error::{GeneratorError, GeneratorResult};
pub use generator::{GatewaySettings, GeneratorParams, RuntimeConfigGenerator, ServiceAuthKey};
pub use infra::{
    AppDescriptor, BucketProviderConfig, InfraManager, PubSubProviderConfig,
    PubSubSubscriptionConfig, PubSubTopicConfig, RedisDatabaseConfig, RedisServerConfig,
    ServiceRoutes, SqlDatabaseConfig, SqlServerConfig,
};
pub use launch::{ProcConfig, ProcessPlan, free_localhost_addr};
pub use scope::{missing_secrets, secrets_used_by_services};
