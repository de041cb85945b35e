//! Process plan materialization.
//!
//! Turns the built infra graph into concrete launch configurations: one
//! process per service, one process for everything, or a plain environment
//! block for test runners. Every process receives a reduced runtime config
//! plus the environment variables it reads at boot.

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};

use tracing::debug;

use gantry_rtconf::builder::Builder;
use gantry_rtconf::encode::{compress_blob, encode_current, encode_legacy};
use gantry_rtconf::model::{RuntimeConfig, ServiceAuth, ServiceDiscovery, ServiceLocation};
use gantry_rtconf::rid::Rid;

use crate::error::{GeneratorError, GeneratorResult};
use crate::generator::{
    APP_SECRETS_ENV_VAR, LISTEN_ENV_VAR, META_ENV_VAR, RUNTIME_CONFIG_ENV_VAR,
    RUNTIME_LIB_ENV_VAR, RuntimeConfigGenerator,
};
use crate::infra::{AppDescriptor, InfraManager, ServiceRoutes};
use crate::scope;

/// Launch configuration for one process.
#[derive(Debug, Clone)]
pub struct ProcConfig {
    pub runtime: RuntimeConfig,
    pub listen_addr: SocketAddr,
    /// Additional variables beyond the runtime config itself, in insertion
    /// order (scoped secrets, per-service config blobs).
    pub extra_env: Vec<(String, String)>,
}

impl ProcConfig {
    fn new(runtime: RuntimeConfig, listen_addr: SocketAddr) -> Self {
        Self { runtime, listen_addr, extra_env: Vec::new() }
    }
}

/// The full set of processes for one deployment.
#[derive(Debug, Clone, Default)]
pub struct ProcessPlan {
    pub services: BTreeMap<String, ProcConfig>,
    pub gateways: BTreeMap<String, ProcConfig>,
}

impl<A: AppDescriptor, I: InfraManager> RuntimeConfigGenerator<A, I> {
    /// One process per service plus one per gateway, with a shared service
    /// discovery map wired through every config.
    pub fn proc_per_service(
        &self,
        routes: &mut dyn ServiceRoutes,
    ) -> GeneratorResult<ProcessPlan> {
        let graph = self.initialize()?;
        let meta = &self.params.meta;

        let mut addrs = BTreeMap::new();
        for svc in &meta.svcs {
            addrs.insert(
                svc.name.clone(),
                free_localhost_addr().map_err(GeneratorError::Allocation)?,
            );
        }
        let sd = assemble_service_discovery(&graph.builder, routes, &addrs);

        let mut plan = ProcessPlan::default();

        for svc in &meta.svcs {
            let runtime = graph
                .builder
                .deployment(Rid::fresh())
                .service_discovery(sd.clone())
                .hosts_service(svc.name.as_str())
                .reduce_with_meta(meta)?;

            let mut proc = ProcConfig::new(runtime, addrs[&svc.name]);
            let secrets = scope::secrets_used_by_services(meta, &[svc.name.as_str()]);
            proc.extra_env
                .push((APP_SECRETS_ENV_VAR.to_string(), self.encode_secrets(&secrets)));
            proc.extra_env
                .extend(self.encode_configs([svc.name.as_str()]));
            plan.services.insert(svc.name.clone(), proc);
        }

        for gw in &meta.gateways {
            let runtime = graph
                .builder
                .deployment(Rid::fresh())
                .service_discovery(sd.clone())
                .hosts_gateway(gw.name.as_str())
                .reduce_with_meta(meta)?;
            let proc =
                ProcConfig::new(runtime, free_localhost_addr().map_err(GeneratorError::Allocation)?);
            plan.gateways.insert(gw.name.clone(), proc);
        }

        debug!(
            services = plan.services.len(),
            gateways = plan.gateways.len(),
            "per-service process plan assembled"
        );
        Ok(plan)
    }

    /// A single process hosting every service and gateway. Calls between
    /// services stay in-process, so the discovery map is empty.
    pub fn all_in_one_proc(&self) -> GeneratorResult<ProcConfig> {
        let graph = self.initialize()?;
        let meta = &self.params.meta;

        let mut deployment = graph.builder.deployment(Rid::fresh());
        for svc in &meta.svcs {
            deployment = deployment.hosts_service(svc.name.as_str());
        }
        for gw in &meta.gateways {
            deployment = deployment.hosts_gateway(gw.name.as_str());
        }
        let runtime = deployment.reduce_with_meta(meta)?;

        let mut proc =
            ProcConfig::new(runtime, free_localhost_addr().map_err(GeneratorError::Allocation)?);
        let svc_names: Vec<&str> = meta.svcs.iter().map(|s| s.name.as_str()).collect();
        let secrets = scope::secrets_used_by_services(meta, &svc_names);
        proc.extra_env
            .push((APP_SECRETS_ENV_VAR.to_string(), self.encode_secrets(&secrets)));
        proc.extra_env.extend(self.encode_configs(svc_names));
        Ok(proc)
    }

    /// The environment block for a test runner: hosts everything, no listen
    /// address, secrets and configs inline.
    pub fn test_envs(&self, use_current_encoding: bool) -> GeneratorResult<Vec<(String, String)>> {
        let graph = self.initialize()?;
        let meta = &self.params.meta;

        let mut deployment = graph.builder.deployment(Rid::fresh());
        for svc in &meta.svcs {
            deployment = deployment.hosts_service(svc.name.as_str());
        }
        for gw in &meta.gateways {
            deployment = deployment.hosts_gateway(gw.name.as_str());
        }
        let runtime = deployment.reduce_with_meta(meta)?;

        let svc_names: Vec<&str> = meta.svcs.iter().map(|s| s.name.as_str()).collect();
        let secrets = scope::secrets_used_by_services(meta, &svc_names);

        let mut envs = vec![
            (APP_SECRETS_ENV_VAR.to_string(), self.encode_secrets(&secrets)),
            (
                RUNTIME_CONFIG_ENV_VAR.to_string(),
                encode_runtime(&runtime, use_current_encoding)?,
            ),
        ];
        envs.extend(self.encode_configs(svc_names));
        self.append_shared_envs(&mut envs)?;
        Ok(envs)
    }

    /// The full environment block for one planned process.
    pub fn proc_envs(
        &self,
        proc: &ProcConfig,
        use_current_encoding: bool,
    ) -> GeneratorResult<Vec<(String, String)>> {
        let mut envs = vec![(LISTEN_ENV_VAR.to_string(), proc.listen_addr.to_string())];
        envs.extend(proc.extra_env.iter().cloned());
        envs.push((
            RUNTIME_CONFIG_ENV_VAR.to_string(),
            encode_runtime(&proc.runtime, use_current_encoding)?,
        ));
        self.append_shared_envs(&mut envs)?;
        Ok(envs)
    }

    fn append_shared_envs(&self, envs: &mut Vec<(String, String)>) -> GeneratorResult<()> {
        if self.params.include_meta_env {
            let bytes = bincode::serialize(&self.params.meta)
                .map_err(gantry_rtconf::EncodeError::Binary)?;
            let blob = compress_blob(&bytes).map_err(gantry_rtconf::EncodeError::Compress)?;
            envs.push((META_ENV_VAR.to_string(), blob));
        }
        // Developers pointing at a local runtime library checkout get the
        // override forwarded verbatim.
        if let Ok(lib) = std::env::var(RUNTIME_LIB_ENV_VAR) {
            if !lib.is_empty() {
                envs.push((RUNTIME_LIB_ENV_VAR.to_string(), lib));
            }
        }
        Ok(())
    }
}

fn encode_runtime(runtime: &RuntimeConfig, use_current: bool) -> GeneratorResult<String> {
    let encoded = if use_current {
        encode_current(runtime)?
    } else {
        encode_legacy(runtime)?
    };
    Ok(encoded)
}

/// Register every service's address and build the shared discovery map.
/// Each entry advertises the signing-key auth the services accept.
fn assemble_service_discovery(
    builder: &Builder,
    routes: &mut dyn ServiceRoutes,
    addrs: &BTreeMap<String, SocketAddr>,
) -> ServiceDiscovery {
    let auth_methods: Vec<ServiceAuth> = builder.configured_auth_methods().to_vec();
    let mut sd = ServiceDiscovery::default();
    for (name, addr) in addrs {
        let base_url = routes.register_service(name, *addr);
        sd.services.insert(
            name.clone(),
            ServiceLocation { base_url, auth_methods: auth_methods.clone() },
        );
    }
    sd
}

/// Reserve a fresh localhost port. The listener is dropped immediately, so
/// the port stays free for the process that is about to bind it.
pub fn free_localhost_addr() -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    listener.local_addr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_rtconf::EncodeError;

    #[test]
    fn metadata_blob_failures_are_encode_errors() {
        // An io failure in the compression path must surface under the
        // encode taxonomy, never as an address-allocation failure.
        let io = std::io::Error::other("pipe closed");
        let err = GeneratorError::from(EncodeError::Compress(io));
        assert!(matches!(err, GeneratorError::Encode(EncodeError::Compress(_))));
        assert!(!err.to_string().contains("listen address"));
    }

    #[test]
    fn free_addr_is_loopback_and_nonzero() {
        let addr = free_localhost_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn consecutive_allocations_differ() {
        // Not guaranteed by the OS, but with the listener held open during
        // the second bind the kernel cannot hand out the same port.
        let a = TcpListener::bind("127.0.0.1:0").unwrap();
        let b = TcpListener::bind("127.0.0.1:0").unwrap();
        assert_ne!(a.local_addr().unwrap().port(), b.local_addr().unwrap().port());
    }
}
