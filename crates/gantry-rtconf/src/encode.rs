//! Wire encodings for the runtime configuration.
//!
//! Two independent, pure encoders from the canonical [`RuntimeConfig`]:
//!
//! - **current**: binary serialization, gzip-compressed, standard base64,
//!   prefixed `gzip:`. Round-trips exactly via [`decode_current`].
//! - **legacy**: downgraded to the old JSON shape (secrets inlined as
//!   plaintext), then URL-safe base64 without padding.
//!
//! Both land in a single environment variable; the caller picks the form
//! based on what the target runtime understands.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

use crate::legacy::{LegacyError, to_legacy};
use crate::model::RuntimeConfig;

/// Prefix marking a compressed binary payload.
pub const COMPRESSED_PREFIX: &str = "gzip:";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize runtime config: {0}")]
    Binary(#[from] bincode::Error),

    #[error("failed to serialize runtime config as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Legacy(#[from] LegacyError),

    #[error("compression failed: {0}")]
    Compress(#[from] std::io::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is missing the {COMPRESSED_PREFIX:?} prefix")]
    MissingPrefix,
}

/// Encode in the current wire form.
pub fn encode_current(cfg: &RuntimeConfig) -> Result<String, EncodeError> {
    let bytes = bincode::serialize(cfg)?;
    Ok(compress_blob(&bytes)?)
}

/// Decode the current wire form back into the canonical value.
pub fn decode_current(payload: &str) -> Result<RuntimeConfig, EncodeError> {
    let b64 = payload
        .strip_prefix(COMPRESSED_PREFIX)
        .ok_or(EncodeError::MissingPrefix)?;
    let compressed = STANDARD.decode(b64)?;
    let mut bytes = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut bytes)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Encode in the legacy wire form.
pub fn encode_legacy(cfg: &RuntimeConfig) -> Result<String, EncodeError> {
    let legacy = to_legacy(cfg)?;
    let json = serde_json::to_vec(&legacy)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Gzip-compress and base64-encode an arbitrary payload with the
/// [`COMPRESSED_PREFIX`]. Shared by the runtime config and the app
/// metadata environment variables.
pub fn compress_blob(bytes: &[u8]) -> Result<String, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    let compressed = encoder.finish()?;
    Ok(format!("{COMPRESSED_PREFIX}{}", STANDARD.encode(compressed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::rid::Rid;

    fn sample_config() -> RuntimeConfig {
        let role_rid = Rid::from("role:res_c1:app");
        RuntimeConfig {
            environment: Environment {
                app_id: "demo".into(),
                app_slug: Some("demo-x1".into()),
                env_id: "local".into(),
                env_name: "local".into(),
                env_type: EnvType::Development,
                cloud: CloudKind::Local,
            },
            platform: Some(PlatformConfig {
                signing_keys: vec![AuthKey { id: 7, data: SecretData::embedded("key-material") }],
            }),
            infra: Infrastructure {
                credentials: Credentials {
                    sql_roles: vec![SqlRole {
                        rid: role_rid.clone(),
                        username: "app".into(),
                        password: SecretData::embedded("s3cret"),
                        client_cert_rid: None,
                    }],
                    redis_roles: vec![],
                },
                resources: Resources {
                    sql_clusters: vec![SqlCluster {
                        rid: Rid::from("res_c1"),
                        servers: vec![SqlServer {
                            rid: Rid::fresh(),
                            kind: ServerKind::Primary,
                            host: "localhost:5432".into(),
                            tls: None,
                        }],
                        databases: vec![SqlDatabase {
                            rid: Rid::fresh(),
                            name: "orders".into(),
                            cloud_name: "orders".into(),
                            conn_pools: vec![SqlConnectionPool {
                                is_readonly: false,
                                role_rid,
                                min_connections: 0,
                                max_connections: 10,
                            }],
                        }],
                    }],
                    ..Default::default()
                },
            },
            deployment: DeploymentConfig {
                rid: Rid::fresh(),
                deploy_id: None,
                deployed_at: Some(std::time::SystemTime::UNIX_EPOCH),
                hosted_gateways: vec![],
                hosted_services: vec![HostedService {
                    name: "shop".into(),
                    log_config: Some("debug".into()),
                    worker_threads: None,
                }],
                auth_methods: vec![],
                service_discovery: ServiceDiscovery::default(),
                graceful_shutdown: Some(GracefulShutdown::default()),
                tracing: None,
            },
        }
    }

    #[test]
    fn current_encoding_round_trips() {
        let cfg = sample_config();
        let encoded = encode_current(&cfg).unwrap();
        assert!(encoded.starts_with(COMPRESSED_PREFIX));
        let decoded = decode_current(&encoded).unwrap();
        assert_eq!(cfg, decoded);
    }

    #[test]
    fn decode_rejects_missing_prefix() {
        let err = decode_current("bm90LWd6aXBwZWQ").unwrap_err();
        assert!(matches!(err, EncodeError::MissingPrefix));
    }

    #[test]
    fn legacy_encoding_is_url_safe_unpadded() {
        let encoded = encode_legacy(&sample_config()).unwrap();
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn legacy_payload_inlines_secrets_as_plaintext() {
        let encoded = encode_legacy(&sample_config()).unwrap();
        let json = URL_SAFE_NO_PAD.decode(encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        // The legacy shape has no secret-reference mode: credentials must
        // appear as plain strings, never as structured source descriptors.
        assert_eq!(value["sql_databases"][0]["password"], "s3cret");
        assert_eq!(value["auth_keys"][0]["data"], "key-material");
        assert!(value.to_string().find("embedded").is_none());
    }

    #[test]
    fn compress_blob_round_trips() {
        let blob = compress_blob(b"hello world").unwrap();
        let b64 = blob.strip_prefix(COMPRESSED_PREFIX).unwrap();
        let compressed = STANDARD.decode(b64).unwrap();
        let mut out = Vec::new();
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }
}
