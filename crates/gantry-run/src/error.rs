//! Generator error types.

use thiserror::Error;

use gantry_rtconf::{EncodeError, ReduceError};

/// Errors from building the infra graph or materializing process configs.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// An infra-manager lookup failed; `kind` names the failing sub-section.
    #[error("failed to resolve {kind} config: {source}")]
    InfraResolution {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("app descriptor error: {0}")]
    App(#[source] anyhow::Error),

    #[error("unknown delivery guarantee {0:?}")]
    UnknownDeliveryGuarantee(String),

    #[error("invalid external database config for {db}: {reason}")]
    ExternalDatabase { db: String, reason: String },

    #[error(transparent)]
    Reduce(#[from] ReduceError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Deliberately not `#[from]`: every io failure is labeled at its
    /// call site with the operation that produced it.
    #[error("failed to allocate local listen address: {0}")]
    Allocation(#[source] std::io::Error),

    /// The graph build failed earlier; the first failure is terminal and
    /// replayed to every subsequent caller.
    #[error("runtime config initialization previously failed: {0}")]
    Initialization(String),
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;
