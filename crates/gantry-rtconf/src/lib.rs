//! Runtime configuration library.
//!
//! Builds the full infrastructure resource graph for an environment
//! ([`builder::Builder`]), reduces it to the sub-graph a deployment unit
//! actually depends on ([`builder::Builder::deployment`]), and serializes
//! the result in either of the two supported wire encodings
//! ([`encode::encode_current`], [`encode::encode_legacy`]).
//!
//! The canonical in-memory value is [`model::RuntimeConfig`]; it carries no
//! encoding-specific fields. All cross-references between resources go
//! through opaque [`rid::Rid`] identifiers.

pub mod builder;
pub mod encode;
pub mod legacy;
pub mod model;
pub mod reduce;
pub mod rid;

pub use builder::Builder;
pub use encode::{EncodeError, decode_current, encode_current, encode_legacy};
pub use legacy::{LegacyError, to_legacy};
pub use model::*;
pub use reduce::{DeploymentBuilder, ReduceError};
pub use rid::Rid;
