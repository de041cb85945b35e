//! Resource identifiers.
//!
//! Every infrastructure object in a generated configuration carries a `Rid`,
//! and all cross-references between resources (pool → role, deployment →
//! gateway) are expressed as Rids rather than embedded values.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// An opaque resource identifier, unique within one generated configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rid(String);

impl Rid {
    /// Allocate a fresh, globally-unique identifier.
    pub fn fresh() -> Self {
        Rid(format!("res_{}", Ulid::new().to_string().to_lowercase()))
    }

    /// Derive the identifier for a credential role from its owning cluster
    /// and username.
    ///
    /// Deterministic on purpose: two databases on the same cluster sharing a
    /// user must resolve to the same role object instead of forking the
    /// credentials into divergent identities.
    pub fn role(cluster: &Rid, username: &str) -> Self {
        Rid(format!("role:{}:{}", cluster.0, username))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Rid {
    fn from(s: String) -> Self {
        Rid(s)
    }
}

impl From<&str> for Rid {
    fn from(s: &str) -> Self {
        Rid(s.to_string())
    }
}
