//! gantry.toml app descriptor parser.
//!
//! The app descriptor carries the per-application settings that are not
//! derived from source code: the platform-assigned app id, log level,
//! build knobs, and the global CORS policy.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The parsed `gantry.toml` app descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppFile {
    /// Platform-assigned app id, if the app is linked to the platform.
    pub app_id: Option<String>,
    /// Log level override applied to every hosted service.
    pub log_level: Option<String>,
    #[serde(default)]
    pub build: BuildSettings,
    pub cors: Option<CorsConfig>,
}

/// Build settings from the app descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Run services on a shared worker thread pool.
    #[serde(default)]
    pub worker_pooling: bool,
}

/// Global CORS policy declared at the app level.
///
/// Origin lists are optional: `None` means the app did not constrain
/// origins, which downstream consumers may widen to a permissive local-dev
/// default. An explicit empty list means "no origins allowed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub debug: bool,
    pub allow_origins_with_credentials: Option<Vec<String>>,
    pub allow_origins_without_credentials: Option<Vec<String>>,
    #[serde(default)]
    pub allow_headers: Vec<String>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
}

impl AppFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let app = AppFile::from_toml_str("").unwrap();
        assert_eq!(app.app_id, None);
        assert!(!app.build.worker_pooling);
        assert!(app.cors.is_none());
    }

    #[test]
    fn parse_full() {
        let toml_str = r#"
app_id = "shop-x7b2"
log_level = "debug"

[build]
worker_pooling = true

[cors]
debug = true
allow_origins_with_credentials = ["https://shop.example.com"]
allow_headers = ["X-Request-Id"]
"#;
        let app = AppFile::from_toml_str(toml_str).unwrap();
        assert_eq!(app.app_id.as_deref(), Some("shop-x7b2"));
        assert_eq!(app.log_level.as_deref(), Some("debug"));
        assert!(app.build.worker_pooling);
        let cors = app.cors.unwrap();
        assert_eq!(
            cors.allow_origins_with_credentials,
            Some(vec!["https://shop.example.com".to_string()])
        );
        assert_eq!(cors.allow_origins_without_credentials, None);
        assert_eq!(cors.allow_headers, vec!["X-Request-Id"]);
    }

    #[test]
    fn toml_round_trips() {
        let app = AppFile {
            app_id: Some("shop-x7b2".into()),
            log_level: None,
            build: BuildSettings { worker_pooling: false },
            cors: Some(CorsConfig::default()),
        };
        let s = app.to_toml_string().unwrap();
        let back = AppFile::from_toml_str(&s).unwrap();
        assert_eq!(app, back);
    }
}
