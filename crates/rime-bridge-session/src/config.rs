//! Static configuration handed to the engine at start-up.

use std::path::PathBuf;

use rime_bridge_core::EngineTraits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default location of read-only schema data.
pub const DEFAULT_SHARED_DATA_DIR: &str = "/usr/share/rime-data";

/// User data directory used when the platform has no data dir.
pub const FALLBACK_USER_DATA_DIR: &str = "/rime";

/// Application identity reported to the engine.
pub const DEFAULT_APP_NAME: &str = "rime.bridge";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Shared (read-only) schema and dictionary directory.
    pub shared_data_dir: PathBuf,
    /// Per-user directory for compiled and learned data.
    pub user_data_dir: PathBuf,
    /// Application identity.
    pub app_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            shared_data_dir: PathBuf::from(DEFAULT_SHARED_DATA_DIR),
            user_data_dir: dirs::data_dir()
                .map_or_else(|| PathBuf::from(FALLBACK_USER_DATA_DIR), |d| d.join("rime")),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overridden by `RIME_SHARED_DATA_DIR`, `RIME_USER_DATA_DIR`
    /// and `RIME_APP_NAME`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("RIME_SHARED_DATA_DIR") {
            self.shared_data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RIME_USER_DATA_DIR") {
            self.user_data_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("RIME_APP_NAME") {
            self.app_name = name;
        }
        self
    }

    /// The traits structure the engine consumes.
    #[must_use]
    pub fn to_traits(&self) -> EngineTraits {
        EngineTraits {
            shared_data_dir: self.shared_data_dir.clone(),
            user_data_dir: self.user_data_dir.clone(),
            app_name: self.app_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = BridgeConfig::from_json_str(r#"{"user_data_dir": "/tmp/rime"}"#).unwrap();
        assert_eq!(config.user_data_dir, PathBuf::from("/tmp/rime"));
        assert_eq!(config.shared_data_dir, PathBuf::from(DEFAULT_SHARED_DATA_DIR));
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            BridgeConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([("RIME_APP_NAME", "host.app"), ("RIME_SHARED_DATA_DIR", "/opt/rime")]);
        let config = BridgeConfig::default().with_overrides(|k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.app_name, "host.app");
        assert_eq!(config.shared_data_dir, PathBuf::from("/opt/rime"));

        let traits = config.to_traits();
        assert_eq!(traits.app_name, "host.app");
        assert_eq!(traits.user_data_dir, config.user_data_dir);
    }
}
