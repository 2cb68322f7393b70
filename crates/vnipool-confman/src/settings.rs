//! Allocator Settings

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming the settings file
pub const SETTINGS_PATH_ENV: &str = "VNIPOOL_CONFIG";

/// Allocator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfmanSettings {
    /// TenantConfig to allocate from, the first listed one when unset
    pub tenant_config: Option<String>,
    /// Conflict retry policy of the fetch-reserve-update helpers
    pub retry: RetrySettings,
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for ConfmanSettings {
    fn default() -> Self {
        Self {
            tenant_config: None,
            retry: RetrySettings::default(),
            log_filter: "info".into(),
        }
    }
}

impl ConfmanSettings {
    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Load from the file named by `VNIPOOL_CONFIG`, defaults otherwise
    pub fn from_env() -> Self {
        let Ok(path) = std::env::var(SETTINGS_PATH_ENV) else {
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Settings {} not usable ({}), using defaults", path, e);
            Self::default()
        })
    }
}

/// Retry policy for lost optimistic-concurrency races
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Linear backoff step between attempts
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: ConfmanSettings =
            serde_json::from_str(r#"{"tenant_config": "tconf", "retry": {"max_attempts": 2}}"#).unwrap();
        assert_eq!(settings.tenant_config.as_deref(), Some("tconf"));
        assert_eq!(settings.retry.max_attempts, 2);
        assert_eq!(settings.retry.backoff_ms, 10);
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("vnipool-settings-{}.json", std::process::id()));
        let settings = ConfmanSettings {
            tenant_config: Some("tconf".into()),
            ..Default::default()
        };
        settings.save(&path).unwrap();
        let loaded = ConfmanSettings::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(ConfmanSettings::load("/nonexistent/vnipool.json").is_err());
    }
}
