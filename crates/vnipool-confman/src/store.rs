//! TenantConfig store - persistence abstraction for the config aggregate
//!
//! Store contract:
//! - Works with whole TenantConfig aggregates
//! - `update` is a conditional write keyed on `metadata.resource_version`
//! - A stale version fails with [`StoreError::Conflict`], never overwrites

use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::model::TenantConfig;
use crate::{ConfmanError, ConfmanResult};

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {name} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Whether the write lost an optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// TenantConfig store trait
pub trait TenantConfigStore: Send + Sync {
    /// List all TenantConfigs
    fn list(&self) -> StoreResult<Vec<TenantConfig>>;

    /// Conditionally replace a TenantConfig, returning the stored copy
    fn update(&self, config: &TenantConfig) -> StoreResult<TenantConfig>;
}

/// Fetch the authoritative TenantConfig
///
/// With `name` set the config of that name is returned, otherwise the first
/// one the store lists.
pub fn fetch_tenant_config<S>(store: &S, name: Option<&str>) -> ConfmanResult<TenantConfig>
where
    S: TenantConfigStore + ?Sized,
{
    let configs = store.list().map_err(ConfmanError::Store)?;
    let config = match name {
        Some(name) => configs.into_iter().find(|c| c.metadata.name == name),
        None => configs.into_iter().next(),
    };
    config.ok_or(ConfmanError::NotProvisioned)
}

/// In-memory TenantConfig store (for testing and development)
pub struct InMemoryTenantConfigStore {
    configs: RwLock<BTreeMap<String, TenantConfig>>,
}

impl InMemoryTenantConfigStore {
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create or replace a config out-of-band, as an administrator would
    pub fn provision(&self, mut config: TenantConfig) -> TenantConfig {
        let mut configs = self.configs.write();
        let version = configs
            .get(&config.metadata.name)
            .map_or(1, |c| c.metadata.resource_version + 1);
        config.metadata.resource_version = version;
        configs.insert(config.metadata.name.clone(), config.clone());
        config
    }

    /// Current copy of a config
    pub fn get(&self, name: &str) -> Option<TenantConfig> {
        self.configs.read().get(name).cloned()
    }
}

impl Default for InMemoryTenantConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantConfigStore for InMemoryTenantConfigStore {
    fn list(&self) -> StoreResult<Vec<TenantConfig>> {
        Ok(self.configs.read().values().cloned().collect())
    }

    fn update(&self, config: &TenantConfig) -> StoreResult<TenantConfig> {
        let mut configs = self.configs.write();
        let current = configs
            .get_mut(&config.metadata.name)
            .ok_or_else(|| StoreError::NotFound(config.metadata.name.clone()))?;

        if current.metadata.resource_version != config.metadata.resource_version {
            return Err(StoreError::Conflict {
                name: config.metadata.name.clone(),
                expected: config.metadata.resource_version,
                actual: current.metadata.resource_version,
            });
        }

        let mut stored = config.clone();
        stored.metadata.resource_version += 1;
        *current = stored.clone();
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IfaceProfile, VniType};

    #[test]
    fn test_fetch_requires_provisioning() {
        let store = InMemoryTenantConfigStore::new();
        assert!(matches!(
            fetch_tenant_config(&store, None),
            Err(ConfmanError::NotProvisioned)
        ));

        store.provision(TenantConfig::new("tconf"));
        let config = fetch_tenant_config(&store, None).unwrap();
        assert_eq!(config.metadata.name, "tconf");
        assert_eq!(config.metadata.resource_version, 1);
    }

    #[test]
    fn test_fetch_by_name() {
        let store = InMemoryTenantConfigStore::new();
        store.provision(TenantConfig::new("alpha"));
        store.provision(TenantConfig::new("beta"));

        assert_eq!(fetch_tenant_config(&store, Some("beta")).unwrap().metadata.name, "beta");
        assert!(matches!(
            fetch_tenant_config(&store, Some("gamma")),
            Err(ConfmanError::NotProvisioned)
        ));
    }

    #[test]
    fn test_update_bumps_version() {
        let store = InMemoryTenantConfigStore::new();
        let mut config = store.provision(TenantConfig::new("tconf"));
        config
            .host_devices
            .push(IfaceProfile::new("eth0", VniType::Vlan, "1-10"));

        let stored = store.update(&config).unwrap();
        assert_eq!(stored.metadata.resource_version, 2);
        assert_eq!(store.get("tconf").unwrap().host_devices.len(), 1);
    }

    #[test]
    fn test_stale_update_conflicts() {
        let store = InMemoryTenantConfigStore::new();
        let first = store.provision(TenantConfig::new("tconf"));
        let second = first.clone();

        store.update(&first).unwrap();
        let err = store.update(&second).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get("tconf").unwrap().metadata.resource_version, 2);
    }

    #[test]
    fn test_update_unknown_config() {
        let store = InMemoryTenantConfigStore::new();
        let err = store.update(&TenantConfig::new("ghost")).unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".into()));
    }
}
