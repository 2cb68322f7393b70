//! Allocation Engine
//!
//! Every call is one fetch-mutate-write cycle over a TenantConfig the caller
//! fetched. The aggregate is taken by value: when the conditional write is
//! rejected the mutated copy is dropped and the caller holds no claim.

use std::sync::Arc;
use std::time::Duration;

use crate::model::{NetworkSegment, ProfileKey, TenantConfig};
use crate::range::VniRange;
use crate::settings::ConfmanSettings;
use crate::store::{fetch_tenant_config, TenantConfigStore};
use crate::{ConfmanError, ConfmanResult};

/// Successful reservation
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Reserved VNI
    pub vni: u32,
    /// TenantConfig as persisted by the store
    pub config: TenantConfig,
}

/// What a release did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The network holds no VNI
    NothingToRelease,
    /// The network points at a profile the TenantConfig does not have
    Inconsistent,
    /// The VNI was cleared and persisted
    Released { vni: u32 },
}

/// Successful release
#[derive(Debug, Clone)]
pub struct Release {
    /// What happened
    pub outcome: ReleaseOutcome,
    /// TenantConfig as persisted, or unchanged when nothing was written
    pub config: TenantConfig,
}

/// VNI allocator over a TenantConfig store
pub struct VniAllocator<S> {
    store: Arc<S>,
    settings: ConfmanSettings,
}

impl<S: TenantConfigStore> VniAllocator<S> {
    /// Create allocator with default settings
    pub fn new(store: Arc<S>) -> Self {
        Self::with_settings(store, ConfmanSettings::default())
    }

    /// Create allocator
    pub fn with_settings(store: Arc<S>, settings: ConfmanSettings) -> Self {
        Self { store, settings }
    }

    /// Backing store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active settings
    pub fn settings(&self) -> &ConfmanSettings {
        &self.settings
    }

    /// Fetch the TenantConfig this allocator works on
    pub fn fetch(&self) -> ConfmanResult<TenantConfig> {
        fetch_tenant_config(self.store.as_ref(), self.settings.tenant_config.as_deref())
    }

    /// Reserve the first free VNI of `vni_range` in the profile for `key`
    pub fn reserve(
        &self,
        mut config: TenantConfig,
        key: &ProfileKey,
        vni_range: &str,
    ) -> ConfmanResult<Reservation> {
        // Step 1: current allocations of the selected profile
        let mut allocs = config
            .profile(key)?
            .ok_or_else(|| profile_not_found(key))?
            .allocations()?;

        // Step 2: candidate VNIs
        let range = VniRange::parse(vni_range).map_err(|source| ConfmanError::MalformedRangeSpec {
            profile: key.name.clone(),
            range: vni_range.to_string(),
            source,
        })?;

        // Step 3: first clear bit wins
        let vni = range
            .iter()
            .find(|vni| !allocs.get(*vni))
            .ok_or_else(|| ConfmanError::RangeExhausted {
                profile: key.name.clone(),
                range: vni_range.to_string(),
            })?;
        allocs.set(vni);
        tracing::debug!("Chose VNI {} from range {:?} of profile {}", vni, vni_range, key);

        // Step 4: write back into the matching profile and persist
        let index = config
            .profile_index(key)?
            .ok_or_else(|| profile_not_found(key))?;
        config.host_devices[index].alloc = allocs.encode();
        let config = self.persist(&config, key)?;

        tracing::info!("Reserved VNI {} on profile {}", vni, key);
        Ok(Reservation { vni, config })
    }

    /// Reserve from the profile's own `vniRange`
    pub fn reserve_in_profile(&self, config: TenantConfig, key: &ProfileKey) -> ConfmanResult<Reservation> {
        let vni_range = config
            .profile(key)?
            .ok_or_else(|| profile_not_found(key))?
            .vni_range
            .clone();
        self.reserve(config, key, &vni_range)
    }

    /// Release the VNI held by `network`
    ///
    /// A network whose profile is missing from the TenantConfig is logged
    /// and reported as [`ReleaseOutcome::Inconsistent`], not as an error, so
    /// that tearing the network down is never blocked.
    pub fn free(&self, mut config: TenantConfig, network: &NetworkSegment) -> ConfmanResult<Release> {
        let (Some(key), Some(vni)) = (network.profile_key(), network.vni()) else {
            tracing::debug!("Network {} holds no VNI, nothing to release", network.qualified_name());
            return Ok(Release {
                outcome: ReleaseOutcome::NothingToRelease,
                config,
            });
        };

        let Some(index) = config.profile_index(&key)? else {
            tracing::warn!(
                network = %network.qualified_name(),
                tenant_config = %config.metadata.name,
                profile = %key,
                vni,
                "Data inconsistency: the network's interface profile is not present in the TenantConfig, \
                 the APIs were possibly tampered with"
            );
            return Ok(Release {
                outcome: ReleaseOutcome::Inconsistent,
                config,
            });
        };

        let mut allocs = config.host_devices[index].allocations()?;
        allocs.reset(vni);
        config.host_devices[index].alloc = allocs.encode();
        let config = self.persist(&config, &key)?;

        tracing::info!("Released VNI {} on profile {}", vni, key);
        Ok(Release {
            outcome: ReleaseOutcome::Released { vni },
            config,
        })
    }

    fn persist(&self, config: &TenantConfig, key: &ProfileKey) -> ConfmanResult<TenantConfig> {
        self.store
            .update(config)
            .map_err(|source| ConfmanError::PersistenceFailed {
                profile: key.name.clone(),
                source,
            })
    }

    // Caller-side helpers: fresh fetch per attempt, retry only lost races.

    /// Fetch and reserve from the profile's own range
    pub fn allocate(&self, key: &ProfileKey) -> ConfmanResult<Reservation> {
        self.with_conflict_retry(|config| self.reserve_in_profile(config, key))
    }

    /// Fetch and reserve from `vni_range`
    pub fn allocate_in_range(&self, key: &ProfileKey, vni_range: &str) -> ConfmanResult<Reservation> {
        self.with_conflict_retry(|config| self.reserve(config, key, vni_range))
    }

    /// Fetch and release the VNI held by `network`
    pub fn release(&self, network: &NetworkSegment) -> ConfmanResult<Release> {
        self.with_conflict_retry(|config| self.free(config, network))
    }

    fn with_conflict_retry<T>(
        &self,
        mut op: impl FnMut(TenantConfig) -> ConfmanResult<T>,
    ) -> ConfmanResult<T> {
        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let config = self.fetch()?;
            match op(config) {
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    tracing::warn!(
                        "TenantConfig changed underneath us (attempt {}/{}): {}",
                        attempt,
                        max_attempts,
                        e
                    );
                    let backoff = self.settings.retry.backoff_ms * u64::from(attempt);
                    std::thread::sleep(Duration::from_millis(backoff));
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn profile_not_found(key: &ProfileKey) -> ConfmanError {
    ConfmanError::ProfileNotFound {
        name: key.name.clone(),
        vni_type: key.vni_type,
    }
}
