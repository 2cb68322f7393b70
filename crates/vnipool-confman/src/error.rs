//! Error types for VNI allocation

use crate::model::VniType;
use crate::range::RangeError;
use crate::store::StoreError;
use thiserror::Error;
use vnipool_bitarray::BitArrayError;

/// Allocation error type
#[derive(Error, Debug)]
pub enum ConfmanError {
    /// No TenantConfig has been provisioned yet
    #[error("tenant networks cannot be created without provisioning a TenantConfig first")]
    NotProvisioned,

    /// The profile's vniRange cannot be parsed
    #[error("vniRange {range:?} of interface profile {profile} cannot be parsed: {source}")]
    MalformedRangeSpec {
        profile: String,
        range: String,
        #[source]
        source: RangeError,
    },

    /// Every VNI of the range is already reserved
    #[error("VNI cannot be allocated from interface profile {profile}: the whole range {range:?} is already reserved")]
    RangeExhausted { profile: String, range: String },

    /// The updated TenantConfig was rejected by the store
    #[error("VNI allocation of interface profile {profile} cannot be persisted: {source}")]
    PersistenceFailed {
        profile: String,
        #[source]
        source: StoreError,
    },

    /// No interface profile matches the requested name and type
    #[error("interface profile {name} with vniType {vni_type} is not present in the TenantConfig")]
    ProfileNotFound { name: String, vni_type: VniType },

    /// More than one interface profile shares a name and type
    #[error("interface profile {name} with vniType {vni_type} is defined more than once")]
    DuplicateProfile { name: String, vni_type: VniType },

    /// The stored allocation bitmap does not decode
    #[error("allocation bitmap of interface profile {profile} is corrupt: {source}")]
    CorruptAllocation {
        profile: String,
        #[source]
        source: BitArrayError,
    },

    /// Reading TenantConfigs from the store failed
    #[error("TenantConfig cannot be read: {0}")]
    Store(#[source] StoreError),
}

impl ConfmanError {
    /// Whether re-fetching the TenantConfig and trying again can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PersistenceFailed { source, .. } => source.is_conflict(),
            Self::RangeExhausted { .. } => true,
            _ => false,
        }
    }

    /// Whether this is a lost optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PersistenceFailed { source, .. } if source.is_conflict())
    }
}

/// Result type for VNI allocation
pub type ConfmanResult<T> = Result<T, ConfmanError>;
