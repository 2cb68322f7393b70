//! Tenant Configuration Data Model

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use vnipool_bitarray::BitArray;

use crate::{ConfmanError, ConfmanResult};

/// Object metadata owned by the config store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name
    pub name: String,
    /// Namespace, when the object is namespaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Version token for optimistic concurrency
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    /// Metadata with just a name
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// VNI space of an interface profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VniType {
    /// 802.1Q VLAN tag
    Vlan,
    /// VXLAN network identifier
    Vxlan,
}

impl VniType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vlan => "vlan",
            Self::Vxlan => "vxlan",
        }
    }
}

impl fmt::Display for VniType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup key of an interface profile
///
/// Two profiles with the same name but different [`VniType`] are separate
/// allocation buckets, so both fields always take part in matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileKey {
    /// Host device (or device pool) name
    pub name: String,
    /// VNI space
    pub vni_type: VniType,
}

impl ProfileKey {
    /// Create key
    pub fn new(name: impl Into<String>, vni_type: VniType) -> Self {
        Self {
            name: name.into(),
            vni_type,
        }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.vni_type)
    }
}

/// One allocation bucket: a host network resource and a VNI space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfaceProfile {
    /// Host device or device pool name
    pub name: String,
    /// VNI space
    pub vni_type: VniType,
    /// Administrator-authored range, e.g. `"100-200,305"`
    pub vni_range: String,
    /// Base64 allocation bitmap, empty when nothing is reserved
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alloc: String,
}

impl IfaceProfile {
    /// Create profile with nothing reserved
    pub fn new(name: &str, vni_type: VniType, vni_range: &str) -> Self {
        Self {
            name: name.to_string(),
            vni_type,
            vni_range: vni_range.to_string(),
            alloc: String::new(),
        }
    }

    /// Lookup key of this profile
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(self.name.clone(), self.vni_type)
    }

    /// Whether this profile is the bucket for `key`
    pub fn matches(&self, key: &ProfileKey) -> bool {
        self.name == key.name && self.vni_type == key.vni_type
    }

    /// Decode the allocation bitmap
    pub fn allocations(&self) -> ConfmanResult<BitArray> {
        BitArray::from_base64(&self.alloc).map_err(|source| ConfmanError::CorruptAllocation {
            profile: self.name.clone(),
            source,
        })
    }
}

/// Tenant configuration aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    /// Store metadata
    pub metadata: ObjectMeta,
    /// Interface profiles, one per (name, vniType)
    #[serde(default)]
    pub host_devices: Vec<IfaceProfile>,
}

impl TenantConfig {
    /// Create empty config
    pub fn new(name: &str) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            host_devices: Vec::new(),
        }
    }

    /// Builder-style profile addition
    pub fn with_profile(mut self, profile: IfaceProfile) -> Self {
        self.host_devices.push(profile);
        self
    }

    /// Position of the profile for `key`
    ///
    /// Matching is exact on both name and type. A key matching more than
    /// one profile is a provisioning error.
    pub fn profile_index(&self, key: &ProfileKey) -> ConfmanResult<Option<usize>> {
        let mut found = None;
        for (index, profile) in self.host_devices.iter().enumerate() {
            if !profile.matches(key) {
                continue;
            }
            if found.is_some() {
                return Err(ConfmanError::DuplicateProfile {
                    name: key.name.clone(),
                    vni_type: key.vni_type,
                });
            }
            found = Some(index);
        }
        Ok(found)
    }

    /// Profile for `key`
    pub fn profile(&self, key: &ProfileKey) -> ConfmanResult<Option<&IfaceProfile>> {
        Ok(self.profile_index(key)?.map(|i| &self.host_devices[i]))
    }

    /// Check that every (name, vniType) appears at most once
    pub fn validate(&self) -> ConfmanResult<()> {
        let mut seen = HashSet::new();
        for profile in &self.host_devices {
            if !seen.insert((profile.name.as_str(), profile.vni_type)) {
                return Err(ConfmanError::DuplicateProfile {
                    name: profile.name.clone(),
                    vni_type: profile.vni_type,
                });
            }
        }
        Ok(())
    }
}

/// Network options that reference an allocated VNI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOptions {
    /// Host device name
    #[serde(default)]
    pub device: String,
    /// Device pool name, overrides `device` when set
    #[serde(default)]
    pub device_pool: String,
    /// VLAN id, 0 when not used
    #[serde(default)]
    pub vlan: u32,
    /// VXLAN id, 0 when not used
    #[serde(default)]
    pub vxlan: u32,
}

/// Tenant network holding at most one VNI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSegment {
    /// Store metadata
    pub metadata: ObjectMeta,
    /// Network options
    pub options: NetworkOptions,
}

impl NetworkSegment {
    /// VLAN network on a host device
    pub fn vlan(name: &str, device: &str, vlan: u32) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            options: NetworkOptions {
                device: device.to_string(),
                vlan,
                ..Default::default()
            },
        }
    }

    /// VXLAN network on a host device
    pub fn vxlan(name: &str, device: &str, vxlan: u32) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            options: NetworkOptions {
                device: device.to_string(),
                vxlan,
                ..Default::default()
            },
        }
    }

    /// Builder-style device pool
    pub fn in_pool(mut self, pool: &str) -> Self {
        self.options.device_pool = pool.to_string();
        self
    }

    /// VNI space in use, `None` when the network holds no VNI
    pub fn vni_type(&self) -> Option<VniType> {
        match (self.options.vlan, self.options.vxlan) {
            (0, 0) => None,
            (_, 0) => Some(VniType::Vlan),
            _ => Some(VniType::Vxlan),
        }
    }

    /// Referenced VNI, vxlan winning over vlan
    pub fn vni(&self) -> Option<u32> {
        match self.vni_type()? {
            VniType::Vlan => Some(self.options.vlan),
            VniType::Vxlan => Some(self.options.vxlan),
        }
    }

    /// Owning device: the pool when set, the device otherwise
    pub fn device_name(&self) -> &str {
        if self.options.device_pool.is_empty() {
            &self.options.device
        } else {
            &self.options.device_pool
        }
    }

    /// Key of the profile this network draws from
    pub fn profile_key(&self) -> Option<ProfileKey> {
        self.vni_type()
            .map(|vni_type| ProfileKey::new(self.device_name(), vni_type))
    }

    /// `namespace/name` for log messages
    pub fn qualified_name(&self) -> String {
        match &self.metadata.namespace {
            Some(ns) => format!("{}/{}", ns, self.metadata.name),
            None => self.metadata.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_lookup_is_exact() {
        let config = TenantConfig::new("tconf")
            .with_profile(IfaceProfile::new("eth0-pool", VniType::Vlan, "1-10"))
            .with_profile(IfaceProfile::new("eth0", VniType::Vxlan, "1-10"))
            .with_profile(IfaceProfile::new("eth0", VniType::Vlan, "1-10"));

        assert_eq!(config.profile_index(&ProfileKey::new("eth0", VniType::Vlan)).unwrap(), Some(2));
        assert_eq!(config.profile_index(&ProfileKey::new("eth0", VniType::Vxlan)).unwrap(), Some(1));
        assert_eq!(config.profile_index(&ProfileKey::new("eth", VniType::Vlan)).unwrap(), None);
    }

    #[test]
    fn test_duplicate_profile_detected() {
        let config = TenantConfig::new("tconf")
            .with_profile(IfaceProfile::new("eth0", VniType::Vlan, "1-10"))
            .with_profile(IfaceProfile::new("eth0", VniType::Vlan, "20-30"));

        assert!(matches!(
            config.profile_index(&ProfileKey::new("eth0", VniType::Vlan)),
            Err(ConfmanError::DuplicateProfile { .. })
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_selection() {
        let none = NetworkSegment::vlan("net", "eth0", 0);
        assert_eq!(none.vni_type(), None);
        assert_eq!(none.profile_key(), None);

        let vlan = NetworkSegment::vlan("net", "eth0", 100);
        assert_eq!(vlan.vni(), Some(100));
        assert_eq!(vlan.profile_key(), Some(ProfileKey::new("eth0", VniType::Vlan)));

        let mut both = NetworkSegment::vlan("net", "eth0", 100);
        both.options.vxlan = 5000;
        assert_eq!(both.vni_type(), Some(VniType::Vxlan));
        assert_eq!(both.vni(), Some(5000));

        let pooled = NetworkSegment::vxlan("net", "eth0", 7).in_pool("nic-pool");
        assert_eq!(pooled.device_name(), "nic-pool");
    }

    #[test]
    fn test_wire_format() {
        let config = TenantConfig::new("tconf")
            .with_profile(IfaceProfile::new("eth0", VniType::Vxlan, "100-200"));
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["hostDevices"][0]["vniType"], "vxlan");
        assert_eq!(json["hostDevices"][0]["vniRange"], "100-200");
        assert!(json["hostDevices"][0].get("alloc").is_none());
        assert_eq!(json["metadata"]["resourceVersion"], 0);

        let back: TenantConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
