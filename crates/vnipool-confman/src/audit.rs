//! Consistency audit between tenant networks and the TenantConfig
//!
//! Every non-zero VNI a network references must be a set bit in the
//! matching profile. The audit only reports; it never repairs.

use serde::Serialize;

use crate::model::{NetworkSegment, ProfileKey, TenantConfig};

/// Kind of mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// No profile matches the network's device and VNI type
    MissingProfile,
    /// More than one profile matches
    DuplicateProfile,
    /// The profile exists but its bitmap does not decode
    CorruptAllocation,
    /// The profile does not have the VNI reserved
    UnreservedVni,
}

/// One mismatch found by [`audit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    /// `namespace/name` of the network
    pub network: String,
    /// Profile the network draws from
    pub profile: String,
    /// Referenced VNI
    pub vni: u32,
    /// What is wrong
    pub kind: InconsistencyKind,
}

/// Check `networks` against `config`
pub fn audit<'a, I>(config: &TenantConfig, networks: I) -> Vec<Inconsistency>
where
    I: IntoIterator<Item = &'a NetworkSegment>,
{
    let mut findings = Vec::new();
    for network in networks {
        let (Some(key), Some(vni)) = (network.profile_key(), network.vni()) else {
            continue;
        };
        if let Some(kind) = check(config, &key, vni) {
            tracing::warn!(
                network = %network.qualified_name(),
                profile = %key,
                vni,
                ?kind,
                "TenantConfig does not back the network's VNI"
            );
            findings.push(Inconsistency {
                network: network.qualified_name(),
                profile: key.to_string(),
                vni,
                kind,
            });
        }
    }
    findings
}

fn check(config: &TenantConfig, key: &ProfileKey, vni: u32) -> Option<InconsistencyKind> {
    let profile = match config.profile(key) {
        Ok(Some(profile)) => profile,
        Ok(None) => return Some(InconsistencyKind::MissingProfile),
        Err(_) => return Some(InconsistencyKind::DuplicateProfile),
    };
    match profile.allocations() {
        Ok(allocs) if allocs.get(vni) => None,
        Ok(_) => Some(InconsistencyKind::UnreservedVni),
        Err(_) => Some(InconsistencyKind::CorruptAllocation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IfaceProfile, VniType};
    use vnipool_bitarray::BitArray;

    fn config() -> TenantConfig {
        let mut bits = BitArray::new();
        bits.set(100);
        let mut eth0 = IfaceProfile::new("eth0", VniType::Vlan, "100-200");
        eth0.alloc = bits.encode();
        let mut broken = IfaceProfile::new("eth1", VniType::Vlan, "100-200");
        broken.alloc = "***".into();

        TenantConfig::new("tconf").with_profile(eth0).with_profile(broken)
    }

    #[test]
    fn test_consistent_networks_pass() {
        let networks = vec![
            NetworkSegment::vlan("ok", "eth0", 100),
            NetworkSegment::vlan("flat", "eth9", 0),
        ];
        assert!(audit(&config(), &networks).is_empty());
    }

    #[test]
    fn test_mismatches_reported() {
        let networks = vec![
            NetworkSegment::vlan("missing", "eth9", 100),
            NetworkSegment::vlan("unreserved", "eth0", 101),
            NetworkSegment::vlan("corrupt", "eth1", 100),
            NetworkSegment::vxlan("wrong-type", "eth0", 100),
        ];
        let kinds: Vec<_> = audit(&config(), &networks).into_iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InconsistencyKind::MissingProfile,
                InconsistencyKind::UnreservedVni,
                InconsistencyKind::CorruptAllocation,
                InconsistencyKind::MissingProfile,
            ]
        );
    }
}
