//! Organization identities and trust levels.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::VerificationKey;

/// The role an organization plays inside a federation.
///
/// The leader role is an organizational convention, not an elected
/// coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationRole {
    /// Authored the federation agreement.
    Leader,
    /// Full participant.
    Member,
    /// Read-only participant.
    Observer,
    /// Relays between federations.
    Bridge,
}

impl OrganizationRole {
    /// Returns the wire label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Member => "member",
            Self::Observer => "observer",
            Self::Bridge => "bridge",
        }
    }
}

impl fmt::Display for OrganizationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizationRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leader" => Ok(Self::Leader),
            "member" => Ok(Self::Member),
            "observer" => Ok(Self::Observer),
            "bridge" => Ok(Self::Bridge),
            _ => Err(format!("unknown organization role: {s}")),
        }
    }
}

/// How far the trust handshake with an organization has progressed.
///
/// Levels are ordered; an identity's level only ever moves upward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Nothing verified.
    #[default]
    None,
    /// Identity document discovered.
    Basic,
    /// Challenge-response completed.
    Verified,
    /// Compliance attestations verified.
    Certified,
    /// Countersigned a federation agreement.
    Full,
}

impl TrustLevel {
    /// Returns the wire label for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Verified => "verified",
            Self::Certified => "certified",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An organization's federation identity, as published at its well-known
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationIdentity {
    /// Stable organization identifier.
    pub org_id: String,
    /// Display name.
    pub name: String,
    /// DNS domain hosting the well-known identity document.
    pub domain: String,
    /// Verification key for the organization's signatures (hex).
    pub public_key: VerificationKey,
    /// Base URL of the organization's federation API.
    pub federation_endpoint: String,
    /// Role within the federation.
    pub role: OrganizationRole,
    /// Trust level with the local organization.
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// Compliance frameworks the organization claims.
    #[serde(default)]
    pub compliance_frameworks: BTreeSet<String>,
    /// When the organization was last verified by the local organization.
    #[serde(default)]
    pub last_verified: Option<DateTime<Utc>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl OrganizationIdentity {
    /// Raises the trust level to `level`.
    ///
    /// Returns `false` and leaves the identity untouched if `level` is not
    /// strictly higher than the current level.
    pub fn elevate_trust(&mut self, level: TrustLevel) -> bool {
        if level <= self.trust_level {
            return false;
        }
        self.trust_level = level;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrganizationIdentity {
        OrganizationIdentity {
            org_id: "org-a".to_string(),
            name: "Org A".to_string(),
            domain: "a.example.com".to_string(),
            public_key: VerificationKey::from_bytes(vec![1, 2, 3, 4]),
            federation_endpoint: "https://a.example.com/federation".to_string(),
            role: OrganizationRole::Leader,
            trust_level: TrustLevel::Basic,
            compliance_frameworks: ["SOC2".to_string(), "GDPR".to_string()].into(),
            last_verified: Some(Utc::now()),
            metadata: [("region".to_string(), serde_json::json!("eu-west"))].into(),
        }
    }

    #[test]
    fn trust_levels_are_ordered() {
        assert!(TrustLevel::None < TrustLevel::Basic);
        assert!(TrustLevel::Basic < TrustLevel::Verified);
        assert!(TrustLevel::Verified < TrustLevel::Certified);
        assert!(TrustLevel::Certified < TrustLevel::Full);
    }

    #[test]
    fn elevate_trust_never_downgrades() {
        let mut identity = sample();
        assert!(identity.elevate_trust(TrustLevel::Certified));
        assert!(!identity.elevate_trust(TrustLevel::Verified));
        assert!(!identity.elevate_trust(TrustLevel::Certified));
        assert_eq!(identity.trust_level, TrustLevel::Certified);
    }

    #[test]
    fn identity_json_round_trip() {
        let identity = sample();
        let json = serde_json::to_value(&identity).unwrap();
        let decoded: OrganizationIdentity = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&decoded).unwrap(), json);
        assert_eq!(json["public_key"], "01020304");
        assert_eq!(json["role"], "leader");
        assert_eq!(json["trust_level"], "basic");
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = serde_json::json!({
            "org_id": "org-b",
            "name": "Org B",
            "domain": "b.example.com",
            "public_key": "aa",
            "federation_endpoint": "https://b.example.com",
            "role": "member"
        });
        let identity: OrganizationIdentity = serde_json::from_value(json).unwrap();
        assert_eq!(identity.trust_level, TrustLevel::None);
        assert!(identity.compliance_frameworks.is_empty());
        assert!(identity.last_verified.is_none());
    }

    #[test]
    fn role_parses_from_wire_label() {
        assert_eq!("bridge".parse::<OrganizationRole>(), Ok(OrganizationRole::Bridge));
        assert!("king".parse::<OrganizationRole>().is_err());
    }
}
