//! Federated governance policies and semantic versioning.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;
use crate::crypto::sha256_hex;
use crate::error::TypesError;

/// Visibility and authority classification of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyScope {
    /// Never leaves the owning organization.
    Local,
    /// Offered to federation peers.
    Shared,
    /// Adopted verbatim from a peer.
    Inherited,
    /// Adopted from a peer with local content replacing the upstream body.
    Override,
}

impl PolicyScope {
    /// Returns the wire label for this scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Shared => "shared",
            Self::Inherited => "inherited",
            Self::Override => "override",
        }
    }
}

impl fmt::Display for PolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which semantic-version component an update bumps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    /// `x.y.z` → `x.y.(z+1)`
    #[default]
    Patch,
    /// `x.y.z` → `x.(y+1).0`
    Minor,
    /// `x.y.z` → `(x+1).0.0`
    Major,
}

impl FromStr for VersionBump {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            _ => Err(format!("unknown version bump: {s}")),
        }
    }
}

/// Returns `version` with the requested component bumped and every lower
/// component reset to zero. Pre-release and build metadata are dropped.
///
/// # Errors
///
/// - [`TypesError::InvalidVersion`] if `version` is not a semantic version.
/// - [`TypesError::VersionOverflow`] if the bumped component is already
///   `u64::MAX`.
pub fn bump_version(version: &str, bump: VersionBump) -> Result<String, TypesError> {
    let current = parse_version(version)?;
    let overflow = || TypesError::VersionOverflow {
        version: version.to_string(),
    };
    let next = match bump {
        VersionBump::Patch => semver::Version::new(
            current.major,
            current.minor,
            current.patch.checked_add(1).ok_or_else(overflow)?,
        ),
        VersionBump::Minor => semver::Version::new(
            current.major,
            current.minor.checked_add(1).ok_or_else(overflow)?,
            0,
        ),
        VersionBump::Major => {
            semver::Version::new(current.major.checked_add(1).ok_or_else(overflow)?, 0, 0)
        }
    };
    Ok(next.to_string())
}

fn parse_version(version: &str) -> Result<semver::Version, TypesError> {
    semver::Version::parse(version).map_err(|source| TypesError::InvalidVersion {
        version: version.to_string(),
        source,
    })
}

/// A governance policy shared across a federation.
///
/// Every edit produces a new immutable value; the policy store keeps the full
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedPolicy {
    /// Policy identifier, stable across versions.
    pub policy_id: String,
    /// Human-readable name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Policy body.
    pub content: String,
    /// SHA-256 hex digest of `content`.
    pub content_hash: String,
    /// Visibility scope.
    pub scope: PolicyScope,
    /// Organization that owns and signed this version.
    pub owner_org_id: String,
    /// Semantic version string.
    pub version: String,
    /// When this version takes effect.
    pub effective_from: DateTime<Utc>,
    /// When this version stops applying, if ever.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Ancestor references, oldest first, as `owner:version`.
    #[serde(default)]
    pub inheritance_chain: Vec<String>,
    /// Organizations permitted to use the policy. Empty means unrestricted.
    #[serde(default)]
    pub allowed_orgs: Vec<String>,
    /// Compliance frameworks a user of the policy must hold.
    #[serde(default)]
    pub required_compliance: Vec<String>,
    /// Hex HMAC over the canonical form.
    #[serde(default)]
    pub signature: Option<String>,
}

impl Canonical for FederatedPolicy {
    const SIGNATURE_FIELDS: &'static [&'static str] = &["signature"];
}

impl FederatedPolicy {
    /// Returns the digest recorded for a policy body.
    pub fn hash_content(content: &str) -> String {
        sha256_hex(content.as_bytes())
    }

    /// Whether `content_hash` matches `content`.
    pub fn content_matches_hash(&self) -> bool {
        Self::hash_content(&self.content) == self.content_hash
    }

    /// This version as an inheritance-chain entry.
    pub fn chain_reference(&self) -> String {
        format!("{}:{}", self.owner_org_id, self.version)
    }

    /// Parses `version`.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidVersion`] if it is not a semantic version.
    pub fn semantic_version(&self) -> Result<semver::Version, TypesError> {
        parse_version(&self.version)
    }

    /// Whether `version` is strictly newer than `other`. Unparseable versions
    /// are never newer.
    pub fn is_newer_than(&self, other: &str) -> bool {
        match (self.semantic_version(), parse_version(other)) {
            (Ok(mine), Ok(theirs)) => mine > theirs,
            _ => false,
        }
    }

    /// Whether the policy applies at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_from <= now && self.expires_at.map_or(true, |expiry| now < expiry)
    }
}
