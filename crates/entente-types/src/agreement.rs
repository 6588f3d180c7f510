//! Federation agreements and compliance attestations.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;

/// The contract binding a federation's members.
///
/// Only `member_org_ids` and `signatures` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederationAgreement {
    /// Agreement identifier.
    pub agreement_id: String,
    /// Federation name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Organization that created the agreement.
    pub leader_org_id: String,
    /// Member organizations, the leader included.
    pub member_org_ids: BTreeSet<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When the agreement takes effect.
    pub effective_from: DateTime<Utc>,
    /// When the agreement lapses, if ever.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Policies shared under the agreement.
    #[serde(default)]
    pub shared_policy_ids: Vec<String>,
    /// Compliance frameworks every member must hold.
    #[serde(default)]
    pub required_compliance: Vec<String>,
    /// Dispute-resolution mechanism.
    pub dispute_resolution: String,
    /// Region → data-residency rule.
    #[serde(default)]
    pub data_residency_rules: BTreeMap<String, String>,
    /// Days of notice required before a member leaves.
    pub termination_notice_days: u32,
    /// Org id → hex signature over the canonical agreement.
    #[serde(default)]
    pub signatures: BTreeMap<String, String>,
}

impl Canonical for FederationAgreement {
    const SIGNATURE_FIELDS: &'static [&'static str] = &["signatures"];
}

impl FederationAgreement {
    /// Whether the agreement is in force at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_from <= now && self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

/// A verifiable claim that an organization satisfies a compliance framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAttestation {
    /// Attestation identifier.
    pub attestation_id: String,
    /// Attested organization.
    pub org_id: String,
    /// Compliance framework identifier (e.g. `SOC2`).
    pub framework: String,
    /// When the attestation was issued.
    pub attested_at: DateTime<Utc>,
    /// End of the validity period.
    pub valid_until: DateTime<Utc>,
    /// Third-party auditor, if any.
    #[serde(default)]
    pub auditor_org_id: Option<String>,
    /// Hash of the supporting evidence.
    pub evidence_hash: String,
    /// Hex signature by the issuer.
    #[serde(default)]
    pub signature: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Canonical for ComplianceAttestation {
    const SIGNATURE_FIELDS: &'static [&'static str] = &["signature"];
}

impl ComplianceAttestation {
    /// Whether the attestation is in its validity period at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.attested_at <= now && now < self.valid_until
    }
}
