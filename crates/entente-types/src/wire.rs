//! HTTP paths and request/response envelopes exchanged between peers.

use serde::{Deserialize, Serialize};

use crate::agreement::ComplianceAttestation;
use crate::policy::FederatedPolicy;

/// Path of the identity document under a peer's domain.
pub const WELL_KNOWN_PATH: &str = "/.well-known/acgs-federation";

/// Attestation listing, relative to a federation endpoint.
pub const ATTESTATIONS_PATH: &str = "/api/v1/compliance/attestations";

/// Policy distribution, relative to a federation endpoint.
pub const POLICIES_PATH: &str = "/api/v1/federation/policies";

/// Challenge answering, relative to a federation endpoint.
pub const CHALLENGE_PATH: &str = "/api/v1/federation/challenge";

/// Agreements held by a leader, relative to a federation endpoint. An
/// agreement lives at `{AGREEMENTS_PATH}/{agreement_id}` and its
/// countersignatures are submitted to `.../members`.
pub const AGREEMENTS_PATH: &str = "/api/v1/federation/agreements";

/// Federation status snapshot, relative to a federation endpoint.
pub const STATUS_PATH: &str = "/api/v1/federation/status";

/// Header carrying the governance-identity tag on outgoing requests.
pub const GOVERNANCE_HASH_HEADER: &str = "x-governance-hash";

/// Status value returned when a pushed policy is accepted.
pub const STATUS_ACCEPTED: &str = "accepted";

/// Status value returned when a pushed policy is rejected.
pub const STATUS_REJECTED: &str = "rejected";

/// Joins a base endpoint and an API path without doubling slashes.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// URL of one agreement under a leader's federation endpoint.
pub fn agreement_url(base: &str, agreement_id: &str) -> String {
    format!("{}/{}", endpoint_url(base, AGREEMENTS_PATH), agreement_id)
}

/// URL a prospective member posts its countersignature to.
pub fn membership_url(base: &str, agreement_id: &str) -> String {
    format!("{}/members", agreement_url(base, agreement_id))
}

/// Body of `GET {endpoint}/api/v1/compliance/attestations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationsResponse {
    /// The organization's attestations.
    pub attestations: Vec<ComplianceAttestation>,
    /// Governance-identity tag of the responder.
    #[serde(default)]
    pub governance_hash: Option<String>,
}

/// Body of `GET {endpoint}/api/v1/federation/policies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyListResponse {
    /// Current versions of the responder's shared policies.
    pub policies: Vec<FederatedPolicy>,
    /// Governance-identity tag of the responder.
    #[serde(default)]
    pub governance_hash: Option<String>,
}

/// Query string of `GET {endpoint}/api/v1/federation/policies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyQuery {
    /// Only return versions strictly newer than this.
    #[serde(default)]
    pub since_version: Option<String>,
}

/// Body of the answer to `POST {endpoint}/api/v1/federation/policies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyPushResponse {
    /// `accepted` or `rejected`.
    pub status: String,
    /// Governance-identity tag of the responder.
    #[serde(default)]
    pub governance_hash: Option<String>,
}

/// Body of `POST {endpoint}/api/v1/federation/challenge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// Organization issuing the challenge.
    pub challenger_org_id: String,
    /// Hex-encoded challenge bytes.
    pub challenge: String,
}

/// Answer to a [`ChallengeRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Hex-encoded `mac ∥ timestamp`.
    pub response: String,
    /// Governance-identity tag of the responder.
    #[serde(default)]
    pub governance_hash: Option<String>,
}

/// Body of `POST {endpoint}/api/v1/federation/agreements/{id}/members`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRequest {
    /// Invited organization.
    pub org_id: String,
    /// Hex countersignature over the agreement as received.
    pub signature: String,
}

/// Answer to a [`MembershipRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipResponse {
    /// `accepted` or `rejected`.
    pub status: String,
    /// Governance-identity tag of the responder.
    #[serde(default)]
    pub governance_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_handles_trailing_slash() {
        assert_eq!(
            endpoint_url("https://a.example.com/", POLICIES_PATH),
            "https://a.example.com/api/v1/federation/policies"
        );
        assert_eq!(
            endpoint_url("https://a.example.com", ATTESTATIONS_PATH),
            "https://a.example.com/api/v1/compliance/attestations"
        );
    }

    #[test]
    fn membership_url_nests_under_agreement() {
        assert_eq!(
            membership_url("http://127.0.0.1:3000/", "agr-1"),
            "http://127.0.0.1:3000/api/v1/federation/agreements/agr-1/members"
        );
    }

    #[test]
    fn governance_hash_is_optional_on_input() {
        let parsed: PolicyPushResponse = serde_json::from_str(r#"{"status":"accepted"}"#).unwrap();
        assert_eq!(parsed.status, STATUS_ACCEPTED);
        assert!(parsed.governance_hash.is_none());
    }
}
