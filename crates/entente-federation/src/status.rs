//! Read-only federation snapshots.

use entente_types::{OrganizationRole, TrustLevel};
use serde::{Deserialize, Serialize};

/// A point-in-time summary of the local organization's federation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationStatus {
    /// Local organization id.
    pub org_id: String,
    /// Local organization name.
    pub name: String,
    /// Local organization domain.
    pub domain: String,
    /// Role the local organization plays.
    pub role: OrganizationRole,
    /// Trust level recorded on the local identity.
    pub trust_level: TrustLevel,
    /// Peers that completed a handshake with us.
    pub known_organizations: usize,
    /// Agreements in force right now.
    pub active_agreements: usize,
    /// Distinct locally authored or adopted policies.
    pub local_policies: usize,
    /// Events in the audit trail.
    pub audit_events: usize,
    /// Committed Merkle batches.
    pub merkle_roots: usize,
    /// Invitations awaiting a countersignature.
    pub pending_invitations: usize,
    /// Governance-identity tag.
    pub governance_hash: String,
}
