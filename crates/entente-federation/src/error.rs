//! Error types for federation orchestration.

use entente_audit::AuditError;
use entente_policy::PolicyError;
use entente_trust::TrustError;

/// Errors that can occur during federation lifecycle operations.
///
/// Failed handshakes are not errors; `join_federation` and `invite_member`
/// report them as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// The trust protocol failed locally.
    #[error("trust error: {0}")]
    Trust(#[from] TrustError),

    /// The policy protocol failed locally.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// The audit trail could not record an event.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// No agreement with this id is held locally.
    #[error("unknown agreement: {0}")]
    UnknownAgreement(String),

    /// Only the agreement's leader may invite or admit members.
    #[error("organization {org_id} does not lead agreement {agreement_id}")]
    NotLeader {
        /// Agreement id.
        agreement_id: String,
        /// Local organization id.
        org_id: String,
    },

    /// No invitation is pending for this organization and agreement.
    #[error("no pending invitation for {org_id} to agreement {agreement_id}")]
    NoInvitation {
        /// Agreement id.
        agreement_id: String,
        /// Invitee.
        org_id: String,
    },

    /// The configured identity does not publish the local key.
    #[error("identity public key does not match the federation key")]
    KeyMismatch,
}
