//! Error types for policy distribution.

use entente_types::TypesError;

/// Errors raised by the policy layer.
///
/// These indicate caller misuse or local encoding failures. Transport and
/// verification failures during push/pull are reported through return
/// values instead.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Canonical encoding or version parsing failed.
    #[error("policy encoding error: {0}")]
    Types(#[from] TypesError),

    /// No local policy has this id.
    #[error("policy not found: {0}")]
    NotFound(String),

    /// The policy exists but the requested version was never stored.
    #[error("policy {policy_id} has no version {version}")]
    VersionNotFound {
        /// Policy id.
        policy_id: String,
        /// Requested version.
        version: String,
    },

    /// Conflict resolution was called without candidates.
    #[error("no versions supplied to resolve policy {0}")]
    NoVersions(String),

    /// A candidate version belongs to a different policy.
    #[error("version of policy {found} supplied while resolving {expected}")]
    MismatchedPolicy {
        /// Policy being resolved.
        expected: String,
        /// Policy id found on a candidate.
        found: String,
    },

    /// The strategy name is not recognised.
    #[error("unknown conflict resolution strategy: {0}")]
    UnknownStrategy(String),

    /// The `merge` strategy is reserved and not implemented.
    #[error("merge conflict resolution is not implemented")]
    MergeNotImplemented,

    /// `leader` resolution was requested but no leader is configured.
    #[error("no federation leader configured")]
    LeaderUnknown,

    /// None of the candidates is owned by the leader.
    #[error("no version of policy {policy_id} is owned by leader {leader_org_id}")]
    NoLeaderVersion {
        /// Policy being resolved.
        policy_id: String,
        /// Configured leader.
        leader_org_id: String,
    },
}
