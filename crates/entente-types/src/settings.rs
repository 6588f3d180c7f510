//! Protocol timing and transport settings shared by the federation crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-call timeout for every network operation, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Lifetime of an issued challenge, in seconds.
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;

/// Governance-identity tag attached to every outgoing payload.
pub const DEFAULT_GOVERNANCE_HASH: &str = "e7c3f1a0b9d24c58";

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_challenge_ttl_secs() -> u64 {
    DEFAULT_CHALLENGE_TTL_SECS
}

fn default_discovery_scheme() -> String {
    "https".to_string()
}

fn default_governance_hash() -> String {
    DEFAULT_GOVERNANCE_HASH.to_string()
}

/// Settings consumed by the trust, policy and federation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSettings {
    /// Timeout applied to each outbound request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long an issued challenge stays answerable.
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: u64,

    /// URL scheme used to fetch well-known identity documents.
    #[serde(default = "default_discovery_scheme")]
    pub discovery_scheme: String,

    /// Constant governance-identity tag sent with every payload.
    #[serde(default = "default_governance_hash")]
    pub governance_hash: String,
}

impl Default for FederationSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            challenge_ttl_secs: default_challenge_ttl_secs(),
            discovery_scheme: default_discovery_scheme(),
            governance_hash: default_governance_hash(),
        }
    }
}

impl FederationSettings {
    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
