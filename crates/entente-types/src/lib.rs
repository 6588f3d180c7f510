//! Shared types, error definitions, and constants for the Entente federation.
//!
//! This crate provides the data model exchanged between federated
//! organizations: identities, policies, agreements, compliance attestations
//! and audit events. It also owns the two primitives every signed structure
//! relies on:
//!
//! - the **canonical form** ([`Canonical`]): a sorted-key JSON serialisation
//!   with the signature field(s) removed, used as the exact byte input to
//!   signing and verification;
//! - **key material** ([`FederationKey`], [`VerificationKey`]) and the
//!   HMAC-SHA256 helpers built on it.
//!
//! No protocol crate depends on another; they all depend on `entente-types`
//! for cross-cutting definitions.

pub mod agreement;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod identity;
pub mod policy;
pub mod settings;
pub mod wire;

pub use agreement::{ComplianceAttestation, FederationAgreement};
pub use canonical::{canonical_bytes, Canonical};
pub use crypto::{hmac_sha256, sha256_hex, FederationKey, VerificationKey, MAC_LENGTH};
pub use error::TypesError;
pub use event::FederationEvent;
pub use identity::{OrganizationIdentity, OrganizationRole, TrustLevel};
pub use policy::{bump_version, FederatedPolicy, PolicyScope, VersionBump};
pub use settings::FederationSettings;

/// Returns the current unix time in whole seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
