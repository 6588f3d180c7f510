//! Cross-organization audit trail.
//!
//! Every federation operation is recorded as a signed [`FederationEvent`] in
//! an append-only log. The log is committed in batches of [`BATCH_SIZE`]
//! events: when a batch fills, a SHA-256 Merkle root over its events is
//! recorded, and from then on any event in the batch has an inclusion proof
//! a third party can check against that root.
//!
//! Proofs lag the log. An event in an open batch is queryable but has no
//! proof until the batch closes.
//!
//! Peers can also be given a [`PrivacySummary`]: counts by event type and
//! period bounds, with no payloads.
//!
//! [`FederationEvent`]: entente_types::FederationEvent

mod error;
pub mod merkle;
mod trail;

pub use error::AuditError;
pub use merkle::{MerkleProof, MerkleRoot, BATCH_SIZE};
pub use trail::{verify_event_signature, CrossOrgAuditTrail, PrivacySummary};
