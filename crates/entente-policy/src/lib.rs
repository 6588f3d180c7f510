//! Policy distribution and versioning across a federation.
//!
//! Organizations author policies locally, publish new immutable versions,
//! adopt peers' policies (verbatim or with local overrides), and exchange
//! signed versions over HTTP. Every version ever produced is kept so that
//! conflicts can be resolved and versions rolled back.
//!
//! # Authenticity
//!
//! A policy is accepted from a peer only if
//!
//! - its `content_hash` is the SHA-256 of its `content`, and
//! - its signature verifies over its canonical form with the key registered
//!   for its `owner_org_id`.
//!
//! Anything else is discarded and logged.
//!
//! # Conflict resolution
//!
//! | Strategy | Result |
//! |----------|--------|
//! | `latest` | version with the greatest `effective_from` |
//! | `leader` | version owned by the federation leader |
//! | `merge`  | [`PolicyError::MergeNotImplemented`] |

pub mod conflict;
pub mod error;
pub mod protocol;
pub mod store;
pub mod transport;

pub use conflict::{resolve, ConflictStrategy};
pub use error::PolicyError;
pub use protocol::{verify_policy_signature, PolicySyncProtocol};
pub use store::PolicyStore;
pub use transport::PolicyTransport;
