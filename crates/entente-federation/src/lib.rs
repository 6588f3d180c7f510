//! Federation lifecycle orchestration.
//!
//! [`FederationGovernor`] owns one instance of each protocol (trust
//! establishment, policy sync and the audit trail) and sequences them into
//! the operations an organization performs:
//!
//! | Operation | Phases |
//! |-----------|--------|
//! | join | discover leader → challenge round trip → compliance → record |
//! | create | self-signed agreement with the local org as sole leader |
//! | invite | discover target → pending invitation |
//! | admit | verify countersignature → add member → renew leader signature |
//! | sync | pull shared policies from every known organization |
//! | push | offer a local policy version to peer endpoints |
//!
//! Every lifecycle change is recorded in the audit trail. No lock is held
//! while a network call is in flight.

mod error;
mod governor;
mod status;

pub use error::FederationError;
pub use governor::{
    FederationGovernor, PendingInvitation, DEFAULT_DISPUTE_RESOLUTION,
    DEFAULT_TERMINATION_NOTICE_DAYS,
};
pub use status::FederationStatus;
