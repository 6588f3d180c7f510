//! Trust establishment between federating organizations.
//!
//! Before two organizations federate they run a four-phase handshake. Each
//! phase is independently retriable and must succeed before the next is
//! attempted:
//!
//! 1. **Discovery**: fetch the peer's identity document from
//!    `/.well-known/acgs-federation` under its domain.
//! 2. **Challenge-response**: send 32 random bytes, receive
//!    `HMAC(key, challenge ∥ org_id ∥ time) ∥ time`, verify it against the
//!    peer's published key. Challenges are single use and expire.
//! 3. **Compliance verification**: fetch the peer's attestations and check
//!    every required framework is covered by a currently valid one.
//! 4. **Agreement signing**: sign and verify federation agreements over
//!    their canonical form.
//!
//! Transport failures never surface as errors: discovery returns `None`,
//! compliance returns `false`, and the failure is logged. The caller decides
//! whether to retry.

pub mod challenge;
pub mod error;
pub mod protocol;

pub use challenge::{
    build_challenge_response, challenge_message, ChallengeTable, CHALLENGE_LENGTH,
    RESPONSE_LENGTH,
};
pub use error::TrustError;
pub use protocol::TrustEstablishmentProtocol;
