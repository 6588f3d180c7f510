//! Replay-resistant challenge-response.
//!
//! Response layout: `HMAC-SHA256(key, challenge ∥ org_id ∥ ts) ∥ ts`, where
//! `ts` is the responder's unix time as a big-endian `u64`. The verifier
//! consumes the stored challenge on every verification attempt, so a
//! challenge can never be answered twice.

use std::collections::HashMap;

use entente_types::{FederationKey, VerificationKey, MAC_LENGTH};
use rand::RngCore;

/// Length of an issued challenge.
pub const CHALLENGE_LENGTH: usize = 32;

/// Length of a challenge response: the MAC followed by an 8-byte timestamp.
pub const RESPONSE_LENGTH: usize = MAC_LENGTH + 8;

/// Builds the message a responder authenticates.
pub fn challenge_message(challenge: &[u8], org_id: &str, timestamp: u64) -> Vec<u8> {
    let mut message = Vec::with_capacity(challenge.len() + org_id.len() + 8);
    message.extend_from_slice(challenge);
    message.extend_from_slice(org_id.as_bytes());
    message.extend_from_slice(&timestamp.to_be_bytes());
    message
}

/// Answers `challenge` as `org_id` at unix time `now`.
pub fn build_challenge_response(
    key: &FederationKey,
    org_id: &str,
    challenge: &[u8],
    now: u64,
) -> Vec<u8> {
    let tag = key.sign(&challenge_message(challenge, org_id, now));
    let mut response = Vec::with_capacity(RESPONSE_LENGTH);
    response.extend_from_slice(&tag);
    response.extend_from_slice(&now.to_be_bytes());
    response
}

#[derive(Debug, Clone)]
struct PendingChallenge {
    challenge: [u8; CHALLENGE_LENGTH],
    issued_at: u64,
}

/// Outstanding challenges, keyed by the organization they were issued to.
#[derive(Debug)]
pub struct ChallengeTable {
    pending: HashMap<String, PendingChallenge>,
    ttl_secs: u64,
}

impl ChallengeTable {
    /// Creates an empty table whose challenges live for `ttl_secs`.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            pending: HashMap::new(),
            ttl_secs,
        }
    }

    /// Issues a fresh random challenge to `target_org_id` at unix time `now`.
    ///
    /// A challenge still outstanding for the same organization is replaced.
    pub fn issue(&mut self, target_org_id: &str, now: u64) -> [u8; CHALLENGE_LENGTH] {
        let mut challenge = [0u8; CHALLENGE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut challenge);
        self.pending.insert(
            target_org_id.to_string(),
            PendingChallenge {
                challenge,
                issued_at: now,
            },
        );
        challenge
    }

    /// Number of challenges awaiting verification.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Verifies `response` from `target_org_id` against `key` at unix time
    /// `now`.
    ///
    /// The stored challenge is consumed whatever the outcome.
    pub fn verify(
        &mut self,
        target_org_id: &str,
        response: &[u8],
        key: &VerificationKey,
        now: u64,
    ) -> bool {
        let Some(pending) = self.pending.remove(target_org_id) else {
            tracing::warn!(org_id = target_org_id, "no outstanding challenge");
            return false;
        };

        if now.saturating_sub(pending.issued_at) > self.ttl_secs {
            tracing::warn!(
                org_id = target_org_id,
                issued_at = pending.issued_at,
                "challenge expired before verification"
            );
            return false;
        }

        if response.len() != RESPONSE_LENGTH {
            tracing::warn!(
                org_id = target_org_id,
                len = response.len(),
                "malformed challenge response"
            );
            return false;
        }

        let (tag, timestamp_bytes) = response.split_at(MAC_LENGTH);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(timestamp_bytes);
        let timestamp = u64::from_be_bytes(raw);

        if now.abs_diff(timestamp) > self.ttl_secs {
            tracing::warn!(
                org_id = target_org_id,
                timestamp,
                now,
                "challenge response timestamp outside validity window"
            );
            return false;
        }

        let message = challenge_message(&pending.challenge, target_org_id, timestamp);
        let valid = key.verify(&message, tag);
        if !valid {
            tracing::warn!(org_id = target_org_id, "challenge response signature mismatch");
        }
        valid
    }

    /// Drops every challenge older than the validity window at `now`.
    ///
    /// Returns the number of challenges removed.
    pub fn prune_expired(&mut self, now: u64) -> usize {
        let before = self.pending.len();
        let ttl = self.ttl_secs;
        self.pending
            .retain(|_, pending| now.saturating_sub(pending.issued_at) <= ttl);
        before - self.pending.len()
    }
}
