//! The trust establishment protocol.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use entente_types::wire::{
    endpoint_url, AttestationsResponse, ChallengeRequest, ChallengeResponse, ATTESTATIONS_PATH,
    CHALLENGE_PATH, GOVERNANCE_HASH_HEADER, WELL_KNOWN_PATH,
};
use entente_types::{
    unix_now, Canonical, FederationAgreement, FederationKey, FederationSettings,
    OrganizationIdentity, TrustLevel, VerificationKey,
};
use serde::de::DeserializeOwned;

use crate::challenge::{build_challenge_response, ChallengeTable, CHALLENGE_LENGTH};
use crate::error::TrustError;

/// Runs the trust handshake on behalf of the local organization.
///
/// Owns the local signing key, the table of outstanding challenges and an
/// HTTP client configured with the per-request timeout.
///
/// Every method takes `&self`. The challenge table sits behind a
/// `std::sync::Mutex` that is only held for map operations, never across a
/// network call, so one protocol value can be shared between tasks.
#[derive(Debug)]
pub struct TrustEstablishmentProtocol {
    local_org_id: String,
    key: FederationKey,
    settings: FederationSettings,
    client: reqwest::Client,
    challenges: Mutex<ChallengeTable>,
}

impl TrustEstablishmentProtocol {
    /// Creates the protocol for `local_org_id`, signing with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Client`] if the HTTP client cannot be built.
    pub fn new(
        local_org_id: impl Into<String>,
        key: FederationKey,
        settings: FederationSettings,
    ) -> Result<Self, TrustError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        let challenges = Mutex::new(ChallengeTable::new(settings.challenge_ttl_secs));

        Ok(Self {
            local_org_id: local_org_id.into(),
            key,
            settings,
            client,
            challenges,
        })
    }

    /// The local organization id.
    pub fn local_org_id(&self) -> &str {
        &self.local_org_id
    }

    /// Verification material for the local key.
    pub fn verification_key(&self) -> VerificationKey {
        self.key.verification_key()
    }

    /// Number of challenges awaiting a response.
    pub fn pending_challenges(&self) -> usize {
        self.challenges().pending_count()
    }

    fn challenges(&self) -> MutexGuard<'_, ChallengeTable> {
        self.challenges.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Phase 1: discovery ───────────────────────────────────────────

    /// Fetches the identity document published under `domain`.
    ///
    /// The returned identity starts at [`TrustLevel::Basic`]; whatever trust
    /// level the peer advertises for itself is discarded. Returns `None` on
    /// any transport or parse failure, or when the document claims a
    /// different domain.
    pub async fn initiate_discovery(&self, domain: &str) -> Option<OrganizationIdentity> {
        let url = format!(
            "{}://{}{}",
            self.settings.discovery_scheme, domain, WELL_KNOWN_PATH
        );

        let mut identity: OrganizationIdentity = match self.fetch_json(&url).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(domain, %url, "identity discovery failed: {}", e);
                return None;
            }
        };

        if !identity.domain.eq_ignore_ascii_case(domain) {
            tracing::warn!(
                domain,
                claimed = %identity.domain,
                "identity document claims a different domain"
            );
            return None;
        }

        identity.trust_level = TrustLevel::None;
        identity.last_verified = None;
        self.elevate_trust(&mut identity, TrustLevel::Basic);

        tracing::info!(domain, org_id = %identity.org_id, "discovered federation identity");
        Some(identity)
    }

    // ── Phase 2: challenge-response ──────────────────────────────────

    /// Issues a challenge to `target_org_id`.
    pub fn create_challenge(&self, target_org_id: &str) -> [u8; CHALLENGE_LENGTH] {
        self.create_challenge_at(target_org_id, unix_now())
    }

    /// [`Self::create_challenge`] with an explicit unix time.
    pub fn create_challenge_at(&self, target_org_id: &str, now: u64) -> [u8; CHALLENGE_LENGTH] {
        tracing::debug!(org_id = target_org_id, "issuing challenge");
        self.challenges().issue(target_org_id, now)
    }

    /// Answers a challenge as the local organization.
    ///
    /// Returns `mac ∥ timestamp`, 40 bytes.
    pub fn respond_to_challenge(&self, challenge: &[u8]) -> Vec<u8> {
        self.respond_to_challenge_at(challenge, unix_now())
    }

    /// [`Self::respond_to_challenge`] with an explicit unix time.
    pub fn respond_to_challenge_at(&self, challenge: &[u8], now: u64) -> Vec<u8> {
        build_challenge_response(&self.key, &self.local_org_id, challenge, now)
    }

    /// Verifies a response from `target_org_id` using its published key.
    ///
    /// The outstanding challenge is consumed whether or not verification
    /// succeeds.
    pub fn verify_challenge_response(
        &self,
        target_org_id: &str,
        response: &[u8],
        target_public_key: &VerificationKey,
    ) -> bool {
        self.verify_challenge_response_at(target_org_id, response, target_public_key, unix_now())
    }

    /// [`Self::verify_challenge_response`] with an explicit unix time.
    pub fn verify_challenge_response_at(
        &self,
        target_org_id: &str,
        response: &[u8],
        target_public_key: &VerificationKey,
        now: u64,
    ) -> bool {
        let verified = self
            .challenges()
            .verify(target_org_id, response, target_public_key, now);
        if verified {
            tracing::info!(org_id = target_org_id, "challenge response verified");
        }
        verified
    }

    /// Sends `challenge` to the peer's challenge endpoint and returns its raw
    /// response, or `None` on transport failure.
    pub async fn request_challenge_response(
        &self,
        identity: &OrganizationIdentity,
        challenge: &[u8],
    ) -> Option<Vec<u8>> {
        let url = endpoint_url(&identity.federation_endpoint, CHALLENGE_PATH);
        let request = ChallengeRequest {
            challenger_org_id: self.local_org_id.clone(),
            challenge: hex::encode(challenge),
        };

        let result = async {
            self.client
                .post(&url)
                .header(GOVERNANCE_HASH_HEADER, &self.settings.governance_hash)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<ChallengeResponse>()
                .await
        }
        .await;

        match result {
            Ok(answer) => match hex::decode(&answer.response) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(org_id = %identity.org_id, "challenge response is not hex: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!(org_id = %identity.org_id, %url, "challenge request failed: {}", e);
                None
            }
        }
    }

    // ── Phase 3: compliance ──────────────────────────────────────────

    /// Checks that `identity` holds a currently valid attestation for every
    /// framework in `required_frameworks`.
    ///
    /// Returns `false` on transport failure.
    pub async fn verify_compliance(
        &self,
        identity: &OrganizationIdentity,
        required_frameworks: &[String],
    ) -> bool {
        let url = endpoint_url(&identity.federation_endpoint, ATTESTATIONS_PATH);
        let listing: AttestationsResponse = match self.fetch_json(&url).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(org_id = %identity.org_id, %url, "attestation fetch failed: {}", e);
                return false;
            }
        };

        let now = Utc::now();
        let covered: BTreeSet<&str> = listing
            .attestations
            .iter()
            .filter(|a| a.org_id == identity.org_id && a.is_valid_at(now))
            .map(|a| a.framework.as_str())
            .collect();

        let missing: Vec<&str> = required_frameworks
            .iter()
            .map(String::as_str)
            .filter(|framework| !covered.contains(framework))
            .collect();

        if !missing.is_empty() {
            tracing::warn!(
                org_id = %identity.org_id,
                ?missing,
                "compliance requirements not met"
            );
            return false;
        }

        tracing::info!(org_id = %identity.org_id, "compliance verified");
        true
    }

    // ── Phase 4: agreements ──────────────────────────────────────────

    /// Signs `agreement` with the local key. Existing signatures are not part
    /// of the signed form.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Canonical`] if the agreement cannot be
    /// serialised.
    pub fn sign_agreement(&self, agreement: &FederationAgreement) -> Result<String, TrustError> {
        let bytes = agreement.canonical_bytes()?;
        Ok(self.key.sign_hex(&bytes))
    }

    /// Checks `signature` by `org_id` over `agreement` using `public_key`.
    pub fn verify_agreement_signature(
        &self,
        agreement: &FederationAgreement,
        org_id: &str,
        signature: &str,
        public_key: &VerificationKey,
    ) -> bool {
        let bytes = match agreement.canonical_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(org_id, "agreement canonicalisation failed: {}", e);
                return false;
            }
        };

        let valid = public_key.verify_hex(&bytes, signature);
        if !valid {
            tracing::warn!(
                org_id,
                agreement_id = %agreement.agreement_id,
                "agreement signature mismatch"
            );
        }
        valid
    }

    /// Raises `identity` to `level`, stamping `last_verified`.
    ///
    /// Returns `false` if the identity already holds `level` or higher.
    pub fn elevate_trust(&self, identity: &mut OrganizationIdentity, level: TrustLevel) -> bool {
        let previous = identity.trust_level;
        if !identity.elevate_trust(level) {
            return false;
        }
        identity.last_verified = Some(Utc::now());
        tracing::info!(
            org_id = %identity.org_id,
            from = %previous,
            to = %level,
            "trust level raised"
        );
        true
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, reqwest::Error> {
        self.client
            .get(url)
            .header(GOVERNANCE_HASH_HEADER, &self.settings.governance_hash)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }
}
