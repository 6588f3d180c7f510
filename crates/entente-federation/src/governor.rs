//! The federation governor.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use entente_audit::CrossOrgAuditTrail;
use entente_policy::{PolicyError, PolicySyncProtocol, PolicyTransport};
use entente_trust::TrustEstablishmentProtocol;
use entente_types::{
    ComplianceAttestation, FederationAgreement, FederationKey, FederationSettings,
    OrganizationIdentity, OrganizationRole, TrustLevel,
};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::FederationError;
use crate::status::FederationStatus;

/// Dispute mechanism recorded on agreements this node creates.
pub const DEFAULT_DISPUTE_RESOLUTION: &str = "leader-mediated-arbitration";

/// Notice period recorded on agreements this node creates.
pub const DEFAULT_TERMINATION_NOTICE_DAYS: u32 = 30;

/// An invitation sent to a discovered organization, awaiting its
/// countersignature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInvitation {
    /// Agreement the invitee was invited to.
    pub agreement_id: String,
    /// The invitee's identity as discovered.
    pub identity: OrganizationIdentity,
    /// When the invitation was recorded.
    pub invited_at: DateTime<Utc>,
}

/// Runs the federation lifecycle for one organization.
///
/// Owns one instance of each protocol and sequences them. The protocols
/// never talk to each other directly.
///
/// Every method takes `&self`, so a governor is shared as a plain
/// `Arc<FederationGovernor>`. Mutable state sits behind a
/// `std::sync::RwLock` that is held only for in-memory reads and writes.
/// Lifecycle operations snapshot what they need, release the lock for
/// every network round trip and re-acquire it to commit, so the handlers
/// serving peers never wait on this node's own outbound calls.
#[derive(Debug)]
pub struct FederationGovernor {
    settings: FederationSettings,
    trust: TrustEstablishmentProtocol,
    policy_transport: PolicyTransport,
    state: RwLock<GovernorState>,
}

#[derive(Debug)]
struct GovernorState {
    identity: OrganizationIdentity,
    policy_sync: PolicySyncProtocol,
    audit: CrossOrgAuditTrail,
    known_orgs: BTreeMap<String, OrganizationIdentity>,
    agreements: BTreeMap<String, FederationAgreement>,
    pending_invitations: HashMap<(String, String), PendingInvitation>,
    attestations: Vec<ComplianceAttestation>,
}

impl GovernorState {
    fn led_agreement(&self, agreement_id: &str) -> Result<&FederationAgreement, FederationError> {
        let agreement = self
            .agreements
            .get(agreement_id)
            .ok_or_else(|| FederationError::UnknownAgreement(agreement_id.to_string()))?;
        if agreement.leader_org_id != self.identity.org_id {
            return Err(FederationError::NotLeader {
                agreement_id: agreement_id.to_string(),
                org_id: self.identity.org_id.clone(),
            });
        }
        Ok(agreement)
    }
}

impl FederationGovernor {
    /// Creates a governor for `identity`, signing with `key`.
    ///
    /// # Errors
    ///
    /// - [`FederationError::KeyMismatch`] if `identity.public_key` is not the
    ///   verification key of `key`.
    /// - [`FederationError::Trust`] / [`FederationError::Policy`] if an HTTP
    ///   client cannot be built.
    pub fn new(
        identity: OrganizationIdentity,
        key: FederationKey,
        settings: FederationSettings,
    ) -> Result<Self, FederationError> {
        if identity.public_key != key.verification_key() {
            return Err(FederationError::KeyMismatch);
        }

        let org_id = identity.org_id.clone();
        let trust = TrustEstablishmentProtocol::new(org_id.clone(), key.clone(), settings.clone())?;
        let policy_sync = PolicySyncProtocol::new(org_id.clone(), key.clone(), settings.clone())?;
        let policy_transport = policy_sync.transport().clone();
        let audit = CrossOrgAuditTrail::new(org_id, key);

        tracing::info!(
            org_id = %identity.org_id,
            role = %identity.role,
            "federation governor ready"
        );

        Ok(Self {
            settings,
            trust,
            policy_transport,
            state: RwLock::new(GovernorState {
                identity,
                policy_sync,
                audit,
                known_orgs: BTreeMap::new(),
                agreements: BTreeMap::new(),
                pending_invitations: HashMap::new(),
                attestations: Vec::new(),
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, GovernorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GovernorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Lifecycle operations ─────────────────────────────────────────

    /// Joins the federation led by the organization at `leader_domain`.
    ///
    /// Runs discovery, a challenge round trip and compliance verification
    /// in that order. On success the leader becomes a known organization at
    /// [`TrustLevel::Certified`], its key is registered for policy sync and,
    /// if it holds the leader role, it becomes the conflict-resolution
    /// leader.
    ///
    /// Returns `Ok(false)` when any handshake phase fails.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Audit`] if the join cannot be recorded.
    pub async fn join_federation(
        &self,
        leader_domain: &str,
        required_compliance: &[String],
    ) -> Result<bool, FederationError> {
        let Some(mut leader) = self.trust.initiate_discovery(leader_domain).await else {
            tracing::warn!(leader_domain, "join aborted: discovery failed");
            return Ok(false);
        };

        let challenge = self.trust.create_challenge(&leader.org_id);
        let Some(response) = self
            .trust
            .request_challenge_response(&leader, &challenge)
            .await
        else {
            tracing::warn!(org_id = %leader.org_id, "join aborted: no challenge response");
            return Ok(false);
        };
        if !self
            .trust
            .verify_challenge_response(&leader.org_id, &response, &leader.public_key)
        {
            tracing::warn!(org_id = %leader.org_id, "join aborted: challenge verification failed");
            return Ok(false);
        }
        self.trust.elevate_trust(&mut leader, TrustLevel::Verified);

        if !self.trust.verify_compliance(&leader, required_compliance).await {
            tracing::warn!(org_id = %leader.org_id, "join aborted: compliance not verified");
            return Ok(false);
        }
        self.trust.elevate_trust(&mut leader, TrustLevel::Certified);

        let mut state = self.write();
        state
            .policy_sync
            .register_peer_key(leader.org_id.clone(), leader.public_key.clone());
        if leader.role == OrganizationRole::Leader {
            state.policy_sync.set_federation_leader(leader.org_id.clone());
        }

        state.audit.log_event(
            "federation_join",
            vec![leader.org_id.clone()],
            json!({
                "leader_domain": leader_domain,
                "required_compliance": required_compliance,
            }),
        )?;

        tracing::info!(org_id = %leader.org_id, leader_domain, "joined federation");
        state.known_orgs.insert(leader.org_id.clone(), leader);
        Ok(true)
    }

    /// Creates a new federation with the local organization as sole member
    /// and leader, signs it and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Trust`] if the agreement cannot be signed
    /// or [`FederationError::Audit`] if the creation cannot be recorded.
    pub fn create_federation(
        &self,
        name: &str,
        description: &str,
        initial_policies: Vec<String>,
        compliance_requirements: Vec<String>,
    ) -> Result<FederationAgreement, FederationError> {
        let now = Utc::now();
        let mut state = self.write();
        let local = state.identity.org_id.clone();

        for policy_id in &initial_policies {
            if state.policy_sync.get_policy(policy_id).is_none() {
                tracing::warn!(policy_id, "federation shares a policy not held locally");
            }
        }

        let mut agreement = FederationAgreement {
            agreement_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            leader_org_id: local.clone(),
            member_org_ids: BTreeSet::from([local.clone()]),
            created_at: now,
            effective_from: now,
            expires_at: None,
            shared_policy_ids: initial_policies,
            required_compliance: compliance_requirements,
            dispute_resolution: DEFAULT_DISPUTE_RESOLUTION.to_string(),
            data_residency_rules: BTreeMap::new(),
            termination_notice_days: DEFAULT_TERMINATION_NOTICE_DAYS,
            signatures: BTreeMap::new(),
        };
        let signature = self.trust.sign_agreement(&agreement)?;
        agreement.signatures.insert(local, signature);

        state.audit.log_event(
            "federation_create",
            Vec::new(),
            json!({
                "agreement_id": agreement.agreement_id,
                "name": agreement.name,
                "shared_policy_ids": agreement.shared_policy_ids,
            }),
        )?;

        tracing::info!(agreement_id = %agreement.agreement_id, name, "created federation");
        state
            .agreements
            .insert(agreement.agreement_id.clone(), agreement.clone());
        Ok(agreement)
    }

    /// Invites the organization at `target_domain` into `agreement_id`.
    ///
    /// Returns `Ok(false)` if the target cannot be discovered.
    ///
    /// # Errors
    ///
    /// - [`FederationError::UnknownAgreement`] if the agreement is not held.
    /// - [`FederationError::NotLeader`] if the local org does not lead it.
    pub async fn invite_member(
        &self,
        agreement_id: &str,
        target_domain: &str,
    ) -> Result<bool, FederationError> {
        self.read().led_agreement(agreement_id)?;

        let Some(target) = self.trust.initiate_discovery(target_domain).await else {
            tracing::warn!(agreement_id, target_domain, "invitation aborted: discovery failed");
            return Ok(false);
        };

        self.record_invitation(agreement_id, target)?;
        Ok(true)
    }

    fn record_invitation(
        &self,
        agreement_id: &str,
        target: OrganizationIdentity,
    ) -> Result<(), FederationError> {
        let mut state = self.write();
        state.led_agreement(agreement_id)?;

        let org_id = target.org_id.clone();
        state.audit.log_event(
            "federation_invite",
            vec![org_id.clone()],
            json!({
                "agreement_id": agreement_id,
                "target_domain": target.domain,
            }),
        )?;

        tracing::info!(agreement_id, %org_id, "invitation recorded");
        state.pending_invitations.insert(
            (agreement_id.to_string(), org_id),
            PendingInvitation {
                agreement_id: agreement_id.to_string(),
                identity: target,
                invited_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Signs `agreement` as a prospective member. The returned signature is
    /// handed to the leader for [`Self::accept_member`].
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Trust`] if the agreement cannot be
    /// canonicalised.
    pub fn countersign_agreement(
        &self,
        agreement: &FederationAgreement,
    ) -> Result<String, FederationError> {
        Ok(self.trust.sign_agreement(agreement)?)
    }

    /// Admits an invited organization whose countersignature verifies.
    ///
    /// The countersignature must cover the agreement as it stood when the
    /// invitation was sent. On success the member and its signature are
    /// added, the leader signature is renewed over the new terms and the
    /// member is raised to [`TrustLevel::Full`]. Returns `Ok(false)` if the
    /// countersignature does not verify; the invitation stays pending.
    ///
    /// # Errors
    ///
    /// - [`FederationError::UnknownAgreement`] / [`FederationError::NotLeader`]
    ///   as for [`Self::invite_member`].
    /// - [`FederationError::NoInvitation`] if `org_id` was not invited.
    pub fn accept_member(
        &self,
        agreement_id: &str,
        org_id: &str,
        signature: &str,
    ) -> Result<bool, FederationError> {
        let mut state = self.write();
        let agreement = state.led_agreement(agreement_id)?.clone();
        let invitation_key = (agreement_id.to_string(), org_id.to_string());
        let Some(invitation) = state.pending_invitations.remove(&invitation_key) else {
            return Err(FederationError::NoInvitation {
                agreement_id: agreement_id.to_string(),
                org_id: org_id.to_string(),
            });
        };

        if !self.trust.verify_agreement_signature(
            &agreement,
            org_id,
            signature,
            &invitation.identity.public_key,
        ) {
            state.pending_invitations.insert(invitation_key, invitation);
            return Ok(false);
        }

        let mut admitted = agreement;
        admitted.member_org_ids.insert(org_id.to_string());
        admitted
            .signatures
            .insert(org_id.to_string(), signature.to_string());
        let renewed = match self.trust.sign_agreement(&admitted) {
            Ok(renewed) => renewed,
            Err(e) => {
                state.pending_invitations.insert(invitation_key, invitation);
                return Err(e.into());
            }
        };
        admitted
            .signatures
            .insert(state.identity.org_id.clone(), renewed);

        let mut member = invitation.identity;
        self.trust.elevate_trust(&mut member, TrustLevel::Full);
        state
            .policy_sync
            .register_peer_key(member.org_id.clone(), member.public_key.clone());

        state.audit.log_event(
            "federation_member_added",
            vec![org_id.to_string()],
            json!({
                "agreement_id": agreement_id,
                "members": admitted.member_org_ids.len(),
            }),
        )?;

        tracing::info!(agreement_id, org_id, "member admitted");
        state.known_orgs.insert(member.org_id.clone(), member);
        state.agreements.insert(agreement_id.to_string(), admitted);
        Ok(true)
    }

    /// Pulls shared policies from every known organization.
    ///
    /// Peers are queried concurrently, each under the request timeout, so a
    /// stalled or failing peer neither stops nor delays the others. Returns
    /// the number of newly cached policy versions.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Audit`] if the sync cannot be recorded.
    pub async fn sync_policies(&self) -> Result<usize, FederationError> {
        let peers: Vec<(String, String)> = {
            let state = self.read();
            state
                .known_orgs
                .values()
                .filter(|org| org.org_id != state.identity.org_id)
                .map(|org| (org.org_id.clone(), org.federation_endpoint.clone()))
                .collect()
        };

        let pulls = peers.into_iter().map(|(org_id, endpoint)| async move {
            let offered = self.policy_transport.fetch_policies(&endpoint, None).await;
            (org_id, offered)
        });
        let fetched = join_all(pulls).await;

        let mut state = self.write();
        let mut total = 0;
        let mut sources = Vec::new();
        for (org_id, offered) in fetched {
            let Some(offered) = offered else {
                continue;
            };
            let synced = state.policy_sync.admit_policies(offered, None);
            if !synced.is_empty() {
                tracing::debug!(%org_id, count = synced.len(), "synced policies from peer");
                total += synced.len();
                sources.push(org_id);
            }
        }

        if total > 0 {
            state.audit.log_event(
                "policy_sync",
                sources,
                json!({ "policies_synced": total }),
            )?;
        }
        tracing::info!(total, "policy sync complete");
        Ok(total)
    }

    /// Pushes the current version of a local policy to `target_endpoints`.
    /// Returns endpoint → accepted.
    ///
    /// # Errors
    ///
    /// Returns [`FederationError::Policy`] if the policy is not held
    /// locally.
    pub async fn push_policy(
        &self,
        policy_id: &str,
        target_endpoints: &[String],
    ) -> Result<HashMap<String, bool>, FederationError> {
        let policy = self
            .read()
            .policy_sync
            .get_policy(policy_id)
            .cloned()
            .ok_or_else(|| PolicyError::NotFound(policy_id.to_string()))?;
        Ok(self
            .policy_transport
            .push_to_all(&policy, target_endpoints)
            .await)
    }

    /// A read-only snapshot of the federation state.
    pub fn get_federation_status(&self) -> FederationStatus {
        let now = Utc::now();
        let state = self.read();
        FederationStatus {
            org_id: state.identity.org_id.clone(),
            name: state.identity.name.clone(),
            domain: state.identity.domain.clone(),
            role: state.identity.role,
            trust_level: state.identity.trust_level,
            known_organizations: state.known_orgs.len(),
            active_agreements: state
                .agreements
                .values()
                .filter(|a| a.is_active_at(now))
                .count(),
            local_policies: state.policy_sync.local_policy_count(),
            audit_events: state.audit.event_count(),
            merkle_roots: state.audit.merkle_roots().len(),
            pending_invitations: state.pending_invitations.len(),
            governance_hash: self.settings.governance_hash.clone(),
        }
    }

    // ── Attestations and challenges served to peers ─────────────────

    /// Publishes an attestation for the local organization.
    ///
    /// Attestations for other organizations are ignored and `false` is
    /// returned.
    pub fn add_attestation(&self, attestation: ComplianceAttestation) -> bool {
        let mut state = self.write();
        if attestation.org_id != state.identity.org_id {
            tracing::warn!(
                attestation_id = %attestation.attestation_id,
                org_id = %attestation.org_id,
                "ignoring attestation for another organization"
            );
            return false;
        }
        state
            .identity
            .compliance_frameworks
            .insert(attestation.framework.clone());
        state.attestations.push(attestation);
        true
    }

    /// Attestations served to peers.
    pub fn attestations(&self) -> Vec<ComplianceAttestation> {
        self.read().attestations.clone()
    }

    /// Answers a peer's challenge with the local key.
    pub fn respond_to_challenge(&self, challenge: &[u8]) -> Vec<u8> {
        self.trust.respond_to_challenge(challenge)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The local identity document.
    pub fn identity(&self) -> OrganizationIdentity {
        self.read().identity.clone()
    }

    /// Shared protocol settings.
    pub fn settings(&self) -> &FederationSettings {
        &self.settings
    }

    /// The trust protocol.
    pub fn trust(&self) -> &TrustEstablishmentProtocol {
        &self.trust
    }

    /// Runs `f` against the policy protocol under the read lock.
    pub fn with_policy_sync<R>(&self, f: impl FnOnce(&PolicySyncProtocol) -> R) -> R {
        f(&self.read().policy_sync)
    }

    /// Runs `f` against the policy protocol under the write lock, for
    /// authoring policies and caching pushed ones.
    pub fn with_policy_sync_mut<R>(&self, f: impl FnOnce(&mut PolicySyncProtocol) -> R) -> R {
        f(&mut self.write().policy_sync)
    }

    /// Runs `f` against the audit trail under the read lock.
    pub fn with_audit<R>(&self, f: impl FnOnce(&CrossOrgAuditTrail) -> R) -> R {
        f(&self.read().audit)
    }

    /// A known organization by id.
    pub fn known_org(&self, org_id: &str) -> Option<OrganizationIdentity> {
        self.read().known_orgs.get(org_id).cloned()
    }

    /// Every known organization, ordered by id.
    pub fn known_orgs(&self) -> Vec<OrganizationIdentity> {
        self.read().known_orgs.values().cloned().collect()
    }

    /// An agreement by id.
    pub fn agreement(&self, agreement_id: &str) -> Option<FederationAgreement> {
        self.read().agreements.get(agreement_id).cloned()
    }

    /// Pending invitation of `org_id` to `agreement_id`.
    pub fn pending_invitation(&self, agreement_id: &str, org_id: &str) -> Option<PendingInvitation> {
        self.read()
            .pending_invitations
            .get(&(agreement_id.to_string(), org_id.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use entente_types::PolicyScope;

    fn identity(org_id: &str, key: &FederationKey, role: OrganizationRole) -> OrganizationIdentity {
        OrganizationIdentity {
            org_id: org_id.to_string(),
            name: org_id.to_uppercase(),
            domain: format!("{org_id}.example.com"),
            public_key: key.verification_key(),
            federation_endpoint: format!("https://{org_id}.example.com"),
            role,
            trust_level: TrustLevel::None,
            compliance_frameworks: BTreeSet::new(),
            last_verified: None,
            metadata: BTreeMap::new(),
        }
    }

    fn governor(org_id: &str, role: OrganizationRole) -> FederationGovernor {
        let key = FederationKey::generate();
        FederationGovernor::new(identity(org_id, &key, role), key, FederationSettings::default())
            .unwrap()
    }

    fn event_types(governor: &FederationGovernor) -> Vec<String> {
        governor.with_audit(|audit| {
            audit
                .events()
                .iter()
                .map(|e| e.event_type.clone())
                .collect()
        })
    }

    #[test]
    fn new_rejects_mismatched_key() {
        let key = FederationKey::generate();
        let other = FederationKey::generate();
        let err = FederationGovernor::new(
            identity("org-a", &other, OrganizationRole::Leader),
            key,
            FederationSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FederationError::KeyMismatch));
    }

    #[test]
    fn create_federation_is_self_signed_and_logged() {
        let a = governor("org-a", OrganizationRole::Leader);
        let policy = a
            .with_policy_sync_mut(|sync| {
                sync.create_policy("p", "", "rules", PolicyScope::Shared, vec![], vec![])
            })
            .unwrap();

        let agreement = a
            .create_federation(
                "fed",
                "test",
                vec![policy.policy_id.clone()],
                vec!["SOC2".to_string()],
            )
            .unwrap();

        assert_eq!(agreement.leader_org_id, "org-a");
        assert_eq!(agreement.member_org_ids.len(), 1);
        let signature = &agreement.signatures["org-a"];
        assert!(a.trust().verify_agreement_signature(
            &agreement,
            "org-a",
            signature,
            &a.identity().public_key
        ));
        assert!(a.agreement(&agreement.agreement_id).is_some());
        assert_eq!(event_types(&a), ["federation_create"]);
    }

    #[tokio::test]
    async fn invite_to_unknown_agreement_errors() {
        let a = governor("org-a", OrganizationRole::Leader);
        let err = a.invite_member("missing", "b.example.com").await.unwrap_err();
        assert!(matches!(err, FederationError::UnknownAgreement(_)));
    }

    #[test]
    fn accept_member_requires_invitation_and_valid_countersignature() {
        let a = governor("org-a", OrganizationRole::Leader);
        let b = governor("org-b", OrganizationRole::Member);
        let agreement = a.create_federation("fed", "", vec![], vec![]).unwrap();
        let id = agreement.agreement_id.clone();

        let countersignature = b.countersign_agreement(&agreement).unwrap();
        assert!(matches!(
            a.accept_member(&id, "org-b", &countersignature),
            Err(FederationError::NoInvitation { .. })
        ));

        a.record_invitation(&id, b.identity()).unwrap();
        assert!(a.pending_invitation(&id, "org-b").is_some());

        assert!(a.accept_member(&id, "org-b", &countersignature).unwrap());
        let admitted = a.agreement(&id).unwrap();
        assert!(admitted.member_org_ids.contains("org-b"));
        assert_eq!(admitted.signatures["org-b"], countersignature);
        assert!(a.trust().verify_agreement_signature(
            &admitted,
            "org-a",
            &admitted.signatures["org-a"],
            &a.identity().public_key
        ));
        assert_eq!(a.known_org("org-b").unwrap().trust_level, TrustLevel::Full);
        assert!(a.pending_invitation(&id, "org-b").is_none());

        assert_eq!(
            event_types(&a),
            ["federation_create", "federation_invite", "federation_member_added"]
        );
    }

    #[test]
    fn rejected_countersignature_keeps_invitation_for_retry() {
        let a = governor("org-a", OrganizationRole::Leader);
        let b = governor("org-b", OrganizationRole::Member);
        let agreement = a.create_federation("fed", "", vec![], vec![]).unwrap();
        let id = agreement.agreement_id.clone();
        a.record_invitation(&id, b.identity()).unwrap();

        let forged = a.countersign_agreement(&agreement).unwrap();
        assert!(!a.accept_member(&id, "org-b", &forged).unwrap());
        assert!(!a.accept_member(&id, "org-b", "not-hex").unwrap());

        let pending = a.pending_invitation(&id, "org-b").expect("still pending");
        assert_eq!(pending.identity.org_id, "org-b");
        assert_eq!(a.get_federation_status().pending_invitations, 1);
        assert!(!a.agreement(&id).unwrap().member_org_ids.contains("org-b"));
        assert!(a.known_org("org-b").is_none());

        let countersignature = b.countersign_agreement(&agreement).unwrap();
        assert!(a.accept_member(&id, "org-b", &countersignature).unwrap());
        assert!(a.pending_invitation(&id, "org-b").is_none());
        assert_eq!(a.get_federation_status().pending_invitations, 0);
    }

    #[test]
    fn member_cannot_admit_into_foreign_agreement() {
        let a = governor("org-a", OrganizationRole::Leader);
        let b = governor("org-b", OrganizationRole::Member);
        let agreement = a.create_federation("fed", "", vec![], vec![]).unwrap();
        b.write()
            .agreements
            .insert(agreement.agreement_id.clone(), agreement.clone());

        assert!(matches!(
            b.accept_member(&agreement.agreement_id, "org-c", "00"),
            Err(FederationError::NotLeader { .. })
        ));
    }

    #[test]
    fn status_counts_reflect_state() {
        let a = governor("org-a", OrganizationRole::Leader);
        a.with_policy_sync_mut(|sync| {
            sync.create_policy("p", "", "rules", PolicyScope::Shared, vec![], vec![])
        })
        .unwrap();
        a.create_federation("fed", "", vec![], vec![]).unwrap();

        let status = a.get_federation_status();
        assert_eq!(status.org_id, "org-a");
        assert_eq!(status.role, OrganizationRole::Leader);
        assert_eq!(status.known_organizations, 0);
        assert_eq!(status.active_agreements, 1);
        assert_eq!(status.local_policies, 1);
        assert_eq!(status.audit_events, 1);
        assert_eq!(status.merkle_roots, 0);
        assert_eq!(status.pending_invitations, 0);
    }

    #[test]
    fn attestations_are_limited_to_local_org() {
        let a = governor("org-a", OrganizationRole::Leader);
        let now = Utc::now();
        let attestation = |org_id: &str| ComplianceAttestation {
            attestation_id: "att-1".to_string(),
            org_id: org_id.to_string(),
            framework: "SOC2".to_string(),
            attested_at: now - Duration::days(1),
            valid_until: now + Duration::days(365),
            auditor_org_id: None,
            evidence_hash: "ab".to_string(),
            signature: String::new(),
            metadata: BTreeMap::new(),
        };

        assert!(a.add_attestation(attestation("org-a")));
        assert!(!a.add_attestation(attestation("org-z")));
        assert_eq!(a.attestations().len(), 1);
        assert!(a.identity().compliance_frameworks.contains("SOC2"));
    }

    #[tokio::test]
    async fn sync_with_no_peers_is_zero_and_unlogged() {
        let a = governor("org-a", OrganizationRole::Leader);
        assert_eq!(a.sync_policies().await.unwrap(), 0);
        assert!(event_types(&a).is_empty());
    }

    #[tokio::test]
    async fn push_of_unknown_policy_errors() {
        let a = governor("org-a", OrganizationRole::Leader);
        let err = a
            .push_policy("missing", &["http://127.0.0.1:1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::Policy(PolicyError::NotFound(_))));
    }
}
