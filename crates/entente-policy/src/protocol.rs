//! The policy synchronisation protocol.

use std::collections::HashMap;

use chrono::Utc;
use entente_types::{
    bump_version, Canonical, FederatedPolicy, FederationKey, FederationSettings, PolicyScope,
    VersionBump, VerificationKey,
};

use crate::conflict::{self, ConflictStrategy};
use crate::error::PolicyError;
use crate::store::PolicyStore;
use crate::transport::PolicyTransport;

const INITIAL_VERSION: &str = "1.0.0";

/// Checks that `policy` is intact and signed by the holder of `key`.
///
/// Both the content digest and the signature over the canonical form must
/// match. Unsigned policies never verify.
pub fn verify_policy_signature(policy: &FederatedPolicy, key: &VerificationKey) -> bool {
    if !policy.content_matches_hash() {
        return false;
    }
    let Some(signature) = policy.signature.as_deref() else {
        return false;
    };
    match policy.canonical_bytes() {
        Ok(bytes) => key.verify_hex(&bytes, signature),
        Err(_) => false,
    }
}

/// Outcome of offering a remote version to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Cached,
    Unchanged,
    Rejected,
}

/// Authors, versions and exchanges policies for the local organization.
#[derive(Debug)]
pub struct PolicySyncProtocol {
    local_org_id: String,
    key: FederationKey,
    transport: PolicyTransport,
    local: PolicyStore,
    remote_cache: HashMap<(String, String), FederatedPolicy>,
    peer_keys: HashMap<String, VerificationKey>,
    leader_org_id: Option<String>,
}

impl PolicySyncProtocol {
    /// Creates the protocol for `local_org_id`, signing with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Client`] if the HTTP client cannot be built.
    pub fn new(
        local_org_id: impl Into<String>,
        key: FederationKey,
        settings: FederationSettings,
    ) -> Result<Self, PolicyError> {
        Ok(Self {
            local_org_id: local_org_id.into(),
            key,
            transport: PolicyTransport::new(&settings)?,
            local: PolicyStore::new(),
            remote_cache: HashMap::new(),
            peer_keys: HashMap::new(),
            leader_org_id: None,
        })
    }

    /// The local organization id.
    pub fn local_org_id(&self) -> &str {
        &self.local_org_id
    }

    /// Records the verification key used for policies owned by `org_id`.
    pub fn register_peer_key(&mut self, org_id: impl Into<String>, key: VerificationKey) {
        let org_id = org_id.into();
        tracing::debug!(%org_id, "registered peer policy key");
        self.peer_keys.insert(org_id, key);
    }

    /// Sets the organization whose versions win `leader` conflict resolution.
    pub fn set_federation_leader(&mut self, org_id: impl Into<String>) {
        self.leader_org_id = Some(org_id.into());
    }

    /// The configured federation leader, if any.
    pub fn federation_leader(&self) -> Option<&str> {
        self.leader_org_id.as_deref()
    }

    // ── Local authoring ──────────────────────────────────────────────

    /// Creates version `1.0.0` of a new policy owned by the local org.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Types`] if the policy cannot be canonicalised.
    pub fn create_policy(
        &mut self,
        name: &str,
        description: &str,
        content: &str,
        scope: PolicyScope,
        allowed_orgs: Vec<String>,
        required_compliance: Vec<String>,
    ) -> Result<FederatedPolicy, PolicyError> {
        let policy = FederatedPolicy {
            policy_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            content_hash: FederatedPolicy::hash_content(content),
            scope,
            owner_org_id: self.local_org_id.clone(),
            version: INITIAL_VERSION.to_string(),
            effective_from: Utc::now(),
            expires_at: None,
            inheritance_chain: Vec::new(),
            allowed_orgs,
            required_compliance,
            signature: None,
        };

        let policy = self.sign(policy)?;
        tracing::info!(
            policy_id = %policy.policy_id,
            %scope,
            "created policy"
        );
        self.local.append(policy.clone());
        Ok(policy)
    }

    /// Publishes new content for `policy_id` as a bumped version.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::NotFound`] if no local policy has this id.
    /// - [`PolicyError::Types`] if the current version is not semver.
    pub fn update_policy(
        &mut self,
        policy_id: &str,
        content: &str,
        bump: VersionBump,
    ) -> Result<FederatedPolicy, PolicyError> {
        let current = self
            .local
            .current(policy_id)
            .cloned()
            .ok_or_else(|| PolicyError::NotFound(policy_id.to_string()))?;

        let version = bump_version(&current.version, bump)?;
        let next = self.successor(&current, content.to_string(), version);
        let next = self.sign(next)?;

        tracing::info!(
            policy_id,
            from = %current.version,
            to = %next.version,
            "updated policy"
        );
        self.local.append(next.clone());
        Ok(next)
    }

    /// Adopts a peer's policy under the same id.
    ///
    /// With `local_overrides` the adopted copy carries that content and
    /// [`PolicyScope::Override`]; otherwise the remote content is kept
    /// verbatim under [`PolicyScope::Inherited`]. The upstream version is
    /// kept and the local org becomes the owner.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Types`] if the copy cannot be canonicalised.
    pub fn inherit_policy(
        &mut self,
        remote: &FederatedPolicy,
        local_overrides: Option<&str>,
    ) -> Result<FederatedPolicy, PolicyError> {
        let (scope, content) = match local_overrides {
            Some(overrides) => (PolicyScope::Override, overrides.to_string()),
            None => (PolicyScope::Inherited, remote.content.clone()),
        };

        let mut inheritance_chain = remote.inheritance_chain.clone();
        inheritance_chain.push(remote.chain_reference());

        let adopted = FederatedPolicy {
            policy_id: remote.policy_id.clone(),
            name: remote.name.clone(),
            description: remote.description.clone(),
            content_hash: FederatedPolicy::hash_content(&content),
            content,
            scope,
            owner_org_id: self.local_org_id.clone(),
            version: remote.version.clone(),
            effective_from: Utc::now(),
            expires_at: remote.expires_at,
            inheritance_chain,
            allowed_orgs: remote.allowed_orgs.clone(),
            required_compliance: remote.required_compliance.clone(),
            signature: None,
        };

        let adopted = self.sign(adopted)?;
        tracing::info!(
            policy_id = %adopted.policy_id,
            upstream = %remote.chain_reference(),
            %scope,
            "inherited policy"
        );
        self.local.append(adopted.clone());
        Ok(adopted)
    }

    /// Re-publishes the retained `version` of `policy_id` as a new patch
    /// version of the current one.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::NotFound`] if no local policy has this id.
    /// - [`PolicyError::VersionNotFound`] if `version` was never stored.
    pub fn rollback_policy(
        &mut self,
        policy_id: &str,
        version: &str,
    ) -> Result<FederatedPolicy, PolicyError> {
        let current = self
            .local
            .current(policy_id)
            .cloned()
            .ok_or_else(|| PolicyError::NotFound(policy_id.to_string()))?;
        let target = self
            .local
            .version(policy_id, version)
            .cloned()
            .ok_or_else(|| PolicyError::VersionNotFound {
                policy_id: policy_id.to_string(),
                version: version.to_string(),
            })?;

        let next_version = bump_version(&current.version, VersionBump::Patch)?;
        let mut next = self.successor(&current, target.content, next_version);
        next.scope = target.scope;
        let next = self.sign(next)?;

        tracing::info!(
            policy_id,
            restored = version,
            as_version = %next.version,
            "rolled back policy"
        );
        self.local.append(next.clone());
        Ok(next)
    }

    /// Newest local version of `policy_id`.
    pub fn get_policy(&self, policy_id: &str) -> Option<&FederatedPolicy> {
        self.local.current(policy_id)
    }

    /// Every local version of `policy_id`, oldest first.
    pub fn policy_history(&self, policy_id: &str) -> &[FederatedPolicy] {
        self.local.history(policy_id)
    }

    /// Number of distinct local policies.
    pub fn local_policy_count(&self) -> usize {
        self.local.len()
    }

    /// Current versions of local policies offered to peers, i.e. every
    /// scope except [`PolicyScope::Local`], optionally newer than `since`.
    pub fn shared_policies_since(&self, since: Option<&str>) -> Vec<FederatedPolicy> {
        self.local
            .currents()
            .filter(|p| p.scope != PolicyScope::Local)
            .filter(|p| since.map_or(true, |since| p.is_newer_than(since)))
            .cloned()
            .collect()
    }

    // ── Exchange ─────────────────────────────────────────────────────

    /// The HTTP side of the protocol, for callers that run exchanges
    /// without holding the protocol.
    pub fn transport(&self) -> &PolicyTransport {
        &self.transport
    }

    /// Sends the current version of `policy_id` to every endpoint at once.
    ///
    /// Returns endpoint → accepted. An endpoint counts as accepted only when
    /// it answers 2xx with status `accepted`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NotFound`] if no local policy has this id.
    pub async fn push_policy_update(
        &self,
        policy_id: &str,
        target_endpoints: &[String],
    ) -> Result<HashMap<String, bool>, PolicyError> {
        let policy = self
            .local
            .current(policy_id)
            .ok_or_else(|| PolicyError::NotFound(policy_id.to_string()))?;

        Ok(self.transport.push_to_all(policy, target_endpoints).await)
    }

    /// Fetches a peer's shared policies and caches every verified version
    /// newer than `since_version`.
    ///
    /// Returns the versions that were newly cached. Transport failures yield
    /// an empty result.
    pub async fn pull_policy_updates(
        &mut self,
        source_endpoint: &str,
        since_version: Option<&str>,
    ) -> Vec<FederatedPolicy> {
        let Some(offered) = self
            .transport
            .fetch_policies(source_endpoint, since_version)
            .await
        else {
            return Vec::new();
        };
        let cached = self.admit_policies(offered, since_version);
        tracing::info!(source_endpoint, cached = cached.len(), "pulled policy updates");
        cached
    }

    /// Verifies and caches policies fetched from a peer, skipping any not
    /// newer than `since_version`.
    ///
    /// Returns the versions that were newly cached.
    pub fn admit_policies(
        &mut self,
        offered: Vec<FederatedPolicy>,
        since_version: Option<&str>,
    ) -> Vec<FederatedPolicy> {
        offered
            .into_iter()
            .filter(|policy| since_version.map_or(true, |since| policy.is_newer_than(since)))
            .filter(|policy| self.admit_remote(policy) == Admission::Cached)
            .collect()
    }

    /// Verifies a policy offered by a peer and caches it.
    ///
    /// Returns `false` when the owner is unknown or verification fails.
    pub fn accept_remote_policy(&mut self, policy: &FederatedPolicy) -> bool {
        self.admit_remote(policy) != Admission::Rejected
    }

    /// Cached remote version of `policy_id` owned by `owner_org_id`.
    pub fn get_remote_policy(&self, owner_org_id: &str, policy_id: &str) -> Option<&FederatedPolicy> {
        self.remote_cache
            .get(&(owner_org_id.to_string(), policy_id.to_string()))
    }

    /// Every cached remote version.
    pub fn remote_policies(&self) -> impl Iterator<Item = &FederatedPolicy> {
        self.remote_cache.values()
    }

    /// Verifies `policy` against `key`.
    pub fn verify_policy(&self, policy: &FederatedPolicy, key: &VerificationKey) -> bool {
        verify_policy_signature(policy, key)
    }

    fn admit_remote(&mut self, policy: &FederatedPolicy) -> Admission {
        let owner = policy.owner_org_id.as_str();
        if owner == self.local_org_id {
            tracing::debug!(policy_id = %policy.policy_id, "ignoring own policy from peer");
            return Admission::Rejected;
        }

        let Some(key) = self.peer_keys.get(owner) else {
            tracing::warn!(
                policy_id = %policy.policy_id,
                owner,
                "discarding policy from unregistered owner"
            );
            return Admission::Rejected;
        };
        if !verify_policy_signature(policy, key) {
            tracing::warn!(
                policy_id = %policy.policy_id,
                owner,
                "discarding policy that failed verification"
            );
            return Admission::Rejected;
        }

        let cache_key = (owner.to_string(), policy.policy_id.clone());
        if let Some(existing) = self.remote_cache.get(&cache_key) {
            let same = existing.version == policy.version
                && existing.content_hash == policy.content_hash;
            let older = existing.is_newer_than(&policy.version);
            if same || older {
                return Admission::Unchanged;
            }
        }

        tracing::debug!(
            policy_id = %policy.policy_id,
            owner,
            version = %policy.version,
            "cached remote policy"
        );
        self.remote_cache.insert(cache_key, policy.clone());
        Admission::Cached
    }

    // ── Conflict resolution ──────────────────────────────────────────

    /// Picks the winning version of `policy_id` using the strategy named
    /// `strategy` (`latest`, `leader` or `merge`).
    ///
    /// # Errors
    ///
    /// [`PolicyError::UnknownStrategy`] for an unrecognised name, otherwise
    /// as [`conflict::resolve`].
    pub fn resolve_conflict(
        &self,
        policy_id: &str,
        versions: &[FederatedPolicy],
        strategy: &str,
    ) -> Result<FederatedPolicy, PolicyError> {
        let strategy: ConflictStrategy = strategy.parse()?;
        self.resolve_conflict_with(policy_id, versions, strategy)
    }

    /// [`Self::resolve_conflict`] with a typed strategy.
    pub fn resolve_conflict_with(
        &self,
        policy_id: &str,
        versions: &[FederatedPolicy],
        strategy: ConflictStrategy,
    ) -> Result<FederatedPolicy, PolicyError> {
        let winner = conflict::resolve(
            policy_id,
            versions,
            strategy,
            self.leader_org_id.as_deref(),
        )?;
        tracing::info!(
            policy_id,
            %strategy,
            owner = %winner.owner_org_id,
            version = %winner.version,
            "resolved policy conflict"
        );
        Ok(winner)
    }

    fn successor(
        &self,
        current: &FederatedPolicy,
        content: String,
        version: String,
    ) -> FederatedPolicy {
        let mut inheritance_chain = current.inheritance_chain.clone();
        inheritance_chain.push(current.chain_reference());

        FederatedPolicy {
            content_hash: FederatedPolicy::hash_content(&content),
            content,
            owner_org_id: self.local_org_id.clone(),
            version,
            effective_from: Utc::now(),
            inheritance_chain,
            signature: None,
            ..current.clone()
        }
    }

    fn sign(&self, mut policy: FederatedPolicy) -> Result<FederatedPolicy, PolicyError> {
        policy.signature = None;
        let bytes = policy.canonical_bytes()?;
        policy.signature = Some(self.key.sign_hex(&bytes));
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn protocol(org_id: &str, key: FederationKey) -> PolicySyncProtocol {
        PolicySyncProtocol::new(org_id, key, FederationSettings::default()).unwrap()
    }

    fn shared(sync: &mut PolicySyncProtocol, content: &str) -> FederatedPolicy {
        sync.create_policy(
            "data residency",
            "keeps personal data in region",
            content,
            PolicyScope::Shared,
            vec![],
            vec!["GDPR".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn create_policy_starts_at_one_and_signs() {
        let key = FederationKey::generate();
        let mut sync = protocol("org-a", key.clone());
        let policy = shared(&mut sync, "no export");

        assert_eq!(policy.version, "1.0.0");
        assert_eq!(policy.owner_org_id, "org-a");
        assert!(policy.inheritance_chain.is_empty());
        assert!(uuid::Uuid::parse_str(&policy.policy_id).is_ok());
        assert!(verify_policy_signature(&policy, &key.verification_key()));
        assert_eq!(sync.policy_history(&policy.policy_id).len(), 1);
    }

    #[test]
    fn update_bumps_version_and_extends_chain() {
        let mut sync = protocol("org-a", FederationKey::generate());
        let v1 = shared(&mut sync, "v1");

        let v2 = sync
            .update_policy(&v1.policy_id, "v2", VersionBump::Minor)
            .unwrap();
        assert_eq!(v2.version, "1.1.0");
        assert_eq!(v2.inheritance_chain, vec!["org-a:1.0.0".to_string()]);
        assert!(v2.content_matches_hash());

        let v3 = sync
            .update_policy(&v1.policy_id, "v3", VersionBump::Major)
            .unwrap();
        assert_eq!(v3.version, "2.0.0");
        assert_eq!(v3.inheritance_chain.len(), 2);
        assert_eq!(sync.policy_history(&v1.policy_id).len(), 3);
        assert_eq!(sync.get_policy(&v1.policy_id).unwrap().content, "v3");
    }

    #[test]
    fn update_of_unknown_policy_errors() {
        let mut sync = protocol("org-a", FederationKey::generate());
        let err = sync
            .update_policy("missing", "x", VersionBump::Patch)
            .unwrap_err();
        assert!(matches!(err, PolicyError::NotFound(_)));
    }

    #[test]
    fn inherit_verbatim_and_with_overrides() {
        let mut a = protocol("org-a", FederationKey::generate());
        let key_b = FederationKey::generate();
        let mut b = protocol("org-b", key_b.clone());
        let upstream = shared(&mut a, "upstream rules");

        let inherited = b.inherit_policy(&upstream, None).unwrap();
        assert_eq!(inherited.scope, PolicyScope::Inherited);
        assert_eq!(inherited.content, "upstream rules");
        assert_eq!(inherited.owner_org_id, "org-b");
        assert_eq!(inherited.policy_id, upstream.policy_id);
        assert_eq!(inherited.version, "1.0.0");
        assert_eq!(inherited.inheritance_chain, vec!["org-a:1.0.0".to_string()]);
        assert!(verify_policy_signature(&inherited, &key_b.verification_key()));

        let overridden = b.inherit_policy(&upstream, Some("stricter rules")).unwrap();
        assert_eq!(overridden.scope, PolicyScope::Override);
        assert_eq!(overridden.content, "stricter rules");
        assert!(overridden.content_matches_hash());
        assert_eq!(b.policy_history(&upstream.policy_id).len(), 2);
    }

    #[test]
    fn rollback_republishes_old_content_as_new_patch() {
        let mut sync = protocol("org-a", FederationKey::generate());
        let v1 = shared(&mut sync, "original");
        sync.update_policy(&v1.policy_id, "broken", VersionBump::Minor)
            .unwrap();

        let restored = sync.rollback_policy(&v1.policy_id, "1.0.0").unwrap();
        assert_eq!(restored.version, "1.1.1");
        assert_eq!(restored.content, "original");
        assert_eq!(
            restored.inheritance_chain.last().map(String::as_str),
            Some("org-a:1.1.0")
        );

        let err = sync.rollback_policy(&v1.policy_id, "9.9.9").unwrap_err();
        assert!(matches!(err, PolicyError::VersionNotFound { .. }));
    }

    #[test]
    fn shared_listing_excludes_local_scope_and_filters_by_version() {
        let mut sync = protocol("org-a", FederationKey::generate());
        let public = shared(&mut sync, "public");
        sync.create_policy("internal", "", "secret", PolicyScope::Local, vec![], vec![])
            .unwrap();
        sync.update_policy(&public.policy_id, "public v2", VersionBump::Major)
            .unwrap();

        let all = sync.shared_policies_since(None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version, "2.0.0");
        assert_eq!(sync.shared_policies_since(Some("1.5.0")).len(), 1);
        assert!(sync.shared_policies_since(Some("2.0.0")).is_empty());
    }

    #[test]
    fn accept_remote_policy_requires_registered_valid_signature() {
        let key_a = FederationKey::generate();
        let mut a = protocol("org-a", key_a.clone());
        let mut b = protocol("org-b", FederationKey::generate());
        let policy = shared(&mut a, "rules");

        assert!(!b.accept_remote_policy(&policy), "owner key not registered");

        b.register_peer_key("org-a", key_a.verification_key());
        assert!(b.accept_remote_policy(&policy));
        assert!(b.get_remote_policy("org-a", &policy.policy_id).is_some());

        let mut tampered = policy.clone();
        tampered.content = "looser rules".to_string();
        assert!(!b.accept_remote_policy(&tampered));

        let mut rehashed = tampered.clone();
        rehashed.content_hash = FederatedPolicy::hash_content(&rehashed.content);
        assert!(!b.accept_remote_policy(&rehashed), "signature must cover content");
    }

    #[test]
    fn redelivery_of_same_version_is_unchanged() {
        let key_a = FederationKey::generate();
        let mut a = protocol("org-a", key_a.clone());
        let mut b = protocol("org-b", FederationKey::generate());
        b.register_peer_key("org-a", key_a.verification_key());
        let policy = shared(&mut a, "rules");

        assert_eq!(b.admit_remote(&policy), Admission::Cached);
        assert_eq!(b.admit_remote(&policy), Admission::Unchanged);

        let newer = a
            .update_policy(&policy.policy_id, "rules v2", VersionBump::Patch)
            .unwrap();
        assert_eq!(b.admit_remote(&newer), Admission::Cached);
        assert_eq!(b.admit_remote(&policy), Admission::Unchanged, "older version ignored");
        assert_eq!(
            b.get_remote_policy("org-a", &policy.policy_id).unwrap().version,
            "1.0.1"
        );
    }

    #[test]
    fn resolve_conflict_uses_configured_leader() {
        let mut a = protocol("org-a", FederationKey::generate());
        let mut b = protocol("org-b", FederationKey::generate());
        let from_a = shared(&mut a, "leader rules");
        let mut from_b = b.inherit_policy(&from_a, Some("member rules")).unwrap();
        from_b.effective_from = from_a.effective_from + Duration::hours(1);
        let versions = vec![from_a.clone(), from_b.clone()];

        let latest = b
            .resolve_conflict(&from_a.policy_id, &versions, "latest")
            .unwrap();
        assert_eq!(latest.owner_org_id, "org-b");

        assert!(matches!(
            b.resolve_conflict(&from_a.policy_id, &versions, "leader"),
            Err(PolicyError::LeaderUnknown)
        ));
        b.set_federation_leader("org-a");
        let leader = b
            .resolve_conflict(&from_a.policy_id, &versions, "leader")
            .unwrap();
        assert_eq!(leader.owner_org_id, "org-a");

        assert!(matches!(
            b.resolve_conflict(&from_a.policy_id, &versions, "vote"),
            Err(PolicyError::UnknownStrategy(_))
        ));
        assert!(matches!(
            b.resolve_conflict(&from_a.policy_id, &versions, "merge"),
            Err(PolicyError::MergeNotImplemented)
        ));
    }
}
