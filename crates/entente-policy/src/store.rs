//! Append-only local policy history.

use std::collections::BTreeMap;

use entente_types::FederatedPolicy;

/// Every version of every local policy, oldest first.
///
/// Versions are appended, never replaced or removed.
#[derive(Debug, Default)]
pub struct PolicyStore {
    histories: BTreeMap<String, Vec<FederatedPolicy>>,
}

impl PolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `policy` as the newest version of its `policy_id`.
    pub fn append(&mut self, policy: FederatedPolicy) {
        self.histories
            .entry(policy.policy_id.clone())
            .or_default()
            .push(policy);
    }

    /// The newest version of `policy_id`.
    pub fn current(&self, policy_id: &str) -> Option<&FederatedPolicy> {
        self.histories.get(policy_id).and_then(|h| h.last())
    }

    /// All versions of `policy_id`, oldest first.
    pub fn history(&self, policy_id: &str) -> &[FederatedPolicy] {
        self.histories
            .get(policy_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The most recent stored entry of `policy_id` carrying `version`.
    pub fn version(&self, policy_id: &str, version: &str) -> Option<&FederatedPolicy> {
        self.history(policy_id)
            .iter()
            .rev()
            .find(|p| p.version == version)
    }

    /// Newest version of every policy, ordered by policy id.
    pub fn currents(&self) -> impl Iterator<Item = &FederatedPolicy> {
        self.histories.values().filter_map(|h| h.last())
    }

    /// Number of distinct policies.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether the store holds no policies.
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}
