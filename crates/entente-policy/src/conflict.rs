//! Conflict resolution between competing policy versions.

use std::fmt;
use std::str::FromStr;

use entente_types::FederatedPolicy;

use crate::error::PolicyError;

/// How to choose between competing versions of one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// Greatest `effective_from` wins.
    Latest,
    /// The federation leader's version wins.
    Leader,
    /// Reserved. Always fails with [`PolicyError::MergeNotImplemented`].
    Merge,
}

impl ConflictStrategy {
    /// Returns the strategy name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Leader => "leader",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "leader" => Ok(Self::Leader),
            "merge" => Ok(Self::Merge),
            _ => Err(PolicyError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Picks the winning version of `policy_id` among `versions`.
///
/// # Errors
///
/// - [`PolicyError::NoVersions`] if `versions` is empty.
/// - [`PolicyError::MismatchedPolicy`] if a candidate has another policy id.
/// - [`PolicyError::LeaderUnknown`] / [`PolicyError::NoLeaderVersion`] for
///   `Leader` without a leader or without a leader-owned candidate.
/// - [`PolicyError::MergeNotImplemented`] for `Merge`.
pub fn resolve(
    policy_id: &str,
    versions: &[FederatedPolicy],
    strategy: ConflictStrategy,
    leader_org_id: Option<&str>,
) -> Result<FederatedPolicy, PolicyError> {
    if versions.is_empty() {
        return Err(PolicyError::NoVersions(policy_id.to_string()));
    }
    if let Some(stray) = versions.iter().find(|v| v.policy_id != policy_id) {
        return Err(PolicyError::MismatchedPolicy {
            expected: policy_id.to_string(),
            found: stray.policy_id.clone(),
        });
    }

    match strategy {
        ConflictStrategy::Latest => versions
            .iter()
            .max_by_key(|v| v.effective_from)
            .cloned()
            .ok_or_else(|| PolicyError::NoVersions(policy_id.to_string())),
        ConflictStrategy::Leader => {
            let leader = leader_org_id.ok_or(PolicyError::LeaderUnknown)?;
            versions
                .iter()
                .find(|v| v.owner_org_id == leader)
                .cloned()
                .ok_or_else(|| PolicyError::NoLeaderVersion {
                    policy_id: policy_id.to_string(),
                    leader_org_id: leader.to_string(),
                })
        }
        ConflictStrategy::Merge => Err(PolicyError::MergeNotImplemented),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use entente_types::PolicyScope;

    fn candidate(owner: &str, version: &str, offset_hours: i64) -> FederatedPolicy {
        FederatedPolicy {
            policy_id: "pol-1".to_string(),
            name: "retention".to_string(),
            description: String::new(),
            content: format!("{owner} {version}"),
            content_hash: FederatedPolicy::hash_content(&format!("{owner} {version}")),
            scope: PolicyScope::Shared,
            owner_org_id: owner.to_string(),
            version: version.to_string(),
            effective_from: Utc::now() + Duration::hours(offset_hours),
            expires_at: None,
            inheritance_chain: vec![],
            allowed_orgs: vec![],
            required_compliance: vec![],
            signature: None,
        }
    }

    fn candidates() -> Vec<FederatedPolicy> {
        vec![
            candidate("org-leader", "1.0.0", 1),
            candidate("org-b", "1.1.0", 3),
            candidate("org-c", "1.0.5", 2),
        ]
    }

    #[test]
    fn latest_picks_greatest_effective_from() {
        let winner = resolve("pol-1", &candidates(), ConflictStrategy::Latest, None).unwrap();
        assert_eq!(winner.owner_org_id, "org-b");
    }

    #[test]
    fn leader_picks_leader_version_regardless_of_time() {
        let winner = resolve(
            "pol-1",
            &candidates(),
            ConflictStrategy::Leader,
            Some("org-leader"),
        )
        .unwrap();
        assert_eq!(winner.version, "1.0.0");
    }

    #[test]
    fn leader_without_leader_errors() {
        let err = resolve("pol-1", &candidates(), ConflictStrategy::Leader, None).unwrap_err();
        assert!(matches!(err, PolicyError::LeaderUnknown));

        let err = resolve("pol-1", &candidates(), ConflictStrategy::Leader, Some("org-x"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::NoLeaderVersion { .. }));
    }

    #[test]
    fn merge_reports_not_implemented() {
        let err = resolve("pol-1", &candidates(), ConflictStrategy::Merge, None).unwrap_err();
        assert!(matches!(err, PolicyError::MergeNotImplemented));
    }

    #[test]
    fn empty_input_errors() {
        let err = resolve("pol-1", &[], ConflictStrategy::Latest, None).unwrap_err();
        assert!(matches!(err, PolicyError::NoVersions(_)));
    }

    #[test]
    fn foreign_candidate_errors() {
        let mut versions = candidates();
        versions[1].policy_id = "pol-2".to_string();
        let err = resolve("pol-1", &versions, ConflictStrategy::Latest, None).unwrap_err();
        assert!(matches!(err, PolicyError::MismatchedPolicy { .. }));
    }

    #[test]
    fn unknown_strategy_fails_to_parse() {
        assert!(matches!(
            "newest".parse::<ConflictStrategy>(),
            Err(PolicyError::UnknownStrategy(_))
        ));
        assert_eq!("leader".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Leader);
    }
}
