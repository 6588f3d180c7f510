//! HTTP exchange of policy versions with peers.
//!
//! [`PolicyTransport`] holds no policy state. It is cheap to clone, so a
//! caller can take a copy, release whatever lock guards its
//! [`PolicySyncProtocol`](crate::PolicySyncProtocol) and run the network
//! round trips unlocked.

use std::collections::HashMap;

use entente_types::wire::{
    endpoint_url, PolicyListResponse, PolicyPushResponse, GOVERNANCE_HASH_HEADER, POLICIES_PATH,
    STATUS_ACCEPTED,
};
use entente_types::{FederatedPolicy, FederationSettings};
use futures_util::future::join_all;

use crate::error::PolicyError;

/// Client side of the policy endpoints.
#[derive(Debug, Clone)]
pub struct PolicyTransport {
    client: reqwest::Client,
    governance_hash: String,
}

impl PolicyTransport {
    /// Builds a transport whose requests time out after
    /// `settings.request_timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Client`] if the HTTP client cannot be built.
    pub fn new(settings: &FederationSettings) -> Result<Self, PolicyError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            client,
            governance_hash: settings.governance_hash.clone(),
        })
    }

    /// Fetches the policies `source_endpoint` shares, asking only for
    /// versions newer than `since_version`.
    ///
    /// Returns `None` on any transport, status or decoding failure. Nothing
    /// returned here has been verified.
    pub async fn fetch_policies(
        &self,
        source_endpoint: &str,
        since_version: Option<&str>,
    ) -> Option<Vec<FederatedPolicy>> {
        let url = endpoint_url(source_endpoint, POLICIES_PATH);
        let mut request = self
            .client
            .get(&url)
            .header(GOVERNANCE_HASH_HEADER, &self.governance_hash);
        if let Some(since) = since_version {
            request = request.query(&[("since_version", since)]);
        }

        let result = async {
            request
                .send()
                .await?
                .error_for_status()?
                .json::<PolicyListResponse>()
                .await
        }
        .await;

        match result {
            Ok(listing) => {
                tracing::debug!(%url, offered = listing.policies.len(), "fetched peer policies");
                Some(listing.policies)
            }
            Err(e) => {
                tracing::warn!(%url, "policy pull failed: {}", e);
                None
            }
        }
    }

    /// Offers `policy` to `endpoint`. True only for a 2xx answer with status
    /// `accepted`.
    pub async fn push_policy(&self, endpoint: &str, policy: &FederatedPolicy) -> bool {
        let url = endpoint_url(endpoint, POLICIES_PATH);
        let result = async {
            self.client
                .post(&url)
                .header(GOVERNANCE_HASH_HEADER, &self.governance_hash)
                .json(policy)
                .send()
                .await?
                .error_for_status()?
                .json::<PolicyPushResponse>()
                .await
        }
        .await;

        match result {
            Ok(answer) if answer.status == STATUS_ACCEPTED => true,
            Ok(answer) => {
                tracing::warn!(%url, status = %answer.status, "policy push refused");
                false
            }
            Err(e) => {
                tracing::warn!(%url, "policy push failed: {}", e);
                false
            }
        }
    }

    /// Offers `policy` to every endpoint concurrently.
    ///
    /// Each push runs under its own timeout, so a stalled endpoint costs at
    /// most one timeout and does not delay the others. Returns endpoint →
    /// accepted.
    pub async fn push_to_all(
        &self,
        policy: &FederatedPolicy,
        target_endpoints: &[String],
    ) -> HashMap<String, bool> {
        let pushes = target_endpoints.iter().map(|endpoint| async move {
            let accepted = self.push_policy(endpoint, policy).await;
            (endpoint.clone(), accepted)
        });
        let results: HashMap<String, bool> = join_all(pushes).await.into_iter().collect();

        let accepted = results.values().filter(|ok| **ok).count();
        tracing::info!(
            policy_id = %policy.policy_id,
            version = %policy.version,
            accepted,
            targets = results.len(),
            "pushed policy update"
        );
        results
    }
}
