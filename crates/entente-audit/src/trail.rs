//! The cross-organization audit trail.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use entente_types::{Canonical, FederationEvent, FederationKey, VerificationKey};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::merkle::{self, Digest, MerkleProof, MerkleRoot, BATCH_SIZE};

/// Checks `event.signature` against `source_key` over the canonical event.
pub fn verify_event_signature(event: &FederationEvent, source_key: &VerificationKey) -> bool {
    match event.canonical_bytes() {
        Ok(bytes) => source_key.verify_hex(&bytes, &event.signature),
        Err(e) => {
            tracing::warn!(event_id = %event.event_id, "event canonicalisation failed: {}", e);
            false
        }
    }
}

/// Aggregate view of a set of events, safe to share with a peer.
///
/// Carries counts only. Payloads, ids and the other organizations involved
/// are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySummary {
    /// Organization the summary was prepared for.
    pub requesting_org_id: String,
    /// Earliest event timestamp, if any events were summarised.
    pub period_start: Option<DateTime<Utc>>,
    /// Latest event timestamp, if any events were summarised.
    pub period_end: Option<DateTime<Utc>>,
    /// Number of events summarised.
    pub total_events: usize,
    /// Event count per event type.
    pub events_by_type: BTreeMap<String, usize>,
    /// Events whose source or targets include the requester.
    pub events_involving_requester: usize,
}

/// Append-only, signed event log committed in Merkle batches.
#[derive(Debug)]
pub struct CrossOrgAuditTrail {
    local_org_id: String,
    key: FederationKey,
    events: Vec<FederationEvent>,
    leaves: Vec<Digest>,
    positions: HashMap<String, usize>,
    roots: Vec<MerkleRoot>,
}

impl CrossOrgAuditTrail {
    /// Creates an empty trail for `local_org_id`, signing with `key`.
    pub fn new(local_org_id: impl Into<String>, key: FederationKey) -> Self {
        Self {
            local_org_id: local_org_id.into(),
            key,
            events: Vec::new(),
            leaves: Vec::new(),
            positions: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// The local organization id.
    pub fn local_org_id(&self) -> &str {
        &self.local_org_id
    }

    /// Signs and appends a new event.
    ///
    /// Every [`BATCH_SIZE`]-th event closes a batch and commits its root.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Encoding`] if the event cannot be canonicalised.
    /// Nothing is appended in that case.
    pub fn log_event(
        &mut self,
        event_type: &str,
        target_org_ids: Vec<String>,
        payload: serde_json::Value,
    ) -> Result<FederationEvent, AuditError> {
        let mut event = FederationEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            source_org_id: self.local_org_id.clone(),
            target_org_ids,
            payload,
            signature: String::new(),
        };
        event.signature = self.key.sign_hex(&event.canonical_bytes()?);
        let leaf = merkle::leaf_hash(&event)?;

        self.positions
            .insert(event.event_id.clone(), self.events.len());
        self.leaves.push(leaf);
        self.events.push(event.clone());

        tracing::debug!(
            event_id = %event.event_id,
            event_type,
            sequence = self.events.len(),
            "audit event logged"
        );

        if self.events.len() % BATCH_SIZE == 0 {
            self.commit_batch();
        }
        Ok(event)
    }

    fn commit_batch(&mut self) {
        let batch_index = self.roots.len();
        let first_event_index = batch_index * BATCH_SIZE;
        let Some(leaves) = self
            .leaves
            .get(first_event_index..first_event_index + BATCH_SIZE)
        else {
            return;
        };

        let root = MerkleRoot {
            batch_index,
            root: hex::encode(merkle::batch_root(leaves)),
            first_event_index,
            event_count: leaves.len(),
            committed_at: Utc::now(),
        };
        tracing::info!(batch_index, root = %root.root, "committed audit batch");
        self.roots.push(root);
    }

    /// Checks an event's signature against its source's key.
    pub fn verify_event(&self, event: &FederationEvent, source_key: &VerificationKey) -> bool {
        let valid = verify_event_signature(event, source_key);
        if !valid {
            tracing::warn!(
                event_id = %event.event_id,
                source = %event.source_org_id,
                "audit event signature mismatch"
            );
        }
        valid
    }

    /// Events involving `org_id`, optionally no older than `since` and
    /// restricted to `event_types`, in log order.
    pub fn get_events_for_org(
        &self,
        org_id: &str,
        since: Option<DateTime<Utc>>,
        event_types: Option<&[String]>,
    ) -> Vec<&FederationEvent> {
        self.events
            .iter()
            .filter(|e| e.involves(org_id))
            .filter(|e| since.map_or(true, |since| e.timestamp >= since))
            .filter(|e| event_types.map_or(true, |types| types.contains(&e.event_type)))
            .collect()
    }

    /// Summarises `events` for `requesting_org_id` without exposing
    /// payloads.
    pub fn create_privacy_preserving_summary<'a>(
        &self,
        events: impl IntoIterator<Item = &'a FederationEvent>,
        requesting_org_id: &str,
    ) -> PrivacySummary {
        let mut summary = PrivacySummary {
            requesting_org_id: requesting_org_id.to_string(),
            period_start: None,
            period_end: None,
            total_events: 0,
            events_by_type: BTreeMap::new(),
            events_involving_requester: 0,
        };

        for event in events {
            summary.total_events += 1;
            *summary
                .events_by_type
                .entry(event.event_type.clone())
                .or_default() += 1;
            if event.involves(requesting_org_id) {
                summary.events_involving_requester += 1;
            }
            summary.period_start = Some(
                summary
                    .period_start
                    .map_or(event.timestamp, |start| start.min(event.timestamp)),
            );
            summary.period_end = Some(
                summary
                    .period_end
                    .map_or(event.timestamp, |end| end.max(event.timestamp)),
            );
        }
        summary
    }

    /// Inclusion proof for `event_id`.
    ///
    /// `None` if the event is unknown or its batch has not been committed
    /// yet.
    pub fn get_merkle_proof(&self, event_id: &str) -> Option<MerkleProof> {
        let index = *self.positions.get(event_id)?;
        let batch_index = index / BATCH_SIZE;
        let root = self.roots.get(batch_index)?;
        let batch = self
            .leaves
            .get(root.first_event_index..root.first_event_index + root.event_count)?;
        let position = index - root.first_event_index;
        let leaf = batch.get(position)?;

        Some(MerkleProof {
            event_id: event_id.to_string(),
            event_hash: hex::encode(leaf),
            merkle_root: root.root.clone(),
            committed_at: root.committed_at,
            batch_index,
            position,
            siblings: merkle::sibling_path(batch, position)
                .iter()
                .map(hex::encode)
                .collect(),
        })
    }

    /// Every logged event, oldest first.
    pub fn events(&self) -> &[FederationEvent] {
        &self.events
    }

    /// Number of logged events.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Committed batch roots, oldest first.
    pub fn merkle_roots(&self) -> &[MerkleRoot] {
        &self.roots
    }
}
