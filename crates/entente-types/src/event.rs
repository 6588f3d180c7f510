//! Cross-organization audit events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederationEvent {
    /// Event identifier.
    pub event_id: String,
    /// Free-form type tag (e.g. `federation_join`).
    pub event_type: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Organization that recorded the event.
    pub source_org_id: String,
    /// Organizations the event concerns.
    #[serde(default)]
    pub target_org_ids: Vec<String>,
    /// Arbitrary structured payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Hex HMAC over the canonical event.
    #[serde(default)]
    pub signature: String,
}

impl Canonical for FederationEvent {
    const SIGNATURE_FIELDS: &'static [&'static str] = &["signature"];
}

impl FederationEvent {
    /// Whether `org_id` is the source or one of the targets.
    pub fn involves(&self, org_id: &str) -> bool {
        self.source_org_id == org_id || self.target_org_ids.iter().any(|t| t == org_id)
    }
}
