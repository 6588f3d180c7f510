//! SHA-256 Merkle batches over audit events.
//!
//! Each batch of [`BATCH_SIZE`] events is committed under one root. Leaves are
//! the SHA-256 of the canonical signed event; the leaf row is padded with
//! all-zero leaves to the next power of two and folded pairwise with
//! `SHA-256(left ∥ right)`.

use chrono::{DateTime, Utc};
use entente_types::{canonical_bytes, FederationEvent, TypesError};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Number of events committed under one root.
pub const BATCH_SIZE: usize = 100;

/// A SHA-256 digest.
pub type Digest = [u8; 32];

const ZERO_LEAF: Digest = [0u8; 32];

fn sha256(parts: &[&[u8]]) -> Digest {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn parent(left: &Digest, right: &Digest) -> Digest {
    sha256(&[left.as_slice(), right.as_slice()])
}

/// Leaf digest of `event`, signature included.
///
/// # Errors
///
/// Returns [`TypesError::Serialization`] if the event cannot be encoded.
pub fn leaf_hash(event: &FederationEvent) -> Result<Digest, TypesError> {
    let bytes = canonical_bytes(event, &[])?;
    Ok(sha256(&[bytes.as_slice()]))
}

/// All tree levels, leaves first, root last.
fn levels(leaves: &[Digest]) -> Vec<Vec<Digest>> {
    let width = leaves.len().max(1).next_power_of_two();
    let mut row = leaves.to_vec();
    row.resize(width, ZERO_LEAF);

    let mut levels = vec![row];
    while let Some(row) = levels.last().filter(|row| row.len() > 1) {
        let next: Vec<Digest> = row
            .chunks_exact(2)
            .map(|pair| parent(&pair[0], &pair[1]))
            .collect();
        levels.push(next);
    }
    levels
}

/// Root over `leaves`, zero-padded to a power of two.
pub fn batch_root(leaves: &[Digest]) -> Digest {
    levels(leaves)
        .last()
        .and_then(|row| row.first().copied())
        .unwrap_or(ZERO_LEAF)
}

/// Sibling digests from the leaf at `position` up to (excluding) the root.
pub fn sibling_path(leaves: &[Digest], position: usize) -> Vec<Digest> {
    let levels = levels(leaves);
    let mut index = position;
    let mut path = Vec::with_capacity(levels.len().saturating_sub(1));
    for row in levels.iter().take(levels.len().saturating_sub(1)) {
        path.push(row.get(index ^ 1).copied().unwrap_or(ZERO_LEAF));
        index /= 2;
    }
    path
}

/// Recomputes the root from a leaf, its position and its sibling path.
pub fn fold_path(leaf: &Digest, position: usize, siblings: &[Digest]) -> Digest {
    let mut node = *leaf;
    let mut index = position;
    for sibling in siblings {
        node = if index % 2 == 0 {
            parent(&node, sibling)
        } else {
            parent(sibling, &node)
        };
        index /= 2;
    }
    node
}

/// A committed batch root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleRoot {
    /// Zero-based batch number.
    pub batch_index: usize,
    /// Hex root digest.
    pub root: String,
    /// Log index of the first event in the batch.
    pub first_event_index: usize,
    /// Number of events in the batch.
    pub event_count: usize,
    /// When the batch was committed.
    pub committed_at: DateTime<Utc>,
}

/// Inclusion proof for one event in a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Event the proof is for.
    pub event_id: String,
    /// Hex leaf digest of the event.
    pub event_hash: String,
    /// Hex root of the enclosing batch.
    pub merkle_root: String,
    /// When the enclosing batch was committed.
    pub committed_at: DateTime<Utc>,
    /// Zero-based batch number.
    pub batch_index: usize,
    /// Position of the event within its batch.
    pub position: usize,
    /// Hex sibling digests, leaf level first.
    pub siblings: Vec<String>,
}

impl MerkleProof {
    /// Folds the sibling path and compares the result with `merkle_root`.
    ///
    /// Malformed hex never verifies.
    pub fn verify(&self) -> bool {
        let Some(leaf) = decode_digest(&self.event_hash) else {
            return false;
        };
        let Some(root) = decode_digest(&self.merkle_root) else {
            return false;
        };
        let siblings: Option<Vec<Digest>> =
            self.siblings.iter().map(|s| decode_digest(s)).collect();
        let Some(siblings) = siblings else {
            return false;
        };
        fold_path(&leaf, self.position, &siblings) == root
    }

    /// Whether this proof is for `event`, i.e. its leaf digest matches.
    pub fn matches_event(&self, event: &FederationEvent) -> bool {
        event.event_id == self.event_id
            && leaf_hash(event).is_ok_and(|leaf| hex::encode(leaf) == self.event_hash)
    }
}

fn decode_digest(input: &str) -> Option<Digest> {
    hex::decode(input).ok()?.try_into().ok()
}
