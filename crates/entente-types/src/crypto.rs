//! Key material and HMAC-SHA256 helpers.
//!
//! Federation signatures are HMAC-SHA256 tags. An organization signs with its
//! [`FederationKey`] and publishes a [`VerificationKey`] in its identity
//! document; peers recompute tags with that verification material and compare
//! them in constant time.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::TypesError;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of an HMAC-SHA256 tag.
pub const MAC_LENGTH: usize = 32;

/// Length in bytes of a generated federation key.
pub const KEY_LENGTH: usize = 32;

/// Computes `HMAC-SHA256(key, message)`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; MAC_LENGTH] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key length is valid");
    mac.update(message);
    let mut tag = [0u8; MAC_LENGTH];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// Returns the lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// An organization's private signing key.
#[derive(Clone)]
pub struct FederationKey([u8; KEY_LENGTH]);

impl FederationKey {
    /// Generates a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidKey`] if the input is not hex or is not
    /// exactly [`KEY_LENGTH`] bytes long.
    pub fn from_hex(input: &str) -> Result<Self, TypesError> {
        let bytes = hex::decode(input.trim())
            .map_err(|e| TypesError::InvalidKey(format!("key is not hex: {e}")))?;
        let bytes: [u8; KEY_LENGTH] = bytes.try_into().map_err(|v: Vec<u8>| {
            TypesError::InvalidKey(format!("expected {KEY_LENGTH} bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Returns the key as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the verification material peers use to check this key's tags.
    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey(self.0.to_vec())
    }

    /// Signs `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; MAC_LENGTH] {
        hmac_sha256(&self.0, message)
    }

    /// Signs `message` and returns the tag as hex.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message))
    }
}

impl fmt::Debug for FederationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FederationKey([REDACTED])")
    }
}

/// Verification material published in an organization's identity.
///
/// Serialised as a hex string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VerificationKey(Vec<u8>);

impl VerificationKey {
    /// Wraps raw verification bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parses hex-encoded verification material.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidKey`] if the input is not hex or is empty.
    pub fn from_hex(input: &str) -> Result<Self, TypesError> {
        let bytes = hex::decode(input.trim())
            .map_err(|e| TypesError::InvalidKey(format!("key is not hex: {e}")))?;
        if bytes.is_empty() {
            return Err(TypesError::InvalidKey("key is empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the key as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Recomputes the tag for `message` under this key.
    pub fn mac(&self, message: &[u8]) -> [u8; MAC_LENGTH] {
        hmac_sha256(&self.0, message)
    }

    /// Checks `tag` against `message` in constant time.
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        let expected = self.mac(message);
        expected.as_slice().ct_eq(tag).into()
    }

    /// Checks a hex-encoded `tag` against `message`. Malformed hex fails.
    pub fn verify_hex(&self, message: &[u8], tag_hex: &str) -> bool {
        match hex::decode(tag_hex) {
            Ok(tag) => self.verify(message, &tag),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerificationKey({})", self.to_hex())
    }
}

impl Serialize for VerificationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VerificationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}
