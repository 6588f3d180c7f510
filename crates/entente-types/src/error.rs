//! Error types shared by the data model.

/// Errors produced while encoding, signing, or parsing shared types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A structure could not be serialised into its canonical form.
    #[error("canonical serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key material was not valid hex or had the wrong length.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// A policy version string is not a semantic version.
    #[error("invalid version {version:?}: {source}")]
    InvalidVersion {
        /// The offending version string.
        version: String,
        /// The underlying parse failure.
        #[source]
        source: semver::Error,
    },

    /// The version component to bump is already at its maximum.
    #[error("version {version:?} cannot be bumped further")]
    VersionOverflow {
        /// The version that could not be bumped.
        version: String,
    },
}
