use entente_types::TypesError;
use thiserror::Error;

/// Errors raised by the trust protocol.
///
/// Network and verification failures are reported through return values,
/// not through this type.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to canonicalise agreement: {0}")]
    Canonical(#[from] TypesError),
}
