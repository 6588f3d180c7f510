//! Error types for the audit trail.

use entente_types::TypesError;

/// Errors that can occur while recording audit events.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The event could not be brought into canonical form.
    #[error("audit event encoding error: {0}")]
    Encoding(#[from] TypesError),
}
