use thiserror::Error;

/// Errors raised by credential persistence and lifecycle operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential not found")]
    NotFound,

    #[error("Credential has been revoked")]
    Revoked,

    /// `credential_id` uniqueness is enforced at creation time by the store,
    /// not by callers.
    #[error("Credential id already registered: {0}")]
    DuplicateCredentialId(String),

    /// The unresolved-user sentinel can never own a credential.
    #[error("Reserved user id: {0}")]
    ReservedUserId(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
