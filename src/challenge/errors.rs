use thiserror::Error;

use super::types::ChallengeType;
use crate::utils::UtilError;

/// Errors raised while issuing or consuming ceremony challenges.
#[derive(Debug, Error)]
pub enum ChallengeError {
    /// No challenge matched the lookup key.
    #[error("Challenge not found")]
    NotFound,

    /// The challenge existed but was past its expiry; the row has been
    /// discarded as a side effect of the lookup.
    #[error("Challenge has expired")]
    Expired,

    /// A challenge matched the key but was issued for the other ceremony.
    #[error("Challenge type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ChallengeType,
        found: ChallengeType,
    },

    /// Registration challenge requested without an authenticated identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
