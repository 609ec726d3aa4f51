use thiserror::Error;

use crate::challenge::ChallengeError;
use crate::credential::CredentialError;

use super::verifier::{SessionIssuerError, VerifierError};

/// Errors surfaced to callers of the registration and authentication
/// ceremonies. Each failure mode is a distinct variant; only genuinely
/// unexpected conditions collapse into `Internal`.
#[derive(Debug, Error)]
pub enum CeremonyError {
    /// Registration attempted without an authenticated identity.
    #[error("Unauthorized access")]
    Unauthorized,

    /// The session issuer does not know the credential's owner.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The external verifier rejected the attestation or assertion.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// The reported signature counter did not advance past the stored one.
    #[error("Counter replay detected: stored {stored}, reported {reported}")]
    CounterReplayDetected { stored: u32, reported: u32 },

    /// An external collaborator (verifier, session issuer, store backend)
    /// could not be reached.
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Error from challenge issuance or consumption.
    #[error("Challenge error: {0}")]
    Challenge(ChallengeError),

    /// Error from credential persistence.
    #[error("Credential error: {0}")]
    Credential(CredentialError),
}

impl CeremonyError {
    /// Log the error and return self, allowing method chaining at the raise
    /// site.
    pub fn log(self) -> Self {
        match &self {
            Self::Unauthorized => tracing::error!("Unauthorized access"),
            Self::UserNotFound(user_id) => tracing::error!("User not found: {}", user_id),
            Self::VerificationFailed(msg) => tracing::error!("Verification failed: {}", msg),
            Self::CounterReplayDetected { stored, reported } => tracing::error!(
                "Counter replay detected: stored {}, reported {}",
                stored,
                reported
            ),
            Self::AdapterUnavailable(msg) => tracing::error!("Adapter unavailable: {}", msg),
            Self::Internal(msg) => tracing::error!("Internal error: {}", msg),
            Self::Challenge(err) => tracing::error!("Challenge error: {}", err),
            Self::Credential(err) => tracing::error!("Credential error: {}", err),
        }
        self
    }
}

// From implementations that log at the module boundary.

impl From<ChallengeError> for CeremonyError {
    fn from(err: ChallengeError) -> Self {
        let error = match err {
            // A CSPRNG failure is not a protocol outcome callers can act on.
            ChallengeError::Utils(e) => Self::Internal(e.to_string()),
            other => Self::Challenge(other),
        };
        tracing::error!("{}", error);
        error
    }
}

impl From<CredentialError> for CeremonyError {
    fn from(err: CredentialError) -> Self {
        let error = Self::Credential(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<VerifierError> for CeremonyError {
    fn from(err: VerifierError) -> Self {
        let error = match err {
            VerifierError::Rejected(msg) => Self::VerificationFailed(msg),
            VerifierError::Unavailable(msg) => Self::AdapterUnavailable(msg),
        };
        tracing::error!("{}", error);
        error
    }
}

impl From<SessionIssuerError> for CeremonyError {
    fn from(err: SessionIssuerError) -> Self {
        let error = match err {
            SessionIssuerError::UserNotFound(user_id) => Self::UserNotFound(user_id),
            SessionIssuerError::Unavailable(msg) => Self::AdapterUnavailable(msg),
        };
        tracing::error!("{}", error);
        error
    }
}
