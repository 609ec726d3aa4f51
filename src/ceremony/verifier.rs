//! Consumed external interfaces: cryptographic verification and session
//! minting are owned by collaborators, not reimplemented here.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    AssertionContext, AssertionResponse, RegistrationResponse, SessionHandle, VerificationContext,
    VerifiedAssertion, VerifiedRegistration,
};

#[derive(Debug, Error)]
pub enum VerifierError {
    /// The response failed cryptographic or relying-party checks.
    #[error("Verification rejected: {0}")]
    Rejected(String),

    /// The verifier itself could not be reached or errored internally.
    #[error("Verifier unavailable: {0}")]
    Unavailable(String),
}

/// Verifies a credential-creation response against the issued challenge and
/// relying-party configuration, extracting the new credential material.
#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    async fn verify_attestation(
        &self,
        response: &RegistrationResponse,
        context: &VerificationContext,
    ) -> Result<VerifiedRegistration, VerifierError>;
}

/// Verifies an assertion response against the issued challenge, the stored
/// public key and the stored signature counter.
#[async_trait]
pub trait AssertionVerifier: Send + Sync {
    async fn verify_assertion(
        &self,
        response: &AssertionResponse,
        context: &AssertionContext,
    ) -> Result<VerifiedAssertion, VerifierError>;
}

#[derive(Debug, Error)]
pub enum SessionIssuerError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Session issuer unavailable: {0}")]
    Unavailable(String),
}

/// Mints a session for a verified user. Called only after every ceremony
/// check has passed and the credential update has been persisted.
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn issue_session(&self, user_id: &str) -> Result<SessionHandle, SessionIssuerError>;
}
