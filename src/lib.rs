//! mobile_passkey - Server-side passkey ceremony core for mobile clients
//!
//! This crate implements the server half of WebAuthn-style passkey flows:
//! single-use challenge issuance and atomic consumption, registration and
//! authentication ceremony orchestration, credential lifecycle with signature
//! counter replay protection, and background cleanup of inactive credentials.
//!
//! Cryptographic verification of attestations/assertions and session minting
//! are consumed through the [`AttestationVerifier`], [`AssertionVerifier`] and
//! [`SessionIssuer`] traits; this crate never echoes credential secret
//! material back to callers.

mod ceremony;
mod challenge;
mod cleanup;
mod config;
mod credential;
mod storage;
mod utils;

#[cfg(test)]
mod test_utils;

pub use ceremony::{
    AssertionContext, AssertionResponse, AssertionVerifier, AttestationVerifier,
    AuthenticatedSession, CeremonyError, RegistrationResponse, SessionHandle, SessionIssuer,
    SessionIssuerError, VerificationContext, VerifiedAssertion, VerifiedRegistration,
    VerifierError, finish_authentication, finish_registration, start_authentication,
    start_registration,
};
pub use challenge::{
    Challenge, ChallengeError, ChallengeSearchField, ChallengeStore, ChallengeType,
    UNRESOLVED_USER_ID,
};
pub use cleanup::{CleanupConfig, CleanupScheduler};
pub use credential::{
    Credential, CredentialError, CredentialMetadata, CredentialSearchField, CredentialStatus,
    CredentialStore,
};
pub use storage::StorageError;

/// Initialize the passkey core: connect the data store, create tables and
/// spawn the inactive-credential cleanup task.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    storage::init().await?;
    challenge::init().await?;
    credential::init().await?;
    storage::mark_initialized();

    CleanupScheduler::new(CleanupConfig::from_env()).spawn();

    Ok(())
}
