//! Shared test initialization and stub collaborators.
//!
//! Tests across the crate call [`init_test_environment`] first; it loads
//! `.env_test` when present, fills in defaults otherwise, wipes the previous
//! test database file and initializes both stores once per process.

use std::sync::Once;

use async_trait::async_trait;
use uuid::Uuid;

use crate::ceremony::{
    AssertionContext, AssertionResponse, AssertionVerifier, AttestationVerifier,
    RegistrationResponse, SessionHandle, SessionIssuer, SessionIssuerError, VerificationContext,
    VerifiedAssertion, VerifiedRegistration, VerifierError,
};
use crate::challenge::ChallengeStore;
use crate::credential::CredentialStore;

pub async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }

        // Defaults for variables .env_test did not provide. set_var is safe
        // enough here: call_once runs before any test thread reads them.
        unsafe {
            if std::env::var("GENERIC_DATA_STORE_TYPE").is_err() {
                std::env::set_var("GENERIC_DATA_STORE_TYPE", "sqlite");
            }
            if std::env::var("GENERIC_DATA_STORE_URL").is_err() {
                std::env::set_var(
                    "GENERIC_DATA_STORE_URL",
                    "sqlite:/tmp/mobile_passkey_test.db",
                );
            }
            if std::env::var("ORIGIN").is_err() {
                std::env::set_var("ORIGIN", "https://example.com");
            }
        }

        // Start each test run from an empty database.
        if let Some(db_path) = sqlite_file_path() {
            let _ = std::fs::remove_file(&db_path);
        }
    });

    if let Err(e) = ChallengeStore::init().await {
        eprintln!("Warning: Failed to initialize ChallengeStore: {e}");
    }
    if let Err(e) = CredentialStore::init().await {
        eprintln!("Warning: Failed to initialize CredentialStore: {e}");
    }
    crate::storage::mark_initialized();
}

fn sqlite_file_path() -> Option<String> {
    let url = std::env::var("GENERIC_DATA_STORE_URL").ok()?;
    let path = url.strip_prefix("sqlite:")?;
    let path = path.strip_prefix("//").unwrap_or(path);
    if path.contains(":memory:") {
        return None;
    }
    Some(path.to_string())
}

/// Attestation verifier stub: either yields fixed credential material or
/// rejects every response.
pub struct StubAttestationVerifier {
    outcome: Result<VerifiedRegistration, String>,
}

impl StubAttestationVerifier {
    pub fn succeeding(credential_id: &str) -> Self {
        Self {
            outcome: Ok(VerifiedRegistration {
                credential_id: credential_id.to_string(),
                public_key: "stub-public-key".to_string(),
                counter: 0,
            }),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Err("attestation rejected".to_string()),
        }
    }
}

#[async_trait]
impl AttestationVerifier for StubAttestationVerifier {
    async fn verify_attestation(
        &self,
        _response: &RegistrationResponse,
        _context: &VerificationContext,
    ) -> Result<VerifiedRegistration, VerifierError> {
        self.outcome.clone().map_err(VerifierError::Rejected)
    }
}

/// Assertion verifier stub: reports a fixed counter value or rejects.
pub struct StubAssertionVerifier {
    outcome: Result<u32, String>,
}

impl StubAssertionVerifier {
    pub fn reporting(counter: u32) -> Self {
        Self {
            outcome: Ok(counter),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Err("assertion rejected".to_string()),
        }
    }
}

#[async_trait]
impl AssertionVerifier for StubAssertionVerifier {
    async fn verify_assertion(
        &self,
        _response: &AssertionResponse,
        _context: &AssertionContext,
    ) -> Result<VerifiedAssertion, VerifierError> {
        match &self.outcome {
            Ok(counter) => Ok(VerifiedAssertion { counter: *counter }),
            Err(msg) => Err(VerifierError::Rejected(msg.clone())),
        }
    }
}

/// Session issuer stub that mints a fresh opaque handle for any user.
pub struct StubSessionIssuer;

#[async_trait]
impl SessionIssuer for StubSessionIssuer {
    async fn issue_session(&self, _user_id: &str) -> Result<SessionHandle, SessionIssuerError> {
        Ok(SessionHandle::new(format!("session-{}", Uuid::new_v4())))
    }
}

struct UnknownUserIssuer;

#[async_trait]
impl SessionIssuer for UnknownUserIssuer {
    async fn issue_session(&self, user_id: &str) -> Result<SessionHandle, SessionIssuerError> {
        Err(SessionIssuerError::UserNotFound(user_id.to_string()))
    }
}

/// A session issuer that recognizes no user at all.
pub fn unknown_user_issuer() -> impl SessionIssuer {
    UnknownUserIssuer
}
