use crate::challenge::{ChallengeSearchField, ChallengeStore, ChallengeType, UNRESOLVED_USER_ID};
use crate::config::{PASSKEY_RP_ID, allowed_origins};
use crate::credential::{Credential, CredentialStore};

use super::errors::CeremonyError;
use super::types::{RegistrationResponse, VerificationContext};
use super::verifier::AttestationVerifier;

/// Issues a registration challenge for an authenticated user.
///
/// The caller supplies the identity from its own session mechanism;
/// anonymous registration is rejected before anything is written.
/// `registration_options` is an opaque blob stored with the challenge and
/// echoed back so the client can check it responds to the options the server
/// issued.
pub async fn start_registration(
    user_id: &str,
    registration_options: Option<serde_json::Value>,
) -> Result<crate::challenge::Challenge, CeremonyError> {
    if user_id.is_empty() || user_id == UNRESOLVED_USER_ID {
        return Err(CeremonyError::Unauthorized.log());
    }

    let challenge = ChallengeStore::issue(
        user_id,
        ChallengeType::Registration,
        registration_options.map(|v| v.to_string()),
    )
    .await?;

    Ok(challenge)
}

/// Completes a registration ceremony.
///
/// Consumes the user's registration challenge, hands the response to the
/// external attestation verifier, and creates the credential only once both
/// have succeeded. Exactly one challenge is consumed and at most one
/// credential row is written; a verification failure leaves no state behind
/// other than the consumed challenge.
pub async fn finish_registration(
    user_id: &str,
    response: RegistrationResponse,
    verifier: &dyn AttestationVerifier,
) -> Result<Credential, CeremonyError> {
    if user_id.is_empty() || user_id == UNRESOLVED_USER_ID {
        return Err(CeremonyError::Unauthorized.log());
    }

    let challenge = ChallengeStore::consume(
        ChallengeSearchField::UserId(user_id.to_string()),
        ChallengeType::Registration,
    )
    .await?;

    let context = VerificationContext {
        challenge: challenge.challenge.clone(),
        rp_id: PASSKEY_RP_ID.to_string(),
        origins: allowed_origins(),
    };

    let verified = verifier.verify_attestation(&response, &context).await?;

    tracing::debug!(
        "Attestation verified for user {}: credential {}",
        user_id,
        verified.credential_id
    );

    let credential = Credential::new(
        user_id,
        &verified.credential_id,
        &verified.public_key,
        verified.counter,
    );

    let stored = CredentialStore::create(credential).await?;

    tracing::info!(
        "Registered credential {} for user {}",
        stored.credential_id,
        stored.user_id
    );

    Ok(stored)
}
