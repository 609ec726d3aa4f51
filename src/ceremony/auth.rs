use chrono::Utc;
use serde_json::{Map, Value};

use crate::challenge::{
    Challenge, ChallengeError, ChallengeSearchField, ChallengeStore, ChallengeType,
    UNRESOLVED_USER_ID,
};
use crate::config::{PASSKEY_RP_ID, allowed_origins};
use crate::credential::{Credential, CredentialError, CredentialMetadata, CredentialStore};

use super::errors::CeremonyError;
use super::types::{AssertionContext, AssertionResponse, AuthenticatedSession};
use super::verifier::{AssertionVerifier, SessionIssuer};

/// Issues an authentication challenge.
///
/// With a claimed user id the challenge is scoped to that user; without one
/// it is issued under the unresolved sentinel and resolved against the
/// credential's owner once the client responds (discoverable flow).
pub async fn start_authentication(user_id: Option<String>) -> Result<Challenge, CeremonyError> {
    let owner = user_id.unwrap_or_else(|| UNRESOLVED_USER_ID.to_string());

    let challenge = ChallengeStore::issue(&owner, ChallengeType::Authentication, None).await?;

    Ok(challenge)
}

/// Completes an authentication ceremony.
///
/// Order matters: credential resolution, challenge consumption, external
/// verification and the counter replay check all happen before anything is
/// persisted. Challenge consumption is one-way even when a later step fails;
/// a consumed-but-failed challenge is never restored, which bounds how often
/// a captured challenge can be replayed.
pub async fn finish_authentication(
    response: AssertionResponse,
    claimed_user_id: Option<String>,
    client_metadata: Option<Map<String, Value>>,
    verifier: &dyn AssertionVerifier,
    issuer: &dyn SessionIssuer,
) -> Result<AuthenticatedSession, CeremonyError> {
    // 1. Resolve the credential; only active ones may authenticate.
    let credential = resolve_credential(&response.credential_id).await?;

    // 2. Consume the challenge.
    let challenge = resolve_challenge(claimed_user_id, &credential.user_id).await?;

    // 3. External cryptographic verification.
    let context = AssertionContext {
        challenge: challenge.challenge.clone(),
        rp_id: PASSKEY_RP_ID.to_string(),
        origins: allowed_origins(),
        public_key: credential.public_key.clone(),
        counter: credential.counter,
    };
    let verified = verifier.verify_assertion(&response, &context).await?;

    // 4. Replay check before any persistence. Counters that are both 0 mean
    // the authenticator never reports one; enforcement is skipped.
    let counted = !(verified.counter == 0 && credential.counter == 0);
    if counted && verified.counter <= credential.counter {
        return Err(CeremonyError::CounterReplayDetected {
            stored: credential.counter,
            reported: verified.counter,
        }
        .log());
    }

    // 5. Merge metadata and persist counter + last_used_at + metadata in one
    // conditional write keyed on the previous counter.
    let mut metadata = CredentialMetadata::from_stored(credential.metadata.as_deref());
    if let Some(extra) = client_metadata {
        metadata.merge(extra);
    }
    let now = Utc::now();
    metadata.stamp_last_authentication(now);

    let new_counter = if counted {
        verified.counter
    } else {
        credential.counter
    };

    let updated = CredentialStore::update_counter_and_metadata(
        &credential.credential_id,
        credential.counter,
        new_counter,
        now,
        &metadata.to_json_string(),
    )
    .await?;

    if !updated {
        // The conditional write lost to a concurrent authentication (or a
        // concurrent revocation); treat it the same as a stale counter.
        return Err(CeremonyError::CounterReplayDetected {
            stored: credential.counter,
            reported: verified.counter,
        }
        .log());
    }

    tracing::info!(
        "Authenticated user {} with credential {}",
        credential.user_id,
        credential.credential_id
    );

    // 6. Mint the session.
    let session = issuer.issue_session(&credential.user_id).await?;

    Ok(AuthenticatedSession {
        user_id: credential.user_id,
        credential_id: credential.credential_id,
        session,
    })
}

async fn resolve_credential(credential_id: &str) -> Result<Credential, CeremonyError> {
    let credential = CredentialStore::get_by_credential_id(credential_id, true)
        .await?
        .ok_or_else(|| CeremonyError::from(CredentialError::NotFound))?;

    if !credential.is_active() {
        return Err(CredentialError::Revoked.into());
    }

    Ok(credential)
}

/// Consumes the authentication challenge for this ceremony.
///
/// A claimed user id scopes the lookup to that user. In the discoverable
/// flow the owner of the resolved credential is tried first; when that user
/// has no pending challenge the lookup falls back to one issued under the
/// unresolved sentinel — a challenge created before the identity was known
/// is still valid for the now-known user.
async fn resolve_challenge(
    claimed_user_id: Option<String>,
    credential_owner: &str,
) -> Result<Challenge, CeremonyError> {
    match claimed_user_id {
        Some(user_id) => Ok(ChallengeStore::consume(
            ChallengeSearchField::UserId(user_id),
            ChallengeType::Authentication,
        )
        .await?),
        None => {
            match ChallengeStore::consume(
                ChallengeSearchField::UserId(credential_owner.to_string()),
                ChallengeType::Authentication,
            )
            .await
            {
                Ok(challenge) => Ok(challenge),
                Err(ChallengeError::NotFound) => Ok(ChallengeStore::consume(
                    ChallengeSearchField::UserId(UNRESOLVED_USER_ID.to_string()),
                    ChallengeType::Authentication,
                )
                .await?),
                Err(e) => Err(e.into()),
            }
        }
    }
}
