//! Registration and authentication ceremony orchestration.
//!
//! The ceremonies tie together challenge issuance/consumption, the external
//! verifier and session-issuer traits, and credential persistence. Each
//! finish operation consumes exactly one challenge and performs at most one
//! credential write.

mod auth;
mod errors;
mod register;
mod types;
mod verifier;

pub use auth::{finish_authentication, start_authentication};
pub use errors::CeremonyError;
pub use register::{finish_registration, start_registration};
pub use types::{
    AssertionContext, AssertionResponse, AuthenticatedSession, RegistrationResponse, SessionHandle,
    VerificationContext, VerifiedAssertion, VerifiedRegistration,
};
pub use verifier::{
    AssertionVerifier, AttestationVerifier, SessionIssuer, SessionIssuerError, VerifierError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeError, ChallengeSearchField, ChallengeStore, ChallengeType};
    use crate::credential::CredentialStore;
    use crate::test_utils::{
        StubAssertionVerifier, StubAttestationVerifier, StubSessionIssuer, init_test_environment,
    };
    use uuid::Uuid;

    // Full lifecycle: register a credential, then authenticate with it in
    // the discoverable flow.
    #[tokio::test]
    async fn test_register_then_authenticate() {
        init_test_environment().await;
        let user_id = format!("e2e-user-{}", Uuid::new_v4());
        let credential_id = format!("cred-{}", Uuid::new_v4());

        start_registration(&user_id, Some(serde_json::json!({"rpName": "Demo"})))
            .await
            .unwrap();

        let registered = finish_registration(
            &user_id,
            RegistrationResponse {
                client_data_json: "client-data".to_string(),
                attestation_object: "attestation".to_string(),
            },
            &StubAttestationVerifier::succeeding(&credential_id),
        )
        .await
        .unwrap();
        assert_eq!(registered.credential_id, credential_id);
        assert_eq!(registered.counter, 0);

        start_authentication(None).await.unwrap();

        let session = finish_authentication(
            AssertionResponse {
                credential_id: credential_id.clone(),
                client_data_json: "client-data".to_string(),
                authenticator_data: "auth-data".to_string(),
                signature: "signature".to_string(),
                user_handle: Some(user_id.clone()),
            },
            None,
            None,
            &StubAssertionVerifier::reporting(1),
            &StubSessionIssuer,
        )
        .await
        .unwrap();

        assert_eq!(session.user_id, user_id);
        assert_eq!(session.credential_id, credential_id);
        assert!(!session.session.as_str().is_empty());

        // Counter advanced and no challenge remains in either type.
        let stored = CredentialStore::get_by_credential_id(&credential_id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.counter, 1);

        for challenge_type in [ChallengeType::Registration, ChallengeType::Authentication] {
            let leftover = ChallengeStore::consume(
                ChallengeSearchField::UserId(user_id.clone()),
                challenge_type,
            )
            .await;
            assert!(matches!(leftover, Err(ChallengeError::NotFound)));
        }
    }
}
