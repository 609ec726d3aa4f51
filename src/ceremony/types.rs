use serde::{Deserialize, Serialize};

/// The client's credential-creation response, forwarded opaquely to the
/// external attestation verifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "attestationObject")]
    pub attestation_object: String,
}

/// The client's assertion response. `credential_id` selects the enrolled
/// credential; `user_handle` is present for discoverable credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssertionResponse {
    #[serde(rename = "credentialId")]
    pub credential_id: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: String,
    pub signature: String,
    #[serde(rename = "userHandle")]
    pub user_handle: Option<String>,
}

/// Relying-party expectations handed to the attestation verifier.
#[derive(Clone, Debug)]
pub struct VerificationContext {
    pub challenge: String,
    pub rp_id: String,
    pub origins: Vec<String>,
}

/// Relying-party expectations plus stored credential material handed to the
/// assertion verifier.
#[derive(Clone, Debug)]
pub struct AssertionContext {
    pub challenge: String,
    pub rp_id: String,
    pub origins: Vec<String>,
    pub public_key: String,
    pub counter: u32,
}

/// Credential material the attestation verifier extracted from a valid
/// registration response. `counter` is 0 for authenticators that do not
/// report one.
#[derive(Clone, Debug)]
pub struct VerifiedRegistration {
    pub credential_id: String,
    pub public_key: String,
    pub counter: u32,
}

/// Outcome of a valid assertion: the counter value the authenticator
/// reported.
#[derive(Clone, Debug)]
pub struct VerifiedAssertion {
    pub counter: u32,
}

/// Opaque session reference minted by the external session issuer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(handle: String) -> Self {
        Self(handle)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Successful authentication result: the minimal identity plus the session
/// handle. No credential secret material is included.
#[derive(Clone, Debug)]
pub struct AuthenticatedSession {
    pub user_id: String,
    pub credential_id: String,
    pub session: SessionHandle,
}
