mod errors;
mod storage;
mod types;

pub use errors::CredentialError;
pub use storage::CredentialStore;
pub use types::{Credential, CredentialMetadata, CredentialSearchField, CredentialStatus};

pub(crate) use types::REVOKED_REASON_INACTIVE;

pub(crate) async fn init() -> Result<(), CredentialError> {
    CredentialStore::init().await
}
