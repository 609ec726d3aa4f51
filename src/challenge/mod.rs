mod errors;
mod storage;
mod types;

pub use errors::ChallengeError;
pub use storage::ChallengeStore;
pub use types::{Challenge, ChallengeSearchField, ChallengeType, UNRESOLVED_USER_ID};

pub(crate) async fn init() -> Result<(), ChallengeError> {
    ChallengeStore::init().await
}
