use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved owner id for authentication challenges issued before the client
/// has identified a user (discoverable-credential flow). Never a valid real
/// identity: registration issuance and credential creation reject it.
pub const UNRESOLVED_USER_ID: &str = "__unresolved__";

/// Which ceremony a challenge was issued for. A challenge can only be
/// consumed by the matching ceremony.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    Registration,
    Authentication,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Registration => "registration",
            ChallengeType::Authentication => "authentication",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "registration" => Some(ChallengeType::Registration),
            "authentication" => Some(ChallengeType::Authentication),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-use ceremony challenge.
///
/// The `challenge` value is 32 bytes from the system CSPRNG, base64url
/// encoded. Consumption is destructive: once a ceremony picks the row up it
/// is deleted in the same statement, so a second consume can never succeed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub user_id: String,
    pub challenge: String,
    pub challenge_type: ChallengeType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Opaque creation-options blob echoed back to the client so it can check
    /// the options it responds to are the ones the server issued.
    pub registration_options: Option<String>,
}

impl Challenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Lookup key for consuming a challenge.
#[derive(Debug, Clone)]
pub enum ChallengeSearchField {
    /// Consume by the challenge value itself.
    Value(String),
    /// Consume the most recent challenge issued to a user (or to
    /// [`UNRESOLVED_USER_ID`] in the discoverable flow).
    UserId(String),
}
