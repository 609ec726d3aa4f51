use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Revocation reason recorded by the background cleanup sweep.
pub(crate) const REVOKED_REASON_INACTIVE: &str = "automatic_inactive";

/// Lifecycle state of a credential. The `Active` -> `Revoked` transition is
/// one-way; there is no un-revoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Revoked,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Revoked => "revoked",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(CredentialStatus::Active),
            "revoked" => Some(CredentialStatus::Revoked),
            _ => None,
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An enrolled passkey credential.
///
/// `credential_id` is the authenticator-assigned opaque identifier; it is
/// globally unique and immutable. `counter` only moves forward: every
/// successful authentication persists it through a conditional update keyed
/// on the previous value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub user_id: String,
    pub credential_id: String,
    pub public_key: String,
    pub counter: u32,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    /// Free-form JSON object (device/app attributes); decode via
    /// [`CredentialMetadata::from_stored`], which never fails.
    pub metadata: Option<String>,
}

impl Credential {
    pub fn new(user_id: &str, credential_id: &str, public_key: &str, counter: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            credential_id: credential_id.to_string(),
            public_key: public_key.to_string(),
            counter,
            status: CredentialStatus::Active,
            created_at: now,
            last_used_at: now,
            revoked_at: None,
            revoked_reason: None,
            metadata: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }
}

/// Search field options for credential lookup.
#[derive(Debug, Clone)]
pub enum CredentialSearchField {
    CredentialId(String),
    UserId(String),
}

/// Best-effort structured metadata attached to a credential.
///
/// Stored as a JSON object; decoding never fails. Absent, null, corrupt or
/// non-object stored text yields an empty map (with a warning), so a damaged
/// blob can never abort an authentication ceremony.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialMetadata(Map<String, Value>);

impl CredentialMetadata {
    pub const LAST_AUTHENTICATION_KEY: &'static str = "lastAuthenticationAt";

    pub fn from_stored(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self(map),
            Ok(Value::Null) => Self::default(),
            Ok(other) => {
                tracing::warn!(
                    "Stored credential metadata is not a JSON object ({}); starting empty",
                    other
                );
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to parse stored credential metadata: {e}; starting empty");
                Self::default()
            }
        }
    }

    /// Shallow-merges `extra` over the existing fields; request-supplied
    /// values win on key collision.
    pub fn merge(&mut self, extra: Map<String, Value>) {
        for (key, value) in extra {
            self.0.insert(key, value);
        }
    }

    pub fn stamp_last_authentication(&mut self, at: DateTime<Utc>) {
        self.0.insert(
            Self::LAST_AUTHENTICATION_KEY.to_string(),
            Value::String(at.to_rfc3339()),
        );
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_from_corrupt_text_is_empty() {
        let metadata = CredentialMetadata::from_stored(Some("not-valid-json"));
        assert_eq!(metadata, CredentialMetadata::default());
    }

    #[test]
    fn test_metadata_from_null_and_absent_is_empty() {
        assert_eq!(
            CredentialMetadata::from_stored(Some("null")),
            CredentialMetadata::default()
        );
        assert_eq!(
            CredentialMetadata::from_stored(None),
            CredentialMetadata::default()
        );
    }

    #[test]
    fn test_metadata_from_non_object_is_empty() {
        assert_eq!(
            CredentialMetadata::from_stored(Some(r#"["a","b"]"#)),
            CredentialMetadata::default()
        );
        assert_eq!(
            CredentialMetadata::from_stored(Some("42")),
            CredentialMetadata::default()
        );
    }

    #[test]
    fn test_metadata_merge_request_fields_win() {
        let mut metadata =
            CredentialMetadata::from_stored(Some(r#"{"deviceName":"iPhone 14","osVersion":"17"}"#));

        let mut extra = Map::new();
        extra.insert("deviceName".to_string(), json!("iPhone 15"));
        extra.insert("appVersion".to_string(), json!("2.1.0"));
        metadata.merge(extra);

        assert_eq!(metadata.get("deviceName"), Some(&json!("iPhone 15")));
        assert_eq!(metadata.get("osVersion"), Some(&json!("17")));
        assert_eq!(metadata.get("appVersion"), Some(&json!("2.1.0")));
    }

    #[test]
    fn test_metadata_stamp_last_authentication() {
        let mut metadata = CredentialMetadata::default();
        let at = Utc::now();
        metadata.stamp_last_authentication(at);

        let stamped = metadata
            .get(CredentialMetadata::LAST_AUTHENTICATION_KEY)
            .and_then(|v| v.as_str())
            .unwrap();
        assert_eq!(stamped, at.to_rfc3339());
    }

    #[test]
    fn test_metadata_json_round_trip() {
        let mut metadata = CredentialMetadata::default();
        let mut extra = Map::new();
        extra.insert("deviceName".to_string(), json!("Pixel 9"));
        metadata.merge(extra);

        let reloaded = CredentialMetadata::from_stored(Some(&metadata.to_json_string()));
        assert_eq!(reloaded, metadata);
    }

    #[test]
    fn test_credential_new_starts_active() {
        let credential = Credential::new("u1", "cred-1", "pk", 0);
        assert!(credential.is_active());
        assert_eq!(credential.counter, 0);
        assert!(credential.revoked_at.is_none());
        assert!(credential.metadata.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            CredentialStatus::parse("active"),
            Some(CredentialStatus::Active)
        );
        assert_eq!(
            CredentialStatus::parse("revoked"),
            Some(CredentialStatus::Revoked)
        );
        assert_eq!(CredentialStatus::parse("frozen"), None);
    }
}
