use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, postgres::PgRow, sqlite::SqliteRow};

use crate::challenge::UNRESOLVED_USER_ID;
use crate::credential::errors::CredentialError;
use crate::credential::types::{Credential, CredentialSearchField, CredentialStatus};
use crate::storage::{self, StorePool};

use super::postgres::{
    create_credential_tables_postgres, get_by_credential_id_postgres,
    get_credentials_by_field_postgres, insert_credential_postgres, revoke_credential_postgres,
    revoke_inactive_since_postgres, update_counter_and_metadata_postgres,
};
use super::sqlite::{
    create_credential_tables_sqlite, get_by_credential_id_sqlite, get_credentials_by_field_sqlite,
    insert_credential_sqlite, revoke_credential_sqlite, revoke_inactive_since_sqlite,
    update_counter_and_metadata_sqlite,
};

// Pool clone taken under the store mutex; the guard is gone before any query
// below runs.
async fn pool() -> Result<StorePool, CredentialError> {
    storage::store_pool()
        .await
        .map_err(|e| CredentialError::Storage(e.to_string()))
}

pub struct CredentialStore;

impl CredentialStore {
    pub async fn init() -> Result<(), CredentialError> {
        match pool().await? {
            StorePool::Sqlite(pool) => create_credential_tables_sqlite(&pool).await,
            StorePool::Postgres(pool) => create_credential_tables_postgres(&pool).await,
        }
    }

    /// Persists a newly registered credential.
    ///
    /// `credential_id` uniqueness is enforced here by the unique index; a
    /// collision surfaces as [`CredentialError::DuplicateCredentialId`]. The
    /// unresolved-user sentinel is rejected before any write.
    pub async fn create(credential: Credential) -> Result<Credential, CredentialError> {
        if credential.user_id.is_empty() || credential.user_id == UNRESOLVED_USER_ID {
            return Err(CredentialError::ReservedUserId(credential.user_id));
        }

        match pool().await? {
            StorePool::Sqlite(pool) => insert_credential_sqlite(&pool, &credential).await?,
            StorePool::Postgres(pool) => insert_credential_postgres(&pool, &credential).await?,
        }

        tracing::debug!(
            "Stored credential {} for user {}",
            credential.credential_id,
            credential.user_id
        );

        Ok(credential)
    }

    /// Looks a credential up by its authenticator-assigned id, filtered to
    /// `active` unless `include_revoked` is set.
    pub async fn get_by_credential_id(
        credential_id: &str,
        include_revoked: bool,
    ) -> Result<Option<Credential>, CredentialError> {
        match pool().await? {
            StorePool::Sqlite(pool) => {
                get_by_credential_id_sqlite(&pool, credential_id, include_revoked).await
            }
            StorePool::Postgres(pool) => {
                get_by_credential_id_postgres(&pool, credential_id, include_revoked).await
            }
        }
    }

    pub async fn get_credentials_by(
        field: CredentialSearchField,
    ) -> Result<Vec<Credential>, CredentialError> {
        match pool().await? {
            StorePool::Sqlite(pool) => get_credentials_by_field_sqlite(&pool, &field).await,
            StorePool::Postgres(pool) => get_credentials_by_field_postgres(&pool, &field).await,
        }
    }

    /// Persists a successful authentication: counter, `last_used_at` and the
    /// merged metadata blob, in one conditional statement guarded by the
    /// previous counter value. Returns `false` when the guard did not match
    /// (a concurrent authentication got there first).
    pub async fn update_counter_and_metadata(
        credential_id: &str,
        expected_counter: u32,
        new_counter: u32,
        last_used_at: DateTime<Utc>,
        metadata: &str,
    ) -> Result<bool, CredentialError> {
        match pool().await? {
            StorePool::Sqlite(pool) => {
                update_counter_and_metadata_sqlite(
                    &pool,
                    credential_id,
                    expected_counter,
                    new_counter,
                    last_used_at,
                    metadata,
                )
                .await
            }
            StorePool::Postgres(pool) => {
                update_counter_and_metadata_postgres(
                    &pool,
                    credential_id,
                    expected_counter,
                    new_counter,
                    last_used_at,
                    metadata,
                )
                .await
            }
        }
    }

    /// One-way `active` -> `revoked` transition. Revoking a credential that
    /// is already revoked (or missing) is a no-op.
    pub async fn revoke(credential_id: &str, reason: &str) -> Result<(), CredentialError> {
        let now = Utc::now();

        let revoked = match pool().await? {
            StorePool::Sqlite(pool) => {
                revoke_credential_sqlite(&pool, credential_id, reason, now).await?
            }
            StorePool::Postgres(pool) => {
                revoke_credential_postgres(&pool, credential_id, reason, now).await?
            }
        };

        if revoked {
            tracing::info!("Revoked credential {} ({})", credential_id, reason);
        }

        Ok(())
    }

    /// Bulk-revokes every active credential not used since `cutoff`. Returns
    /// the number of credentials revoked.
    pub async fn revoke_inactive_since(
        cutoff: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64, CredentialError> {
        let now = Utc::now();

        match pool().await? {
            StorePool::Sqlite(pool) => {
                revoke_inactive_since_sqlite(&pool, cutoff, reason, now).await
            }
            StorePool::Postgres(pool) => {
                revoke_inactive_since_postgres(&pool, cutoff, reason, now).await
            }
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Credential {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let counter: i64 = row.try_get("counter")?;
        let status: String = row.try_get("status")?;
        let status = CredentialStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("Invalid status: {status}").into()))?;

        Ok(Credential {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            credential_id: row.try_get("credential_id")?,
            public_key: row.try_get("public_key")?,
            counter: counter as u32,
            status,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_reason: row.try_get("revoked_reason")?,
            metadata: row.try_get("metadata")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Credential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let counter: i64 = row.try_get("counter")?;
        let status: String = row.try_get("status")?;
        let status = CredentialStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("Invalid status: {status}").into()))?;

        Ok(Credential {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            credential_id: row.try_get("credential_id")?,
            public_key: row.try_get("public_key")?,
            counter: counter as u32,
            status,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_reason: row.try_get("revoked_reason")?,
            metadata: row.try_get("metadata")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use uuid::Uuid;

    fn unique_credential(user_id: &str) -> Credential {
        Credential::new(
            user_id,
            &format!("cred-{}", Uuid::new_v4()),
            "test-public-key",
            0,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        init_test_environment().await;

        let credential = unique_credential("store-user-1");
        let stored = CredentialStore::create(credential.clone()).await.unwrap();
        assert_eq!(stored.credential_id, credential.credential_id);

        let fetched = CredentialStore::get_by_credential_id(&credential.credential_id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.user_id, "store-user-1");
        assert_eq!(fetched.counter, 0);
        assert!(fetched.is_active());
    }

    #[tokio::test]
    async fn test_duplicate_credential_id_rejected() {
        init_test_environment().await;

        let credential = unique_credential("store-user-dup");
        CredentialStore::create(credential.clone()).await.unwrap();

        let mut duplicate = unique_credential("store-user-dup-2");
        duplicate.credential_id = credential.credential_id.clone();

        let result = CredentialStore::create(duplicate).await;
        assert!(matches!(
            result,
            Err(CredentialError::DuplicateCredentialId(_))
        ));
    }

    #[tokio::test]
    async fn test_sentinel_owner_rejected() {
        init_test_environment().await;

        let credential = unique_credential(crate::challenge::UNRESOLVED_USER_ID);
        let result = CredentialStore::create(credential).await;
        assert!(matches!(result, Err(CredentialError::ReservedUserId(_))));
    }

    #[tokio::test]
    async fn test_revoked_hidden_from_default_lookup() {
        init_test_environment().await;

        let credential = unique_credential("store-user-revoked");
        CredentialStore::create(credential.clone()).await.unwrap();
        CredentialStore::revoke(&credential.credential_id, "user_request")
            .await
            .unwrap();

        let active_only = CredentialStore::get_by_credential_id(&credential.credential_id, false)
            .await
            .unwrap();
        assert!(active_only.is_none());

        let with_revoked = CredentialStore::get_by_credential_id(&credential.credential_id, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_revoked.status, CredentialStatus::Revoked);
        assert_eq!(with_revoked.revoked_reason.as_deref(), Some("user_request"));
        assert!(with_revoked.revoked_at.is_some());
    }

    #[tokio::test]
    async fn test_revoke_is_one_way_and_idempotent() {
        init_test_environment().await;

        let credential = unique_credential("store-user-one-way");
        CredentialStore::create(credential.clone()).await.unwrap();
        CredentialStore::revoke(&credential.credential_id, "first_reason")
            .await
            .unwrap();
        // Second revoke must not overwrite the recorded reason.
        CredentialStore::revoke(&credential.credential_id, "second_reason")
            .await
            .unwrap();

        let stored = CredentialStore::get_by_credential_id(&credential.credential_id, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.revoked_reason.as_deref(), Some("first_reason"));
    }

    #[tokio::test]
    async fn test_counter_update_is_conditional() {
        init_test_environment().await;

        let mut credential = unique_credential("store-user-cas");
        credential.counter = 5;
        CredentialStore::create(credential.clone()).await.unwrap();

        // Guard matches: the write lands.
        let updated = CredentialStore::update_counter_and_metadata(
            &credential.credential_id,
            5,
            6,
            Utc::now(),
            "{}",
        )
        .await
        .unwrap();
        assert!(updated);

        // Stale guard: the write is refused and nothing changes.
        let stale = CredentialStore::update_counter_and_metadata(
            &credential.credential_id,
            5,
            7,
            Utc::now(),
            "{}",
        )
        .await
        .unwrap();
        assert!(!stale);

        let stored = CredentialStore::get_by_credential_id(&credential.credential_id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.counter, 6);
    }

    #[tokio::test]
    async fn test_counter_update_refused_for_revoked() {
        init_test_environment().await;

        let credential = unique_credential("store-user-revoked-cas");
        CredentialStore::create(credential.clone()).await.unwrap();
        CredentialStore::revoke(&credential.credential_id, "user_request")
            .await
            .unwrap();

        let updated = CredentialStore::update_counter_and_metadata(
            &credential.credential_id,
            0,
            1,
            Utc::now(),
            "{}",
        )
        .await
        .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_get_credentials_by_user() {
        init_test_environment().await;

        let first = unique_credential("store-user-list");
        let second = unique_credential("store-user-list");
        CredentialStore::create(first).await.unwrap();
        CredentialStore::create(second).await.unwrap();

        let credentials = CredentialStore::get_credentials_by(CredentialSearchField::UserId(
            "store-user-list".to_string(),
        ))
        .await
        .unwrap();
        assert_eq!(credentials.len(), 2);
    }
}
