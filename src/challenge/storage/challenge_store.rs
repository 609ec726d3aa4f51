use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, Row, postgres::PgRow, sqlite::SqliteRow};
use uuid::Uuid;

use crate::challenge::errors::ChallengeError;
use crate::challenge::types::{Challenge, ChallengeSearchField, ChallengeType, UNRESOLVED_USER_ID};
use crate::config::PASSKEY_CHALLENGE_TIMEOUT;
use crate::storage::{self, StorePool};
use crate::utils::gen_random_string;

use super::postgres::{
    consume_challenge_postgres, create_challenge_tables_postgres, insert_challenge_postgres,
    purge_expired_postgres,
};
use super::sqlite::{
    consume_challenge_sqlite, create_challenge_tables_sqlite, insert_challenge_sqlite,
    purge_expired_sqlite,
};

// Pool clone taken under the store mutex; the guard is gone before any query
// below runs.
async fn pool() -> Result<StorePool, ChallengeError> {
    storage::store_pool()
        .await
        .map_err(|e| ChallengeError::Storage(e.to_string()))
}

pub struct ChallengeStore;

impl ChallengeStore {
    pub async fn init() -> Result<(), ChallengeError> {
        match pool().await? {
            StorePool::Sqlite(pool) => create_challenge_tables_sqlite(&pool).await,
            StorePool::Postgres(pool) => create_challenge_tables_postgres(&pool).await,
        }
    }

    /// Issues a fresh single-use challenge and persists it.
    ///
    /// Registration challenges are bound to an authenticated identity;
    /// requesting one for the unresolved sentinel (or an empty id) fails with
    /// [`ChallengeError::Unauthorized`] before anything is written.
    /// Authentication challenges may be issued under [`UNRESOLVED_USER_ID`]
    /// for discoverable-credential flows.
    pub async fn issue(
        user_id: &str,
        challenge_type: ChallengeType,
        registration_options: Option<String>,
    ) -> Result<Challenge, ChallengeError> {
        if challenge_type == ChallengeType::Registration
            && (user_id.is_empty() || user_id == UNRESOLVED_USER_ID)
        {
            return Err(ChallengeError::Unauthorized(
                "Registration challenges require an authenticated user".into(),
            ));
        }

        let now = Utc::now();
        let challenge = Challenge {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            challenge: gen_random_string(32)?,
            challenge_type,
            created_at: now,
            expires_at: now + Duration::seconds(*PASSKEY_CHALLENGE_TIMEOUT as i64),
            registration_options,
        };

        Self::insert(&challenge).await?;

        tracing::debug!(
            "Issued {} challenge {} for user {}",
            challenge_type,
            challenge.id,
            challenge.user_id
        );

        Ok(challenge)
    }

    pub(crate) async fn insert(challenge: &Challenge) -> Result<(), ChallengeError> {
        match pool().await? {
            StorePool::Sqlite(pool) => insert_challenge_sqlite(&pool, challenge).await,
            StorePool::Postgres(pool) => insert_challenge_postgres(&pool, challenge).await,
        }
    }

    /// Atomically consumes a challenge: the row is located and deleted in a
    /// single statement, so two concurrent consumes of the same challenge
    /// cannot both succeed.
    ///
    /// An expired row is destroyed on contact and reported as
    /// [`ChallengeError::Expired`]; a row issued for the other ceremony is
    /// left in place and reported as [`ChallengeError::TypeMismatch`].
    pub async fn consume(
        field: ChallengeSearchField,
        expected_type: ChallengeType,
    ) -> Result<Challenge, ChallengeError> {
        match pool().await? {
            StorePool::Sqlite(pool) => consume_challenge_sqlite(&pool, &field, expected_type).await,
            StorePool::Postgres(pool) => {
                consume_challenge_postgres(&pool, &field, expected_type).await
            }
        }
    }

    /// Deletes every challenge past its expiry. Returns the number of rows
    /// removed.
    pub async fn purge_expired() -> Result<u64, ChallengeError> {
        match pool().await? {
            StorePool::Sqlite(pool) => purge_expired_sqlite(&pool, Utc::now()).await,
            StorePool::Postgres(pool) => purge_expired_postgres(&pool, Utc::now()).await,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Challenge {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let challenge_type: String = row.try_get("challenge_type")?;
        let challenge_type = ChallengeType::parse(&challenge_type).ok_or_else(|| {
            sqlx::Error::Decode(format!("Invalid challenge_type: {challenge_type}").into())
        })?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;

        Ok(Challenge {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            challenge: row.try_get("challenge")?,
            challenge_type,
            created_at,
            expires_at,
            registration_options: row.try_get("registration_options")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Challenge {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let challenge_type: String = row.try_get("challenge_type")?;
        let challenge_type = ChallengeType::parse(&challenge_type).ok_or_else(|| {
            sqlx::Error::Decode(format!("Invalid challenge_type: {challenge_type}").into())
        })?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;

        Ok(Challenge {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            challenge: row.try_get("challenge")?,
            challenge_type,
            created_at,
            expires_at,
            registration_options: row.try_get("registration_options")?,
        })
    }
}
