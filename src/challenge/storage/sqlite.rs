use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::challenge::errors::ChallengeError;
use crate::challenge::types::{Challenge, ChallengeSearchField, ChallengeType};
use crate::storage::DB_TABLE_CHALLENGES;

pub(super) async fn create_challenge_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), ChallengeError> {
    let table = DB_TABLE_CHALLENGES.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            challenge TEXT NOT NULL UNIQUE,
            challenge_type TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            expires_at TIMESTAMP NOT NULL,
            registration_options TEXT
        )
        "#,
        table
    ))
    .execute(pool)
    .await
    .map_err(|e| ChallengeError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{}_user_type ON {}(user_id, challenge_type, created_at);
        CREATE INDEX IF NOT EXISTS idx_{}_expires_at ON {}(expires_at);
        "#,
        table, table, table, table
    ))
    .execute(pool)
    .await
    .map_err(|e| ChallengeError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn insert_challenge_sqlite(
    pool: &Pool<Sqlite>,
    challenge: &Challenge,
) -> Result<(), ChallengeError> {
    let table = DB_TABLE_CHALLENGES.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (id, user_id, challenge, challenge_type, created_at, expires_at, registration_options)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        table
    ))
    .bind(&challenge.id)
    .bind(&challenge.user_id)
    .bind(&challenge.challenge)
    .bind(challenge.challenge_type.as_str())
    .bind(challenge.created_at)
    .bind(challenge.expires_at)
    .bind(&challenge.registration_options)
    .execute(pool)
    .await
    .map_err(|e| ChallengeError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn consume_challenge_sqlite(
    pool: &Pool<Sqlite>,
    field: &ChallengeSearchField,
    expected_type: ChallengeType,
) -> Result<Challenge, ChallengeError> {
    let table = DB_TABLE_CHALLENGES.as_str();

    // Locate and delete in one statement; concurrent consumers race on the
    // row delete, so at most one of them gets the returned row.
    let consumed: Option<Challenge> = match field {
        ChallengeSearchField::Value(value) => {
            sqlx::query_as(&format!(
                r#"DELETE FROM {} WHERE challenge = ? AND challenge_type = ? RETURNING *"#,
                table
            ))
            .bind(value)
            .bind(expected_type.as_str())
            .fetch_optional(pool)
            .await
        }
        ChallengeSearchField::UserId(user_id) => {
            sqlx::query_as(&format!(
                r#"
                DELETE FROM {} WHERE id = (
                    SELECT id FROM {} WHERE user_id = ? AND challenge_type = ?
                    ORDER BY created_at DESC LIMIT 1
                ) RETURNING *
                "#,
                table, table
            ))
            .bind(user_id)
            .bind(expected_type.as_str())
            .fetch_optional(pool)
            .await
        }
    }
    .map_err(|e| ChallengeError::Storage(e.to_string()))?;

    match consumed {
        Some(challenge) if challenge.is_expired(Utc::now()) => {
            tracing::warn!(
                "Challenge {} consumed after expiry ({}); discarded",
                challenge.id,
                challenge.expires_at
            );
            Err(ChallengeError::Expired)
        }
        Some(challenge) => Ok(challenge),
        None => {
            // Nothing matched the requested type; peek for a wrong-type row
            // so the caller sees TypeMismatch rather than NotFound. The peek
            // does not consume anything.
            let other: Option<Challenge> = match field {
                ChallengeSearchField::Value(value) => {
                    sqlx::query_as(&format!(r#"SELECT * FROM {} WHERE challenge = ?"#, table))
                        .bind(value)
                        .fetch_optional(pool)
                        .await
                }
                ChallengeSearchField::UserId(user_id) => {
                    sqlx::query_as(&format!(
                        r#"SELECT * FROM {} WHERE user_id = ? ORDER BY created_at DESC LIMIT 1"#,
                        table
                    ))
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await
                }
            }
            .map_err(|e| ChallengeError::Storage(e.to_string()))?;

            // An expired row is absent whatever its type; purge picks it up.
            match other {
                Some(found) if !found.is_expired(Utc::now()) => {
                    Err(ChallengeError::TypeMismatch {
                        expected: expected_type,
                        found: found.challenge_type,
                    })
                }
                _ => Err(ChallengeError::NotFound),
            }
        }
    }
}

pub(super) async fn purge_expired_sqlite(
    pool: &Pool<Sqlite>,
    now: DateTime<Utc>,
) -> Result<u64, ChallengeError> {
    let table = DB_TABLE_CHALLENGES.as_str();

    let result = sqlx::query(&format!(r#"DELETE FROM {} WHERE expires_at < ?"#, table))
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| ChallengeError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}
