use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::credential::errors::CredentialError;
use crate::credential::types::{Credential, CredentialSearchField};
use crate::storage::DB_TABLE_CREDENTIALS;

pub(super) async fn create_credential_tables_postgres(
    pool: &Pool<Postgres>,
) -> Result<(), CredentialError> {
    let table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            credential_id TEXT NOT NULL UNIQUE,
            public_key TEXT NOT NULL,
            counter BIGINT NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TIMESTAMPTZ NOT NULL,
            last_used_at TIMESTAMPTZ NOT NULL,
            revoked_at TIMESTAMPTZ,
            revoked_reason TEXT,
            metadata TEXT
        )
        "#,
        table
    ))
    .execute(pool)
    .await
    .map_err(|e| CredentialError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{}_user_id ON {}(user_id);
        "#,
        table, table
    ))
    .execute(pool)
    .await
    .map_err(|e| CredentialError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{}_status_last_used ON {}(status, last_used_at);
        "#,
        table, table
    ))
    .execute(pool)
    .await
    .map_err(|e| CredentialError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn insert_credential_postgres(
    pool: &Pool<Postgres>,
    credential: &Credential,
) -> Result<(), CredentialError> {
    let table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {}
        (id, user_id, credential_id, public_key, counter, status, created_at, last_used_at,
         revoked_at, revoked_reason, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
        table
    ))
    .bind(&credential.id)
    .bind(&credential.user_id)
    .bind(&credential.credential_id)
    .bind(&credential.public_key)
    .bind(credential.counter as i64)
    .bind(credential.status.as_str())
    .bind(credential.created_at)
    .bind(credential.last_used_at)
    .bind(credential.revoked_at)
    .bind(&credential.revoked_reason)
    .bind(&credential.metadata)
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CredentialError::DuplicateCredentialId(credential.credential_id.clone())
        }
        _ => CredentialError::Storage(e.to_string()),
    })?;

    Ok(())
}

pub(super) async fn get_by_credential_id_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    include_revoked: bool,
) -> Result<Option<Credential>, CredentialError> {
    let table = DB_TABLE_CREDENTIALS.as_str();

    let query = if include_revoked {
        format!(r#"SELECT * FROM {} WHERE credential_id = $1"#, table)
    } else {
        format!(
            r#"SELECT * FROM {} WHERE credential_id = $1 AND status = 'active'"#,
            table
        )
    };

    sqlx::query_as(&query)
        .bind(credential_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| CredentialError::Storage(e.to_string()))
}

pub(super) async fn get_credentials_by_field_postgres(
    pool: &Pool<Postgres>,
    field: &CredentialSearchField,
) -> Result<Vec<Credential>, CredentialError> {
    let table = DB_TABLE_CREDENTIALS.as_str();
    let (query, value) = match field {
        CredentialSearchField::CredentialId(credential_id) => (
            format!(r#"SELECT * FROM {} WHERE credential_id = $1"#, table),
            credential_id.as_str(),
        ),
        CredentialSearchField::UserId(id) => (
            format!(r#"SELECT * FROM {} WHERE user_id = $1"#, table),
            id.as_str(),
        ),
    };

    sqlx::query_as(&query)
        .bind(value)
        .fetch_all(pool)
        .await
        .map_err(|e| CredentialError::Storage(e.to_string()))
}

pub(super) async fn update_counter_and_metadata_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    expected_counter: u32,
    new_counter: u32,
    last_used_at: DateTime<Utc>,
    metadata: &str,
) -> Result<bool, CredentialError> {
    let table = DB_TABLE_CREDENTIALS.as_str();

    // Compare-and-swap on the previous counter: of two concurrent
    // authentications only one can match the expected value.
    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET counter = $1, last_used_at = $2, metadata = $3
        WHERE credential_id = $4 AND counter = $5 AND status = 'active'
        "#,
        table
    ))
    .bind(new_counter as i64)
    .bind(last_used_at)
    .bind(metadata)
    .bind(credential_id)
    .bind(expected_counter as i64)
    .execute(pool)
    .await
    .map_err(|e| CredentialError::Storage(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

pub(super) async fn revoke_credential_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<bool, CredentialError> {
    let table = DB_TABLE_CREDENTIALS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET status = 'revoked', revoked_at = $1, revoked_reason = $2
        WHERE credential_id = $3 AND status = 'active'
        "#,
        table
    ))
    .bind(now)
    .bind(reason)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| CredentialError::Storage(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

pub(super) async fn revoke_inactive_since_postgres(
    pool: &Pool<Postgres>,
    cutoff: DateTime<Utc>,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<u64, CredentialError> {
    let table = DB_TABLE_CREDENTIALS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {}
        SET status = 'revoked', revoked_at = $1, revoked_reason = $2
        WHERE status = 'active' AND last_used_at < $3
        "#,
        table
    ))
    .bind(now)
    .bind(reason)
    .bind(cutoff)
    .execute(pool)
    .await
    .map_err(|e| CredentialError::Storage(e.to_string()))?;

    Ok(result.rows_affected())
}
