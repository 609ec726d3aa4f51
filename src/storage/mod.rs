mod config;
mod errors;
mod types;

use std::sync::atomic::{AtomicBool, Ordering};

pub use errors::StorageError;

pub(crate) use config::{DB_TABLE_CHALLENGES, DB_TABLE_CREDENTIALS};
pub(crate) use types::StorePool;

use config::GENERIC_DATA_STORE;

// Process-wide flag recording whether the store connected and the schema was
// created. Computed once at startup; the cleanup task reads it to skip sweeps
// against a backend that never came up.
static STORE_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Clones the live pool out of the store mutex. The guard is released as
/// soon as the clone is taken, so no query ever runs while the lock is held
/// and concurrent store operations overlap freely.
pub(crate) async fn store_pool() -> Result<StorePool, StorageError> {
    let store = GENERIC_DATA_STORE.lock().await;

    if let Some(pool) = store.as_sqlite() {
        Ok(StorePool::Sqlite(pool.clone()))
    } else if let Some(pool) = store.as_postgres() {
        Ok(StorePool::Postgres(pool.clone()))
    } else {
        Err(StorageError::Unavailable(
            "Unsupported database type".to_string(),
        ))
    }
}

/// Connects to the configured backend and verifies it answers a query.
pub(crate) async fn init() -> Result<(), StorageError> {
    match store_pool().await? {
        StorePool::Sqlite(pool) => {
            sqlx::query("SELECT 1")
                .execute(&pool)
                .await
                .map_err(|e| StorageError::Storage(e.to_string()))?;
        }
        StorePool::Postgres(pool) => {
            sqlx::query("SELECT 1")
                .execute(&pool)
                .await
                .map_err(|e| StorageError::Storage(e.to_string()))?;
        }
    }

    Ok(())
}

pub(crate) fn mark_initialized() {
    STORE_INITIALIZED.store(true, Ordering::Release);
}

pub(crate) fn is_initialized() -> bool {
    STORE_INITIALIZED.load(Ordering::Acquire)
}
