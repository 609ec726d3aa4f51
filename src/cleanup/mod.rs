//! Background hygiene: revokes credentials that have gone unused for too
//! long and purges expired challenges.
//!
//! The sweep runs on a daily interval inside a spawned tokio task. Every
//! failure inside the sweep is logged and swallowed; hygiene must never take
//! the host application down.

use std::time::Duration;

use chrono::Utc;

use crate::challenge::ChallengeStore;
use crate::credential::{CredentialStore, REVOKED_REASON_INACTIVE};
use crate::storage;

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cleanup policy, read from the environment at startup.
#[derive(Clone, Debug)]
pub struct CleanupConfig {
    /// Credentials not used for this many days are revoked. Zero or negative
    /// disables cleanup entirely.
    pub inactive_days: i64,
    /// Suppresses the daily recurrence; the sweep at startup still runs.
    pub disable_interval: bool,
}

impl CleanupConfig {
    /// Reads `PASSKEY_CLEANUP_INACTIVE_DAYS` (default 30) and
    /// `PASSKEY_CLEANUP_DISABLE_INTERVAL` (default false). An unparsable
    /// days value falls back to the default with a warning rather than
    /// failing startup.
    pub fn from_env() -> Self {
        let inactive_days = std::env::var("PASSKEY_CLEANUP_INACTIVE_DAYS")
            .ok()
            .map(|v| match v.trim().parse::<i64>() {
                Ok(days) => days,
                Err(_) => {
                    tracing::warn!(
                        "Invalid PASSKEY_CLEANUP_INACTIVE_DAYS value {:?}, using default 30",
                        v
                    );
                    30
                }
            })
            .unwrap_or(30);

        let disable_interval = std::env::var("PASSKEY_CLEANUP_DISABLE_INTERVAL")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            inactive_days,
            disable_interval,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inactive_days > 0
    }
}

/// Owns the cleanup policy and drives the periodic sweep.
pub struct CleanupScheduler {
    config: CleanupConfig,
}

impl CleanupScheduler {
    pub fn new(config: CleanupConfig) -> Self {
        Self { config }
    }

    /// Spawns the background task. Returns `None` when cleanup is disabled;
    /// otherwise the task sweeps once immediately and then daily (unless the
    /// recurrence is suppressed).
    pub fn spawn(self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.is_enabled() {
            tracing::info!(
                "Credential cleanup disabled (inactive_days = {})",
                self.config.inactive_days
            );
            return None;
        }

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            // The first tick of a tokio interval completes immediately.
            interval.tick().await;
            self.sweep().await;

            if self.config.disable_interval {
                tracing::info!("Cleanup interval disabled, ran startup sweep only");
                return;
            }

            loop {
                interval.tick().await;
                self.sweep().await;
            }
        }))
    }

    /// One cleanup pass. Returns the number of credentials revoked. Skipped
    /// with a warning while the storage layer has not finished initializing.
    pub async fn sweep(&self) -> u64 {
        if !self.config.is_enabled() {
            return 0;
        }
        if !storage::is_initialized() {
            tracing::warn!("Skipping cleanup sweep, storage not initialized");
            return 0;
        }

        let cutoff = Utc::now() - chrono::Duration::days(self.config.inactive_days);

        let revoked =
            match CredentialStore::revoke_inactive_since(cutoff, REVOKED_REASON_INACTIVE).await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!("Revoked {} inactive credential(s)", count);
                    }
                    count
                }
                Err(e) => {
                    tracing::error!("Inactive credential sweep failed: {}", e);
                    0
                }
            };

        match ChallengeStore::purge_expired().await {
            Ok(purged) if purged > 0 => {
                tracing::debug!("Purged {} expired challenge(s)", purged);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Expired challenge purge failed: {}", e),
        }

        revoked
    }
}
