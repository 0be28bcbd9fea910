//! Expired session sweep
//!
//! Verification already rejects expired sessions, so the sweep only keeps the
//! session table from growing. It runs on a fixed interval until the
//! shutdown token is cancelled.

use crate::db::{Store, StoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

/// Removes expired admin sessions from the store
pub struct SessionCleanup {
    store: Arc<dyn Store>,
}

impl SessionCleanup {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Run a single sweep. Returns the number of sessions removed.
    pub async fn run_cleanup(&self) -> StoreResult<u64> {
        self.run_cleanup_at(Utc::now()).await
    }

    async fn run_cleanup_at(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let removed = self.store.delete_expired_sessions(now).await?;
        if removed > 0 {
            tracing::info!(removed = removed, "Removed expired admin sessions");
        } else {
            tracing::debug!("No expired admin sessions to remove");
        }
        Ok(removed)
    }
}

/// Spawn the background sweep. The first sweep runs immediately and a failed
/// sweep is logged, never fatal.
pub fn spawn_session_sweep(
    store: Arc<dyn Store>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tracing::info!(interval_ms = every.as_millis() as u64, "Starting session sweep task");

    let cleanup = SessionCleanup::new(store);

    tokio::spawn(async move {
        let mut tick = interval(every.max(Duration::from_millis(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Session sweep stopped");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = cleanup.run_cleanup().await {
                        tracing::error!(error = %e, "Session sweep failed");
                    }
                }
            }
        }
    })
}
