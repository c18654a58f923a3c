//! Named mutual exclusion for reconciliation attempts.
//!
//! Only one reconciliation per order may run at a time, across independent
//! request-handling processes. The Redis implementation is the production
//! backend; the in-memory implementation covers tests and single-process
//! deployments.

use crate::errors::ServiceError;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::warn;
use uuid::Uuid;

/// Poll interval for the Redis bounded wait.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lock name guarding reconciliation for an order.
pub fn reconcile_lock_name(order_id: Uuid) -> String {
    format!("reconcile_{}", order_id)
}

/// Named, waitable mutual exclusion.
///
/// `try_acquire` is non-blocking (the notification entry treats a held lock
/// as "someone else is already reconciling"); `wait_until_available` is the
/// bounded blocking wait used by the browser-return entry. Callers must
/// `release` on every exit path.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Attempts to take the lock. Returns `false` when another holder has it.
    async fn try_acquire(&self, name: &str) -> Result<bool, ServiceError>;

    /// Releases the lock. Releasing a lock that is not held is a no-op.
    async fn release(&self, name: &str) -> Result<(), ServiceError>;

    /// Waits until the lock is free, up to `timeout`. Returns `false` when
    /// the wait expired with the lock still held. Does not acquire.
    async fn wait_until_available(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<bool, ServiceError>;
}

/// Redis-backed lock manager: `SET NX` acquire with a TTL lease, `DEL`
/// release, polling bounded wait. Safe across processes.
pub struct RedisLockManager {
    client: Arc<redis::Client>,
    namespace: String,
    ttl_secs: usize,
}

impl RedisLockManager {
    pub fn new(client: Arc<redis::Client>, namespace: String, ttl_secs: u64) -> Self {
        Self {
            client,
            namespace,
            ttl_secs: ttl_secs as usize,
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.namespace, name)
    }

    async fn connection(&self) -> Result<redis::aio::Connection, ServiceError> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| ServiceError::LockError(format!("Redis connection failed: {}", e)))
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn try_acquire(&self, name: &str) -> Result<bool, ServiceError> {
        let key = self.key(name);
        let mut conn = self.connection().await?;

        let acquired: bool = conn
            .set_nx(&key, "1")
            .await
            .map_err(|e| ServiceError::LockError(format!("SETNX failed: {}", e)))?;

        if acquired {
            // Safety lease so a crashed holder cannot wedge the order forever.
            let expired: Result<(), redis::RedisError> = conn.expire(&key, self.ttl_secs).await;
            if let Err(e) = expired {
                warn!(%key, error = %e, "Failed to set lock lease");
            }
        }

        Ok(acquired)
    }

    async fn release(&self, name: &str) -> Result<(), ServiceError> {
        let key = self.key(name);
        let mut conn = self.connection().await?;
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| ServiceError::LockError(format!("DEL failed: {}", e)))?;
        Ok(())
    }

    async fn wait_until_available(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<bool, ServiceError> {
        let key = self.key(name);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let mut conn = self.connection().await?;
            let held: bool = conn
                .exists(&key)
                .await
                .map_err(|e| ServiceError::LockError(format!("EXISTS failed: {}", e)))?;

            if !held {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

/// In-process lock manager for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryLockManager {
    held: Mutex<HashSet<String>>,
    released: Notify,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn try_acquire(&self, name: &str) -> Result<bool, ServiceError> {
        Ok(self.held.lock().await.insert(name.to_string()))
    }

    async fn release(&self, name: &str) -> Result<(), ServiceError> {
        self.held.lock().await.remove(name);
        self.released.notify_waiters();
        Ok(())
    }

    async fn wait_until_available(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<bool, ServiceError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register for the release notification before checking, so a
            // release between the check and the await is not missed.
            let released = self.released.notified();
            if !self.held.lock().await.contains(name) {
                return Ok(true);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            if tokio::time::timeout(deadline - now, released).await.is_err() {
                return Ok(false);
            }
        }
    }
}
