//! Cross-instance mutual exclusion for job executions.
//!
//! A job is only executed by the instance that holds its lock token. Tokens
//! live in a shared [`LockStore`] and expire after the configured lease.

mod error;
mod memory;
mod redis_store;
mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

pub use error::LockError;
pub use memory::MemoryLockStore;
pub use redis_store::RedisLockStore;
pub use store::LockStore;

use crate::config::{LockBackend, LockConfig};
use crate::jobs::error::JobError;

pub fn lock_key(job_id: Uuid) -> String {
    format!("job-lock:{job_id}")
}

/// Acquire/release policy over a lock store
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    lease: Duration,
    strict: bool,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, lease: Duration, strict: bool) -> Self {
        Self {
            store,
            lease,
            strict,
        }
    }

    /// Build the manager and its store from `[lock]`
    pub async fn from_config(config: &LockConfig) -> Result<Self, JobError> {
        let store: Arc<dyn LockStore> = match config.backend {
            LockBackend::Memory => Arc::new(MemoryLockStore::new()),
            LockBackend::Redis => Arc::new(RedisLockStore::new(&config.redis).await?),
        };

        tracing::info!(
            backend = ?config.backend,
            lease_seconds = config.lease_seconds,
            strict = config.strict,
            "Lock manager initialized"
        );

        Ok(Self::new(
            store,
            Duration::from_secs(config.lease_seconds),
            config.strict,
        ))
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Try to become the executor of `job_id`
    ///
    /// Contention returns false. A store failure returns true unless the
    /// manager is strict.
    pub async fn acquire(&self, job_id: Uuid) -> bool {
        let key = lock_key(job_id);
        let acquired_at = Utc::now().to_rfc3339();

        match self.store.try_acquire(&key, &acquired_at, self.lease).await {
            Ok(acquired) => acquired,
            Err(e) if self.strict => {
                tracing::warn!(
                    job_id = %job_id,
                    error = %e,
                    "Lock store unavailable, skipping job"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    error = %e,
                    "Lock store unavailable, proceeding without lock"
                );
                true
            }
        }
    }

    /// Drop the token; failures are logged and left to lease expiry
    pub async fn release(&self, job_id: Uuid) {
        if let Err(e) = self.store.release(&lock_key(job_id)).await {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to release job lock");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Store that is never reachable
    pub(crate) struct UnreachableLockStore;

    #[async_trait]
    impl LockStore for UnreachableLockStore {
        async fn try_acquire(
            &self,
            _key: &str,
            _value: &str,
            _lease: Duration,
        ) -> Result<bool, LockError> {
            Err(LockError::Connection("connection refused".to_string()))
        }

        async fn release(&self, _key: &str) -> Result<(), LockError> {
            Err(LockError::Connection("connection refused".to_string()))
        }
    }

    const LEASE: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_only_one_manager_acquires() {
        let store = Arc::new(MemoryLockStore::new());
        let first = LockManager::new(store.clone(), LEASE, false);
        let second = LockManager::new(store.clone(), LEASE, false);
        let job_id = Uuid::new_v4();

        assert!(first.acquire(job_id).await);
        assert!(!second.acquire(job_id).await);

        first.release(job_id).await;
        assert!(second.acquire(job_id).await);
    }

    #[tokio::test]
    async fn test_token_value_is_acquisition_time() {
        let store = Arc::new(MemoryLockStore::new());
        let manager = LockManager::new(store.clone(), LEASE, false);
        let job_id = Uuid::new_v4();

        assert!(manager.acquire(job_id).await);
        let value = store.holder(&lock_key(job_id)).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&value).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_open_by_default() {
        let manager = LockManager::new(Arc::new(UnreachableLockStore), LEASE, false);
        assert!(manager.acquire(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_closed_when_strict() {
        let manager = LockManager::new(Arc::new(UnreachableLockStore), LEASE, true);
        assert!(!manager.acquire(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_release_errors_are_swallowed() {
        let manager = LockManager::new(Arc::new(UnreachableLockStore), LEASE, false);
        manager.release(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_memory_backend_from_config() {
        let config = LockConfig {
            lease_seconds: 42,
            ..Default::default()
        };
        let manager = LockManager::from_config(&config).await.unwrap();
        assert_eq!(manager.lease(), Duration::from_secs(42));
    }
}
