//! LockStore trait definition.

use std::time::Duration;

use async_trait::async_trait;

use crate::jobs::lock::LockError;

/// Shared key-value store with atomic set-if-absent and expiry.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` for `lease` unless a live token already exists.
    ///
    /// Returns `Ok(false)` when another holder owns the key.
    async fn try_acquire(&self, key: &str, value: &str, lease: Duration)
    -> Result<bool, LockError>;

    /// Delete the token; deleting an absent key is not an error.
    async fn release(&self, key: &str) -> Result<(), LockError>;
}
