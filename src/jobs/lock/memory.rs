//! In-process lock store backed by a concurrent map.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use crate::jobs::lock::{LockError, LockStore};

struct Token {
    value: String,
    expires_at: Instant,
}

/// Lock tokens held in memory; only excludes holders within one process.
#[derive(Default)]
pub struct MemoryLockStore {
    tokens: DashMap<String, Token>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the live token for `key`, if any
    pub fn holder(&self, key: &str) -> Option<String> {
        self.tokens
            .get(key)
            .filter(|token| token.expires_at > Instant::now())
            .map(|token| token.value.clone())
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.holder(key).is_some()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        value: &str,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let now = Instant::now();
        let token = Token {
            value: value.to_string(),
            expires_at: now + lease,
        };

        match self.tokens.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().expires_at > now {
                    return Ok(false);
                }
                entry.insert(token);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(token);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        self.tokens.remove(key);
        Ok(())
    }
}
