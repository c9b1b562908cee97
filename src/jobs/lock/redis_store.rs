//! Redis lock store using a bb8 connection pool.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};

use crate::config::RedisLockConfig;
use crate::jobs::lock::{LockError, LockStore};

type RedisPool = Pool<Client>;

/// Lock tokens as Redis keys written with `SET NX EX`.
pub struct RedisLockStore {
    pool: RedisPool,
    key_prefix: String,
}

impl RedisLockStore {
    /// Build the pool without opening connections; an unreachable server
    /// surfaces on the first acquire.
    pub async fn new(config: &RedisLockConfig) -> Result<Self, LockError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| LockError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout))
            .build(client)
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, Client>, LockError> {
        self.pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(
        &self,
        key: &str,
        value: &str,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
        let prefixed = self.prefixed_key(key);

        // Reply is "OK" when set, nil when the key already exists
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let reply: Option<String> = redis::cmd("SET")
            .arg(&prefixed)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(lease.as_secs().max(1))
            .query_async(conn_ref)
            .await
            .map_err(|e: RedisError| LockError::Operation(e.to_string()))?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let mut conn: PooledConnection<'_, Client> = self.get_conn().await?;
        let prefixed = self.prefixed_key(key);

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .del::<_, ()>(&prefixed)
            .await
            .map_err(|e| LockError::Operation(e.to_string()))
    }
}
