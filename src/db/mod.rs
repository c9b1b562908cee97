//! Database connection pool and migrations.
//!
//! Provides async PostgreSQL connection pooling using diesel_async with bb8,
//! plus the embedded migration runner.

pub mod migrations;
mod pool;

pub use pool::{AsyncDbPool, MIGRATIONS, establish_async_connection_pool};
