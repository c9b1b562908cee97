//! Lock store error types.

use thiserror::Error;

/// Errors raised by a lock store; callers treat them as "store unreachable".
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock store connection failed: {0}")]
    Connection(String),

    #[error("Lock store operation failed: {0}")]
    Operation(String),
}
