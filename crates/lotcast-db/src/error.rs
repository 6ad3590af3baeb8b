//! Error types for the store.

use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be mapped back into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}
