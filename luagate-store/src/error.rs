//! Store Error Types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Table does not exist
    #[error("table {table_id} not found")]
    NotFound { table_id: u32 },

    /// Destination buffer offered by the caller is too small
    #[error("buffer too small: need {needed} bytes, capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// Bytes produced by the host do not follow the wire format
    #[error("malformed store data: {0}")]
    Malformed(String),

    /// The store tracks table ids and has none left to hand out
    #[error("table id space exhausted")]
    IdsExhausted,

    /// Backend failure reported by the host
    #[error("store backend error: {0}")]
    Backend(String),
}
