//! Storage error types.

use statusflow_core::FlowError;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data corruption: {0}")]
    Corruption(String),

    #[error("core error: {0}")]
    Core(#[from] FlowError),
}

impl From<StorageError> for FlowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Core(e) => e,
            other => FlowError::Storage(Box::new(other)),
        }
    }
}
