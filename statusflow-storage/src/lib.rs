//! # statusflow-storage
//!
//! Storage layer for statusflow.
//!
//! This crate provides:
//! - A file-backed workflow store with checksum verification
//! - Storage configuration loaded from YAML and the environment

pub mod config;
pub mod error;
pub mod file_store;

pub use config::{ConfigError, StorageConfig};
pub use error::StorageError;
pub use file_store::FileStore;
