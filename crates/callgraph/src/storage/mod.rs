//! Storage backend abstractions and implementations.
//!
//! This module defines the byte-level [`StorageBackend`] trait that the typed
//! [`CallGraphStore`](crate::CallGraphStore) is built on, plus two implementations:
//! - [`MemoryBackend`]: in-memory storage, always available
//! - `RocksDBBackend`: persistent storage (feature `rocksdb-backend`)
//!
//! Backends know nothing about functions or calls. They store opaque values
//! under prefixed keys and must enumerate a prefix in key order.

mod memory;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use memory::MemoryBackend;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDBBackend;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Key-value pair for storage operations.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Trait defining the storage backend interface.
///
/// All storage operations are explicit and return `Result` to handle failures.
/// `write_batch` is the only multi-key primitive and must be atomic: the
/// loader relies on it for all-or-nothing snapshot ingestion.
pub trait StorageBackend: Send + Sync {
    /// Store a key-value pair, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Storage`](crate::GraphError::Storage) if the write fails.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Retrieve a value by key. Returns `Ok(None)` if the key doesn't exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Delete a key-value pair. Deleting a missing key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool>;

    /// All key-value pairs whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KeyValue>>;

    /// Execute a batch of write operations atomically.
    ///
    /// Either all operations succeed or none do.
    fn write_batch(&mut self, operations: Vec<BatchOperation>) -> Result<()>;

    /// Flush any buffered writes to durable storage.
    fn flush(&mut self) -> Result<()>;
}

/// Batch write operation for atomic updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchOperation {
    /// Put a key-value pair
    Put {
        /// Key to write
        key: Vec<u8>,
        /// Value to write
        value: Vec<u8>,
    },
    /// Delete a key
    Delete {
        /// Key to delete
        key: Vec<u8>,
    },
}
