//! In-memory storage backend.
//!
//! All data is lost when the backend is dropped. Used by
//! [`CallGraphStore::in_memory`](crate::CallGraphStore::in_memory) and the tests.

use super::{BatchOperation, KeyValue, StorageBackend};
use crate::error::{GraphError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Data = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory storage backend using a BTreeMap.
///
/// Keys are kept ordered so `scan_prefix` returns results in key order, the
/// same guarantee RocksDB gives. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<Data>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of key-value pairs stored.
    pub fn len(&self) -> usize {
        self.read().map(|data| data.len()).unwrap_or(0)
    }

    /// Check if the backend is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Data>> {
        self.data.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Data>> {
        self.data.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> GraphError {
    GraphError::storage("Memory backend lock poisoned", None::<std::io::Error>)
}

impl StorageBackend for MemoryBackend {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KeyValue>> {
        let data = self.read()?;
        let results: Vec<KeyValue> = data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(results)
    }

    fn write_batch(&mut self, operations: Vec<BatchOperation>) -> Result<()> {
        // Holding the write lock for the whole batch makes it atomic for readers.
        let mut data = self.write()?;
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
