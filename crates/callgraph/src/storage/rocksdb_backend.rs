//! RocksDB storage backend for persisted call graph snapshots.
//!
//! Writes go through RocksDB's write-ahead log, so a snapshot committed with
//! `write_batch` survives a crash and is rebuilt on the next open.
//!
//! Store keys are namespaced (`function:`, `edge:`, `meta:`). The namespace is
//! registered as RocksDB's prefix extractor so the memtable bloom filter and
//! prefix seeks stay inside one namespace when the store rebuilds its indexes.

use super::{BatchOperation, KeyValue, StorageBackend};
use crate::error::{GraphError, Result};
use rocksdb::{IteratorMode, Options, ReadOptions, SliceTransform, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

const NAMESPACE_SEPARATOR: u8 = b':';

/// Leading namespace of a store key, separator included.
fn namespace(key: &[u8]) -> &[u8] {
    match key.iter().position(|&b| b == NAMESPACE_SEPARATOR) {
        Some(end) => &key[..=end],
        None => key,
    }
}

fn has_namespace(key: &[u8]) -> bool {
    key.contains(&NAMESPACE_SEPARATOR)
}

/// Smallest key greater than every key starting with `prefix`, if any.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}

/// RocksDB-backed persistent storage.
///
/// `write_batch` maps onto a RocksDB `WriteBatch`, which gives the loader its
/// all-or-nothing snapshot replacement.
#[derive(Clone)]
pub struct RocksDBBackend {
    db: Arc<DB>,
}

impl RocksDBBackend {
    /// Open or create a RocksDB database at the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path for the database files
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Storage`] if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_prefix_extractor(SliceTransform::create(
            "callgraph.namespace",
            namespace,
            Some(has_namespace),
        ));
        opts.set_memtable_prefix_bloom_ratio(0.1);

        let db = DB::open(&opts, path.as_ref()).map_err(|e| {
            GraphError::storage(
                format!("Failed to open call graph store at {:?}", path.as_ref()),
                Some(e),
            )
        })?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl StorageBackend for RocksDBBackend {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .map_err(|e| GraphError::storage("Failed to put key-value pair", Some(e)))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| GraphError::storage("Failed to get value", Some(e)))
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.db
            .delete(key)
            .map_err(|e| GraphError::storage("Failed to delete key", Some(e)))
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        if !self.db.key_may_exist(key) {
            return Ok(false);
        }
        self.db
            .get_pinned(key)
            .map(|opt| opt.is_some())
            .map_err(|e| GraphError::storage("Failed to check key existence", Some(e)))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KeyValue>> {
        let mut read_opts = ReadOptions::default();
        if has_namespace(prefix) {
            // The whole scan lives in one extractor bucket
            read_opts.set_prefix_same_as_start(true);
        } else {
            read_opts.set_total_order_seek(true);
        }
        if let Some(bound) = prefix_upper_bound(prefix) {
            read_opts.set_iterate_upper_bound(bound);
        }

        let iter = self.db.iterator_opt(
            IteratorMode::From(prefix, rocksdb::Direction::Forward),
            read_opts,
        );
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item
                .map_err(|e| GraphError::storage("Failed to iterate over prefix", Some(e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }

    fn write_batch(&mut self, operations: Vec<BatchOperation>) -> Result<()> {
        let mut batch = WriteBatch::default();

        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    batch.put(&key, &value);
                }
                BatchOperation::Delete { key } => {
                    batch.delete(&key);
                }
            }
        }

        self.db
            .write(batch)
            .map_err(|e| GraphError::storage("Failed to write batch", Some(e)))
    }

    fn flush(&mut self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| GraphError::storage("Failed to flush database", Some(e)))
    }
}
