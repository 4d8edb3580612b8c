//! Integration test for loads that the storage backend refuses mid-way.
//!
//! A backend wrapper fails writes of selected keys so the loader's abort
//! reporting can be observed in both atomic and per-entity modes. An atomic
//! reload that fails keeps the previous snapshot; a per-entity one keeps only
//! what it wrote.

use callgraph::storage::{BatchOperation, KeyValue};
use callgraph::{
    CallAttributes, CallGraphPayload, CallGraphStore, EntityRef, Function, GraphError, Loader,
    LoaderConfig, MemoryBackend, Result, StorageBackend,
};

/// Fails every write of a key starting with `prefix` once `allowed` such
/// writes have gone through.
struct FailingBackend {
    inner: MemoryBackend,
    prefix: &'static [u8],
    allowed: usize,
}

impl FailingBackend {
    fn check(&mut self, key: &[u8]) -> Result<()> {
        if !key.starts_with(self.prefix) {
            return Ok(());
        }
        if self.allowed == 0 {
            return Err(GraphError::storage("disk full", None::<std::io::Error>));
        }
        self.allowed -= 1;
        Ok(())
    }
}

impl StorageBackend for FailingBackend {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check(key)?;
        self.inner.put(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.inner.delete(key)
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        self.inner.exists(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KeyValue>> {
        self.inner.scan_prefix(prefix)
    }

    fn write_batch(&mut self, operations: Vec<BatchOperation>) -> Result<()> {
        let puts = operations
            .iter()
            .filter(|op| {
                matches!(op, BatchOperation::Put { key, .. } if key.starts_with(self.prefix))
            })
            .count();
        if puts > self.allowed {
            return Err(GraphError::storage("disk full", None::<std::io::Error>));
        }
        self.allowed -= puts;
        self.inner.write_batch(operations)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

fn payload() -> CallGraphPayload {
    CallGraphPayload::new()
        .with_function(Function::new("F1", "main"))
        .with_function(Function::new("F2", "init"))
        .with_function(Function::new("F3", "load_config"))
        .with_function(Function::new("F4", "run"))
        .with_call("F1", "F2", CallAttributes::direct())
        .with_call("F2", "F3", CallAttributes::direct().with_callsite("cs-2"))
        .with_call("F1", "F4", CallAttributes::indirect(true))
}

fn failing_store(allowed_edges: usize) -> (CallGraphStore, MemoryBackend) {
    let inner = MemoryBackend::new();
    let backend = FailingBackend {
        inner: inner.clone(),
        prefix: b"edge:",
        allowed: allowed_edges,
    };
    (CallGraphStore::with_backend(Box::new(backend)).unwrap(), inner)
}

#[test]
fn test_atomic_abort_leaves_store_empty() {
    let (mut store, observer) = failing_store(1);
    let err = Loader::default().load(&mut store, &payload()).unwrap_err();

    let GraphError::LoadAborted { progress, source } = err else {
        panic!("expected LoadAborted");
    };
    assert!(progress.committed_functions.is_empty());
    assert!(progress.committed_calls.is_empty());
    let rejected = progress.rejected.expect("rejected entity");
    assert!(rejected.entity.is_none());
    assert!(rejected.reason.contains("disk full"));
    assert!(matches!(*source, GraphError::Storage { .. }));

    assert_eq!(store.function_count(), 0);
    assert_eq!(store.edge_count(), 0);
    assert!(store.snapshot_id().is_none());
    assert!(observer.is_empty());
}

#[test]
fn test_non_atomic_abort_keeps_committed_prefix() {
    let (mut store, observer) = failing_store(1);
    let loader = Loader::new(LoaderConfig::default().with_atomic(false));
    let err = loader.load(&mut store, &payload()).unwrap_err();

    let GraphError::LoadAborted { progress, .. } = err else {
        panic!("expected LoadAborted");
    };
    let committed: Vec<&str> = progress
        .committed_functions
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(committed, vec!["F1", "F2", "F3", "F4"]);
    assert_eq!(progress.committed_calls, vec![0]);

    let rejected = progress.rejected.expect("rejected entity");
    match rejected.entity {
        Some(EntityRef::Call {
            index,
            caller,
            callee,
            callsite_id,
        }) => {
            assert_eq!(index, 1);
            assert_eq!((caller.as_str(), callee.as_str()), ("F2", "F3"));
            assert_eq!(callsite_id.unwrap().as_str(), "cs-2");
        }
        other => panic!("unexpected rejected entity: {other:?}"),
    }

    // Exactly the committed prefix remains, with no snapshot stamp
    assert_eq!(store.function_count(), 4);
    assert_eq!(store.edge_count(), 1);
    assert!(store.snapshot_id().is_none());
    assert!(!observer.is_empty());
}

#[test]
fn test_atomic_reload_abort_keeps_previous_snapshot() {
    let (mut store, observer) = failing_store(1);
    let loader = Loader::default();

    let small = CallGraphPayload::new()
        .with_function(Function::new("X", "x"))
        .with_function(Function::new("Y", "y"))
        .with_call("X", "Y", CallAttributes::direct());
    let previous = loader.load(&mut store, &small).unwrap().snapshot_id;

    // No edge writes left, the full payload needs three
    let err = loader.load(&mut store, &payload()).unwrap_err();
    let GraphError::LoadAborted { progress, .. } = err else {
        panic!("expected LoadAborted");
    };
    assert!(progress.committed_functions.is_empty());
    assert!(progress.committed_calls.is_empty());

    assert!(store.contains_function("X"));
    assert!(!store.contains_function("F1"));
    assert_eq!(store.function_count(), 2);
    assert_eq!(store.edge_count(), 1);
    assert_eq!(store.snapshot_id(), Some(previous));
    assert_eq!(store.query().callees("X").unwrap()[0].0.name, "y");

    // The backend still holds the previous snapshot too
    let reopened = CallGraphStore::with_backend(Box::new(observer)).unwrap();
    assert!(reopened.contains_function("X"));
    assert!(reopened.contains_function("Y"));
    assert_eq!(reopened.edge_count(), 1);
    assert_eq!(reopened.snapshot_id(), Some(previous));
}

#[test]
fn test_non_atomic_reload_abort_leaves_partial_state() {
    let (mut store, _observer) = failing_store(3);
    let loader = Loader::new(LoaderConfig::default().with_atomic(false));

    let small = CallGraphPayload::new()
        .with_function(Function::new("X", "x"))
        .with_function(Function::new("Y", "y"))
        .with_call("X", "Y", CallAttributes::direct());
    loader.load(&mut store, &small).unwrap();

    // Two edge writes left, the full payload needs three
    assert!(loader.load(&mut store, &payload()).is_err());
    assert!(!store.contains_function("X"));
    assert_eq!(store.edge_count(), 2);
}
