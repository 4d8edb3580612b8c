//! `CallGraphStore`: the typed function/call-edge store over a [`StorageBackend`].

use super::payload::CallRecord;
use super::types::{
    CallAttributes, CallEdge, CallsiteId, Direction, EdgeId, EntityRef, Function, FunctionId,
};
use crate::error::{GraphError, Result};
use crate::storage::{BatchOperation, StorageBackend};
use log::{debug, info, trace};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

const FUNCTION_PREFIX: &str = "function:";
const EDGE_PREFIX: &str = "edge:";
const META_PREFIX: &str = "meta:";
const COUNTERS_KEY: &[u8] = b"meta:counters";
const SNAPSHOT_KEY: &[u8] = b"meta:snapshot";

fn function_key(id: &str) -> Vec<u8> {
    format!("{FUNCTION_PREFIX}{id}").into_bytes()
}

// Zero-padded so that key order equals edge id order.
fn edge_key(id: EdgeId) -> Vec<u8> {
    format!("{EDGE_PREFIX}{id:020}").into_bytes()
}

/// Why [`CallGraphStore::put_batch`] or [`CallGraphStore::replace_batch`] refused a batch.
#[derive(Debug)]
pub struct BatchRejection {
    /// The offending entity; `None` when the backend write itself failed
    pub entity: Option<EntityRef>,
    /// Why it was refused
    pub error: GraphError,
}

/// A checked batch, ready to be written.
struct StagedBatch {
    operations: Vec<BatchOperation>,
    edges: Vec<CallEdge>,
    next_counter: EdgeId,
}

/// The call graph store.
///
/// Sole owner of persisted function and call-edge state. Every record is
/// written to the backend and mirrored in in-memory indexes, so reads never
/// touch the backend. Enumeration order is deterministic: functions by id,
/// edges per endpoint by insertion order (edge ids are monotonic).
pub struct CallGraphStore {
    storage: Box<dyn StorageBackend>,
    edge_counter: EdgeId,
    snapshot_id: Option<Uuid>,
    functions: BTreeMap<FunctionId, Function>,
    edges: BTreeMap<EdgeId, CallEdge>,
    adjacency_out: HashMap<FunctionId, Vec<EdgeId>>,
    adjacency_in: HashMap<FunctionId, Vec<EdgeId>>,
    callsites: HashMap<CallsiteId, EdgeId>,
}

impl CallGraphStore {
    /// Open a store over the given backend, rebuilding indexes from any
    /// records it already holds.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Storage`] if the backend cannot be read and
    /// [`GraphError::Serialization`] if a stored record is corrupt.
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Result<Self> {
        let mut store = Self {
            storage: backend,
            edge_counter: 0,
            snapshot_id: None,
            functions: BTreeMap::new(),
            edges: BTreeMap::new(),
            adjacency_out: HashMap::new(),
            adjacency_in: HashMap::new(),
            callsites: HashMap::new(),
        };

        store.rebuild_from_storage()?;

        Ok(store)
    }

    /// Open a persistent store at the given directory (RocksDB).
    #[cfg(feature = "rocksdb-backend")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        use crate::storage::RocksDBBackend;
        info!("Opening call graph store at path: {:?}", path.as_ref());
        let backend = RocksDBBackend::open(path)?;
        Self::with_backend(Box::new(backend))
    }

    /// Create an empty in-memory store.
    pub fn in_memory() -> Result<Self> {
        use crate::storage::MemoryBackend;
        Self::with_backend(Box::new(MemoryBackend::new()))
    }

    /// Insert a function. Fails if a function with the same id exists.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateFunction`] on an id clash, or a storage
    /// error if persistence fails.
    pub fn put_function(&mut self, function: Function) -> Result<()> {
        if self.functions.contains_key(&function.id) {
            return Err(GraphError::DuplicateFunction {
                function_id: function.id.to_string(),
            });
        }
        debug!("Adding function: id={}, name={}", function.id, function.name);

        let value = encode(&function, "function")?;
        self.storage.put(&function_key(function.id.as_str()), &value)?;

        self.functions.insert(function.id.clone(), function);
        Ok(())
    }

    /// Get a function by id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FunctionNotFound`] if no such function is stored.
    pub fn get_function(&self, id: &str) -> Result<&Function> {
        self.functions
            .get(id)
            .ok_or_else(|| GraphError::function_not_found(id))
    }

    /// True when a function with this id is stored.
    pub fn contains_function(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    /// Insert a call edge between two stored functions.
    ///
    /// # Returns
    ///
    /// The id assigned to the new edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FunctionNotFound`] if either endpoint is missing,
    /// [`GraphError::DuplicateCallsite`] if the callsite id is already used.
    pub fn put_call_edge(
        &mut self,
        caller: impl Into<FunctionId>,
        callee: impl Into<FunctionId>,
        attributes: CallAttributes,
    ) -> Result<EdgeId> {
        let caller = caller.into();
        let callee = callee.into();
        debug!("Adding call edge: {caller} -> {callee}");

        self.get_function(caller.as_str())?;
        self.get_function(callee.as_str())?;
        if let Some(callsite) = &attributes.callsite_id {
            if self.callsites.contains_key(callsite) {
                return Err(GraphError::DuplicateCallsite {
                    callsite_id: callsite.to_string(),
                });
            }
        }

        let edge = CallEdge::new(self.edge_counter, caller, callee, attributes);
        let value = encode(&edge, "call edge")?;
        self.storage.put(&edge_key(edge.id), &value)?;
        self.edge_counter += 1;

        let edge_id = edge.id;
        self.index_edge(edge);
        trace!("Call edge {edge_id} added successfully");

        Ok(edge_id)
    }

    /// Add a batch on top of the current contents in one atomic backend write.
    ///
    /// Everything is checked against the store and against the batch itself
    /// before anything is written. On rejection the store is left untouched.
    ///
    /// # Returns
    ///
    /// The ids assigned to `calls`, in the same order.
    pub fn put_batch(
        &mut self,
        functions: &[Function],
        calls: &[CallRecord],
    ) -> std::result::Result<Vec<EdgeId>, BatchRejection> {
        debug!(
            "Adding batch of {} functions and {} calls",
            functions.len(),
            calls.len()
        );
        let staged = self.stage(functions, calls, false)?;
        let mut operations = staged.operations;
        operations.push(BatchOperation::Put {
            key: COUNTERS_KEY.to_vec(),
            value: rejected_by_backend(encode_counters(staged.next_counter))?,
        });
        rejected_by_backend(self.storage.write_batch(operations))?;

        // Indexes are only touched once the backend accepted the batch.
        let edge_ids = self.commit_staged(functions, staged.edges, staged.next_counter);
        Ok(edge_ids)
    }

    /// Replace the whole contents of the store with a new snapshot.
    ///
    /// Deletion of the previous snapshot, the new records, the counters and a
    /// fresh snapshot marker all go to the backend in a single `write_batch`.
    /// On rejection the previous snapshot stays in place, both on the backend
    /// and in the indexes.
    ///
    /// # Returns
    ///
    /// The id stamped on the new snapshot.
    pub fn replace_batch(
        &mut self,
        functions: &[Function],
        calls: &[CallRecord],
    ) -> std::result::Result<Uuid, BatchRejection> {
        debug!(
            "Replacing snapshot with {} functions and {} calls",
            functions.len(),
            calls.len()
        );
        let staged = self.stage(functions, calls, true)?;

        let mut operations = Vec::with_capacity(staged.operations.len() + self.functions.len());
        for prefix in [FUNCTION_PREFIX, EDGE_PREFIX, META_PREFIX] {
            let existing = rejected_by_backend(self.storage.scan_prefix(prefix.as_bytes()))?;
            for (key, _) in existing {
                operations.push(BatchOperation::Delete { key });
            }
        }
        operations.extend(staged.operations);

        let snapshot_id = Uuid::new_v4();
        operations.push(BatchOperation::Put {
            key: COUNTERS_KEY.to_vec(),
            value: rejected_by_backend(encode_counters(staged.next_counter))?,
        });
        operations.push(BatchOperation::Put {
            key: SNAPSHOT_KEY.to_vec(),
            value: rejected_by_backend(encode_snapshot_marker(snapshot_id))?,
        });

        rejected_by_backend(self.storage.write_batch(operations))?;

        self.reset_indexes();
        self.commit_staged(functions, staged.edges, staged.next_counter);
        self.snapshot_id = Some(snapshot_id);
        info!("Replaced call graph with snapshot {snapshot_id}");
        Ok(snapshot_id)
    }

    /// Get a call edge by id.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeNotFound`] if the edge doesn't exist.
    pub fn get_edge(&self, id: EdgeId) -> Result<&CallEdge> {
        self.edges.get(&id).ok_or_else(|| GraphError::EdgeNotFound {
            edge_id: id.to_string(),
        })
    }

    /// Outgoing edges of a function, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FunctionNotFound`] if the function doesn't exist.
    pub fn edges_from(&self, function_id: &str) -> Result<Vec<&CallEdge>> {
        self.edges_of(function_id, Direction::Outgoing)
    }

    /// Incoming edges of a function, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FunctionNotFound`] if the function doesn't exist.
    pub fn edges_to(&self, function_id: &str) -> Result<Vec<&CallEdge>> {
        self.edges_of(function_id, Direction::Incoming)
    }

    /// Edges incident to a function in the given direction, in insertion order.
    pub fn edges_of(&self, function_id: &str, direction: Direction) -> Result<Vec<&CallEdge>> {
        self.get_function(function_id)?;

        let adjacency = match direction {
            Direction::Outgoing => &self.adjacency_out,
            Direction::Incoming => &self.adjacency_in,
        };
        Ok(adjacency
            .get(function_id)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default())
    }

    /// Number of incident edges in the given direction (0 for unknown ids).
    pub fn degree(&self, function_id: &str, direction: Direction) -> usize {
        let adjacency = match direction {
            Direction::Outgoing => &self.adjacency_out,
            Direction::Incoming => &self.adjacency_in,
        };
        adjacency.get(function_id).map_or(0, Vec::len)
    }

    /// All functions, sorted by id.
    pub fn all_functions(&self) -> Vec<&Function> {
        self.functions.values().collect()
    }

    /// All call edges, in id order.
    pub fn all_edges(&self) -> impl Iterator<Item = &CallEdge> {
        self.edges.values()
    }

    /// Functions whose name contains `query`, ignoring case.
    ///
    /// Sorted by name, then id. The empty query matches every function.
    pub fn find_by_name_substring(&self, query: &str) -> Vec<&Function> {
        let needle = query.to_lowercase();
        let mut matches: Vec<&Function> = self
            .functions
            .values()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        matches
    }

    /// Get the total number of functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Get the total number of call edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Id of the snapshot currently held, if a load completed.
    pub fn snapshot_id(&self) -> Option<Uuid> {
        self.snapshot_id
    }

    /// Mark the current contents as a complete snapshot under a fresh id.
    pub fn stamp_snapshot(&mut self) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let value = encode_snapshot_marker(id)?;
        self.storage.put(SNAPSHOT_KEY, &value)?;
        self.snapshot_id = Some(id);
        info!("Stamped call graph snapshot {id}");
        Ok(id)
    }

    /// Remove every function, edge, and snapshot marker.
    ///
    /// This is a destructive operation that cannot be undone.
    pub fn clear(&mut self) -> Result<()> {
        let mut operations = Vec::new();
        for prefix in [FUNCTION_PREFIX, EDGE_PREFIX, META_PREFIX] {
            for (key, _) in self.storage.scan_prefix(prefix.as_bytes())? {
                operations.push(BatchOperation::Delete { key });
            }
        }
        debug!("Clearing store: {} keys", operations.len());
        self.storage.write_batch(operations)?;
        self.reset_indexes();
        Ok(())
    }

    /// Persist counters and flush the backend.
    pub fn flush(&mut self) -> Result<()> {
        debug!("Flushing call graph store");
        let counters = encode_counters(self.edge_counter)?;
        self.storage.put(COUNTERS_KEY, &counters)?;
        self.storage.flush()
    }

    /// Flush and close the store.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    // Private helper methods

    /// Check a batch and turn it into backend writes without touching the
    /// store. With `replacing` set, ids are checked against the batch alone and
    /// edge ids restart from zero.
    fn stage<'b>(
        &self,
        functions: &'b [Function],
        calls: &'b [CallRecord],
        replacing: bool,
    ) -> std::result::Result<StagedBatch, BatchRejection> {
        let mut operations = Vec::with_capacity(functions.len() + calls.len() + 2);
        let mut staged_functions: HashSet<&'b FunctionId> = HashSet::new();
        let stored_function = |id: &FunctionId| !replacing && self.functions.contains_key(id);
        let stored_callsite = |id: &CallsiteId| !replacing && self.callsites.contains_key(id);

        for function in functions {
            let entity = || Some(EntityRef::Function(function.id.clone()));
            if stored_function(&function.id) || !staged_functions.insert(&function.id) {
                return Err(BatchRejection {
                    entity: entity(),
                    error: GraphError::DuplicateFunction {
                        function_id: function.id.to_string(),
                    },
                });
            }
            let value = encode(function, "function").map_err(|error| BatchRejection {
                entity: entity(),
                error,
            })?;
            operations.push(BatchOperation::Put {
                key: function_key(function.id.as_str()),
                value,
            });
        }

        let first_id = if replacing { 0 } else { self.edge_counter };
        let mut staged_callsites: HashSet<&'b CallsiteId> = HashSet::new();
        let mut edges = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            let entity = || {
                Some(EntityRef::Call {
                    index,
                    caller: call.caller.clone(),
                    callee: call.callee.clone(),
                    callsite_id: call.attributes.callsite_id.clone(),
                })
            };
            for endpoint in [&call.caller, &call.callee] {
                if !stored_function(endpoint) && !staged_functions.contains(endpoint) {
                    return Err(BatchRejection {
                        entity: entity(),
                        error: GraphError::function_not_found(endpoint),
                    });
                }
            }
            if let Some(callsite) = &call.attributes.callsite_id {
                if stored_callsite(callsite) || !staged_callsites.insert(callsite) {
                    return Err(BatchRejection {
                        entity: entity(),
                        error: GraphError::DuplicateCallsite {
                            callsite_id: callsite.to_string(),
                        },
                    });
                }
            }

            let edge = CallEdge::new(
                first_id + index as EdgeId,
                call.caller.clone(),
                call.callee.clone(),
                call.attributes.clone(),
            );
            let value = encode(&edge, "call edge").map_err(|error| BatchRejection {
                entity: entity(),
                error,
            })?;
            operations.push(BatchOperation::Put {
                key: edge_key(edge.id),
                value,
            });
            edges.push(edge);
        }

        Ok(StagedBatch {
            operations,
            edges,
            next_counter: first_id + calls.len() as EdgeId,
        })
    }

    fn commit_staged(
        &mut self,
        functions: &[Function],
        edges: Vec<CallEdge>,
        next_counter: EdgeId,
    ) -> Vec<EdgeId> {
        for function in functions {
            self.functions.insert(function.id.clone(), function.clone());
        }
        let edge_ids = edges.iter().map(|e| e.id).collect();
        for edge in edges {
            self.index_edge(edge);
        }
        self.edge_counter = next_counter;
        trace!("Batch committed, edge counter now {next_counter}");
        edge_ids
    }

    fn reset_indexes(&mut self) {
        self.functions.clear();
        self.edges.clear();
        self.adjacency_out.clear();
        self.adjacency_in.clear();
        self.callsites.clear();
        self.edge_counter = 0;
        self.snapshot_id = None;
    }

    fn index_edge(&mut self, edge: CallEdge) {
        self.adjacency_out
            .entry(edge.caller.clone())
            .or_default()
            .push(edge.id);
        self.adjacency_in
            .entry(edge.callee.clone())
            .or_default()
            .push(edge.id);
        if let Some(callsite) = &edge.attributes.callsite_id {
            self.callsites.insert(callsite.clone(), edge.id);
        }
        self.edges.insert(edge.id, edge);
    }

    fn rebuild_from_storage(&mut self) -> Result<()> {
        if let Some(value) = self.storage.get(COUNTERS_KEY)? {
            let counters: serde_json::Value = decode(&value, "counters")?;
            if let Some(edge_counter) = counters.get("edge_counter").and_then(|v| v.as_u64()) {
                self.edge_counter = edge_counter;
            }
        }

        if let Some(value) = self.storage.get(SNAPSHOT_KEY)? {
            let marker: serde_json::Value = decode(&value, "snapshot marker")?;
            self.snapshot_id = marker
                .get("snapshot_id")
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok());
        }

        for (_, value) in self.storage.scan_prefix(FUNCTION_PREFIX.as_bytes())? {
            let function: Function = decode(&value, "function")?;
            self.functions.insert(function.id.clone(), function);
        }

        // Key order is id order, so adjacency lists come back in insertion order.
        for (_, value) in self.storage.scan_prefix(EDGE_PREFIX.as_bytes())? {
            let edge: CallEdge = decode(&value, "call edge")?;
            // Counters are only saved on flush; never reuse an id seen on disk.
            self.edge_counter = self.edge_counter.max(edge.id + 1);
            self.index_edge(edge);
        }

        if !self.functions.is_empty() {
            info!(
                "Rebuilt store from storage: {} functions, {} call edges",
                self.functions.len(),
                self.edges.len()
            );
        }
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| GraphError::serialization(format!("Failed to serialize {what}"), Some(e)))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| GraphError::serialization(format!("Failed to deserialize {what}"), Some(e)))
}

fn encode_counters(edge_counter: EdgeId) -> Result<Vec<u8>> {
    encode(&serde_json::json!({ "edge_counter": edge_counter }), "counters")
}

fn encode_snapshot_marker(snapshot_id: Uuid) -> Result<Vec<u8>> {
    encode(&serde_json::json!({ "snapshot_id": snapshot_id }), "snapshot marker")
}

fn rejected_by_backend<T>(result: Result<T>) -> std::result::Result<T, BatchRejection> {
    result.map_err(|error| BatchRejection {
        entity: None,
        error,
    })
}
