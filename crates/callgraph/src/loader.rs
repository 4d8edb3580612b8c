//! Validated full-snapshot ingestion.
//!
//! The [`Loader`] re-validates every payload, replaces the store's previous
//! snapshot, and reports what was committed. Functions are always written
//! before calls.

use crate::config::LoaderConfig;
use crate::error::{GraphError, Result};
use crate::graph::{CallGraphPayload, CallGraphStore, Direction, EdgeId, EntityRef, FunctionId};
use crate::validate::{validate, Warning};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The entity the store refused during a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntity {
    /// The refused entity; `None` when the backend failed on a batch write
    pub entity: Option<EntityRef>,
    /// The store's reason, rendered as text
    pub reason: String,
}

/// How far a load got before it was aborted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    /// Functions written before the abort, in write order
    pub committed_functions: Vec<FunctionId>,
    /// Edge ids written before the abort, in write order
    pub committed_calls: Vec<EdgeId>,
    /// The entity that stopped the load
    pub rejected: Option<RejectedEntity>,
}

/// A function in the load report's fan-out ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutEntry {
    /// Function id
    pub function_id: FunctionId,
    /// Function name
    pub name: String,
    /// Number of committed outgoing call edges
    pub fan_out: usize,
}

/// Summary of a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Functions committed
    pub function_count: usize,
    /// Call edges committed
    pub edge_count: usize,
    /// Validation warnings (orphans, empty graph)
    pub warnings: Vec<Warning>,
    /// Id stamped on the new snapshot
    pub snapshot_id: Uuid,
    /// Functions with the most outgoing calls, highest first
    pub top_fan_out: Vec<FanOutEntry>,
}

/// Loads call graph payloads into a [`CallGraphStore`].
///
/// # Examples
///
/// ```
/// use callgraph::{CallAttributes, CallGraphPayload, CallGraphStore, Function, Loader};
///
/// # fn example() -> callgraph::Result<()> {
/// let payload = CallGraphPayload::new()
///     .with_function(Function::new("F1", "main"))
///     .with_function(Function::new("F2", "init"))
///     .with_call("F1", "F2", CallAttributes::direct());
///
/// let mut store = CallGraphStore::in_memory()?;
/// let report = Loader::default().load(&mut store, &payload)?;
/// assert_eq!(report.edge_count, 1);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    /// Create a loader with the given configuration.
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// The loader's configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Validate `payload` and replace the contents of `store` with it.
    ///
    /// # Errors
    ///
    /// - [`GraphError::ValidationFailed`] if validation reports errors. The
    ///   store is not touched in that case.
    /// - [`GraphError::LoadAborted`] if the store refuses an entity. In atomic
    ///   mode the previous snapshot is still in place; otherwise the progress
    ///   lists the committed prefix, which is all the store holds.
    /// - A storage error if the previous snapshot cannot be cleared
    ///   (non-atomic mode) or the backend cannot be flushed.
    pub fn load(
        &self,
        store: &mut CallGraphStore,
        payload: &CallGraphPayload,
    ) -> Result<LoadReport> {
        let report = validate(payload);
        if !report.is_valid() {
            return Err(GraphError::ValidationFailed {
                report: Box::new(report),
            });
        }

        info!(
            "Loading call graph: {} functions, {} calls (atomic={})",
            payload.functions.len(),
            payload.calls.len(),
            self.config.atomic
        );

        let snapshot_id = if self.config.atomic {
            let snapshot_id = self.replace_snapshot(store, payload)?;
            store.flush()?;
            snapshot_id
        } else {
            store.clear()?;
            self.write_each(store, payload)?;
            store.flush()?;
            store.stamp_snapshot()?
        };

        let load_report = LoadReport {
            function_count: store.function_count(),
            edge_count: store.edge_count(),
            warnings: report.warnings().to_vec(),
            snapshot_id,
            top_fan_out: top_fan_out(store, self.config.top_n),
        };
        info!(
            "Loaded snapshot {}: {} functions, {} call edges",
            snapshot_id, load_report.function_count, load_report.edge_count
        );
        Ok(load_report)
    }

    fn replace_snapshot(
        &self,
        store: &mut CallGraphStore,
        payload: &CallGraphPayload,
    ) -> Result<Uuid> {
        store
            .replace_batch(&payload.functions, &payload.calls)
            .map(|snapshot_id| {
                debug!("Batch committed {} call edges", payload.calls.len());
                snapshot_id
            })
            .map_err(|rejection| {
                warn!("Atomic load rejected, previous snapshot kept: {}", rejection.error);
                let progress = LoadProgress {
                    rejected: Some(RejectedEntity {
                        entity: rejection.entity,
                        reason: rejection.error.to_string(),
                    }),
                    ..LoadProgress::default()
                };
                GraphError::LoadAborted {
                    progress: Box::new(progress),
                    source: Box::new(rejection.error),
                }
            })
    }

    fn write_each(&self, store: &mut CallGraphStore, payload: &CallGraphPayload) -> Result<()> {
        let mut progress = LoadProgress::default();

        for function in &payload.functions {
            if let Err(error) = store.put_function(function.clone()) {
                return Err(abort(progress, EntityRef::Function(function.id.clone()), error));
            }
            progress.committed_functions.push(function.id.clone());
        }

        for (index, call) in payload.calls.iter().enumerate() {
            let written = store.put_call_edge(
                call.caller.clone(),
                call.callee.clone(),
                call.attributes.clone(),
            );
            match written {
                Ok(edge_id) => progress.committed_calls.push(edge_id),
                Err(error) => {
                    let entity = EntityRef::Call {
                        index,
                        caller: call.caller.clone(),
                        callee: call.callee.clone(),
                        callsite_id: call.attributes.callsite_id.clone(),
                    };
                    return Err(abort(progress, entity, error));
                }
            }
        }
        Ok(())
    }
}

fn abort(mut progress: LoadProgress, entity: EntityRef, error: GraphError) -> GraphError {
    warn!(
        "Load aborted at {entity} after {} function(s) and {} call(s): {error}",
        progress.committed_functions.len(),
        progress.committed_calls.len()
    );
    progress.rejected = Some(RejectedEntity {
        entity: Some(entity),
        reason: error.to_string(),
    });
    GraphError::LoadAborted {
        progress: Box::new(progress),
        source: Box::new(error),
    }
}

/// Functions with at least one outgoing edge, by fan-out descending, then
/// name, then id.
fn top_fan_out(store: &CallGraphStore, n: usize) -> Vec<FanOutEntry> {
    let mut entries: Vec<FanOutEntry> = store
        .all_functions()
        .into_iter()
        .map(|f| FanOutEntry {
            function_id: f.id.clone(),
            name: f.name.clone(),
            fan_out: store.degree(f.id.as_str(), Direction::Outgoing),
        })
        .filter(|e| e.fan_out > 0)
        .collect();
    entries.sort_by(|a, b| {
        b.fan_out
            .cmp(&a.fan_out)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.function_id.cmp(&b.function_id))
    });
    entries.truncate(n);
    entries
}
