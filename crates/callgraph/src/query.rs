//! Read-only queries over a committed call graph.
//!
//! [`QueryEngine`] borrows a [`CallGraphStore`] immutably and keeps no state
//! between calls, so any number of engines may query the same store from
//! different threads.

use crate::config::QueryConfig;
use crate::error::{GraphError, Result};
use crate::export::{self, DotOptions};
use crate::graph::algorithms::{self, CallTree};
use crate::graph::{CallEdge, CallGraphPayload, CallGraphStore, Direction, Function};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Fan-in and fan-out of one function, counted over committed edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanStats {
    /// Incoming call edges
    pub fan_in: usize,
    /// Outgoing call edges
    pub fan_out: usize,
}

/// One row of a per-depth breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Distance from the root
    pub depth: usize,
    /// Functions first reached at this depth
    pub function_count: usize,
    /// Tree edges whose caller sits at this depth
    pub edge_count: usize,
}

/// A function together with its immediate neighbourhood.
#[derive(Debug, Clone)]
pub struct FunctionDetail<'a> {
    /// The function
    pub function: &'a Function,
    /// Calling functions, with the edge used
    pub callers: Vec<(&'a Function, &'a CallEdge)>,
    /// Called functions, with the edge used
    pub callees: Vec<(&'a Function, &'a CallEdge)>,
    /// Edge counts in both directions
    pub fan: FanStats,
}

/// Query engine over a call graph store.
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
/// let mut store = CallGraphStore::in_memory()?;
/// Loader::default().load(&mut store, &payload)?;
///
/// let tree = store.query().call_tree("F1", Some(1))?;
/// assert_eq!(tree.nodes.len(), 2);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct QueryEngine<'a> {
    store: &'a CallGraphStore,
    config: QueryConfig,
}

impl CallGraphStore {
    /// Start querying this store with the default configuration.
    pub fn query(&self) -> QueryEngine<'_> {
        QueryEngine::new(self)
    }
}

impl<'a> QueryEngine<'a> {
    /// Create an engine with the default configuration.
    pub fn new(store: &'a CallGraphStore) -> Self {
        Self::with_config(store, QueryConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(store: &'a CallGraphStore, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Functions whose name contains `name_substring`, ignoring case.
    ///
    /// Returns an empty list when nothing matches.
    pub fn search(&self, name_substring: &str) -> Vec<&'a Function> {
        self.store.find_by_name_substring(name_substring)
    }

    /// Functions called by `function_id`, one entry per call edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FunctionNotFound`] if the function doesn't exist.
    pub fn callees(&self, function_id: &str) -> Result<Vec<(&'a Function, &'a CallEdge)>> {
        self.neighbours(function_id, Direction::Outgoing)
    }

    /// Functions calling `function_id`, one entry per call edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FunctionNotFound`] if the function doesn't exist.
    pub fn callers(&self, function_id: &str) -> Result<Vec<(&'a Function, &'a CallEdge)>> {
        self.neighbours(function_id, Direction::Incoming)
    }

    /// Breadth-first call tree from `root_id`, at most `max_depth` hops deep.
    ///
    /// See [`algorithms::call_tree`] for which edges are kept.
    pub fn call_tree(&self, root_id: &str, max_depth: Option<usize>) -> Result<CallTree<'a>> {
        debug!("Call tree from {root_id} (max_depth={max_depth:?})");
        algorithms::call_tree(self.store, root_id, max_depth)
    }

    /// Number of functions first reached at each depth from `root_id`.
    pub fn depth_summary(&self, root_id: &str) -> Result<BTreeMap<usize, usize>> {
        algorithms::depth_summary(self.store, root_id)
    }

    /// Fan-in and fan-out of a function. A self-loop counts in both.
    pub fn fan_stats(&self, function_id: &str) -> Result<FanStats> {
        self.store.get_function(function_id)?;
        Ok(FanStats {
            fan_in: self.store.degree(function_id, Direction::Incoming),
            fan_out: self.store.degree(function_id, Direction::Outgoing),
        })
    }

    /// Export the call tree from `root_id` in ingestion payload shape.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidOperation`] if the tree has more nodes than
    /// the configured export limit.
    pub fn export_subgraph(
        &self,
        root_id: &str,
        max_depth: Option<usize>,
    ) -> Result<CallGraphPayload> {
        let tree = self.bounded_tree(root_id, max_depth)?;
        Ok(export::tree_to_payload(&tree))
    }

    /// Render the call tree from `root_id` as Graphviz DOT.
    ///
    /// Subject to the same size limit as [`QueryEngine::export_subgraph`].
    pub fn export_subgraph_dot(
        &self,
        root_id: &str,
        max_depth: Option<usize>,
        options: &DotOptions,
    ) -> Result<String> {
        let tree = self.bounded_tree(root_id, max_depth)?;
        Ok(export::export_dot_styled(&tree, options))
    }

    /// Find a function by id, falling back to an exact name match.
    ///
    /// When several functions share the name, the lowest id wins.
    pub fn resolve(&self, name_or_id: &str) -> Result<&'a Function> {
        if let Ok(function) = self.store.get_function(name_or_id) {
            return Ok(function);
        }
        self.store
            .all_functions()
            .into_iter()
            .find(|f| f.name == name_or_id)
            .ok_or_else(|| GraphError::function_not_found(name_or_id))
    }

    /// A function with its callers, callees, and fan statistics.
    pub fn function_detail(&self, function_id: &str) -> Result<FunctionDetail<'a>> {
        let function = self.store.get_function(function_id)?;
        let callers = self.callers(function_id)?;
        let callees = self.callees(function_id)?;
        let fan = FanStats {
            fan_in: callers.len(),
            fan_out: callees.len(),
        };
        Ok(FunctionDetail {
            function,
            callers,
            callees,
            fan,
        })
    }

    /// Edges of the unbounded call tree whose caller sits at `depth`.
    pub fn edges_at_depth(&self, root_id: &str, depth: usize) -> Result<Vec<&'a CallEdge>> {
        let tree = self.call_tree(root_id, None)?;
        let depths = depth_index(&tree);
        Ok(tree
            .edges
            .iter()
            .copied()
            .filter(|e| depths.get(e.caller.as_str()) == Some(&depth))
            .collect())
    }

    /// Per-depth function and edge counts of the unbounded call tree.
    pub fn depth_breakdown(&self, root_id: &str) -> Result<Vec<DepthLevel>> {
        let tree = self.call_tree(root_id, None)?;
        let depths = depth_index(&tree);

        let mut levels: BTreeMap<usize, DepthLevel> = BTreeMap::new();
        for node in &tree.nodes {
            levels
                .entry(node.depth)
                .or_insert(DepthLevel {
                    depth: node.depth,
                    function_count: 0,
                    edge_count: 0,
                })
                .function_count += 1;
        }
        for edge in &tree.edges {
            if let Some(level) = depths.get(edge.caller.as_str()).and_then(|d| levels.get_mut(d)) {
                level.edge_count += 1;
            }
        }
        Ok(levels.into_values().collect())
    }

    /// The `n` functions with the most outgoing edges.
    pub fn top_fan_out(&self, n: usize) -> Vec<(&'a Function, usize)> {
        self.top_by_degree(Direction::Outgoing, n)
    }

    /// The `n` functions with the most incoming edges.
    pub fn top_fan_in(&self, n: usize) -> Vec<(&'a Function, usize)> {
        self.top_by_degree(Direction::Incoming, n)
    }

    /// Functions with no incoming or outgoing edges, by id.
    pub fn orphans(&self) -> Vec<&'a Function> {
        self.store
            .all_functions()
            .into_iter()
            .filter(|f| {
                self.store.degree(f.id.as_str(), Direction::Incoming) == 0
                    && self.store.degree(f.id.as_str(), Direction::Outgoing) == 0
            })
            .collect()
    }

    // Private helper methods

    fn neighbours(
        &self,
        function_id: &str,
        direction: Direction,
    ) -> Result<Vec<(&'a Function, &'a CallEdge)>> {
        self.store
            .edges_of(function_id, direction)?
            .into_iter()
            .map(|edge| {
                let other = self.store.get_function(edge.endpoint(direction).as_str())?;
                Ok((other, edge))
            })
            .collect()
    }

    fn bounded_tree(&self, root_id: &str, max_depth: Option<usize>) -> Result<CallTree<'a>> {
        let tree = self.call_tree(root_id, max_depth)?;
        let size = tree.nodes.len();
        if size > self.config.export_node_limit {
            return Err(GraphError::InvalidOperation {
                message: format!(
                    "subgraph from {root_id} has {size} functions, export limit is {}",
                    self.config.export_node_limit
                ),
            });
        }
        if size > self.config.export_warn_threshold {
            warn!("Exporting large subgraph from {root_id}: {size} functions");
        }
        Ok(tree)
    }

    fn top_by_degree(&self, direction: Direction, n: usize) -> Vec<(&'a Function, usize)> {
        let mut ranked: Vec<(&'a Function, usize)> = self
            .store
            .all_functions()
            .into_iter()
            .map(|f| (f, self.store.degree(f.id.as_str(), direction)))
            .filter(|(_, count)| *count > 0)
            .collect();
        ranked.sort_by(|(a, ca), (b, cb)| {
            cb.cmp(ca)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(n);
        ranked
    }
}

fn depth_index<'t>(tree: &'t CallTree<'_>) -> HashMap<&'t str, usize> {
    tree.nodes
        .iter()
        .map(|n| (n.function.id.as_str(), n.depth))
        .collect()
}
