//! Call graph traversal algorithms.
//!
//! Breadth-first call-tree expansion with a depth limit and visited-set cycle
//! guarding. All scratch state (visited map, queue) lives inside the call.

use super::store::CallGraphStore;
use super::types::{CallEdge, Function, FunctionId};
use crate::error::Result;
use log::trace;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A function reached by a call-tree traversal.
#[derive(Debug, Clone, Copy)]
pub struct TreeNode<'a> {
    /// The function
    pub function: &'a Function,
    /// Depth of first discovery (root = 0)
    pub depth: usize,
}

/// Result of a breadth-first call-tree traversal.
#[derive(Debug, Clone)]
pub struct CallTree<'a> {
    /// Reached functions in discovery order; the root comes first
    pub nodes: Vec<TreeNode<'a>>,
    /// Traversed edges in traversal order, including edges back to
    /// already-visited functions
    pub edges: Vec<&'a CallEdge>,
    /// True if some function at the depth limit has outgoing calls that were
    /// not followed
    pub truncated: bool,
}

impl<'a> CallTree<'a> {
    /// The root of the traversal.
    pub fn root(&self) -> &'a Function {
        self.nodes[0].function
    }

    /// Discovery depth of a function, if it is part of the tree.
    pub fn depth_of(&self, function_id: &str) -> Option<usize> {
        self.nodes
            .iter()
            .find(|n| n.function.id.as_str() == function_id)
            .map(|n| n.depth)
    }

    /// True if the function is part of the tree.
    pub fn contains(&self, function_id: &str) -> bool {
        self.depth_of(function_id).is_some()
    }

    /// Deepest discovery depth in the tree.
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}

/// Breadth-first traversal of outgoing calls from `root`.
///
/// # Parameters
/// - `store`: The store to traverse
/// - `root`: Starting function id
/// - `max_depth`: Maximum number of hops (None for unlimited)
///
/// Each function appears once, at the depth where it was first discovered.
/// While expanding a function `u` at depth `d`, an edge `u -> v` is kept when
/// `v` is new, when `v` was reached at depth `<= d` (a back or cross edge,
/// including self-loops), or when `v` was discovered through `u` itself.
/// Edges to a function discovered at `d + 1` through another parent are
/// dropped.
///
/// # Errors
///
/// Returns [`GraphError::FunctionNotFound`](crate::GraphError::FunctionNotFound)
/// if `root` is not stored.
pub fn call_tree<'a>(
    store: &'a CallGraphStore,
    root: &str,
    max_depth: Option<usize>,
) -> Result<CallTree<'a>> {
    let root_function = store.get_function(root)?;

    // function id -> (depth, discovering parent)
    let mut visited: HashMap<&'a FunctionId, (usize, Option<&'a FunctionId>)> = HashMap::new();
    let mut queue = VecDeque::new();
    let mut nodes = vec![TreeNode {
        function: root_function,
        depth: 0,
    }];
    let mut edges = Vec::new();
    let mut truncated = false;

    visited.insert(&root_function.id, (0, None));
    queue.push_back((root_function, 0));

    while let Some((current, depth)) = queue.pop_front() {
        let outgoing = store.edges_from(current.id.as_str())?;

        if max_depth.is_some_and(|max| depth >= max) {
            if !outgoing.is_empty() {
                truncated = true;
            }
            continue;
        }

        for edge in outgoing {
            match visited.get(&edge.callee) {
                None => {
                    let callee = store.get_function(edge.callee.as_str())?;
                    visited.insert(&callee.id, (depth + 1, Some(&current.id)));
                    nodes.push(TreeNode {
                        function: callee,
                        depth: depth + 1,
                    });
                    queue.push_back((callee, depth + 1));
                    edges.push(edge);
                }
                Some(&(seen_at, _)) if seen_at <= depth => edges.push(edge),
                Some(&(_, Some(parent))) if parent == &current.id => edges.push(edge),
                Some(_) => {
                    trace!(
                        "Skipping {} -> {}: already discovered via another parent",
                        edge.caller,
                        edge.callee
                    );
                }
            }
        }
    }

    Ok(CallTree {
        nodes,
        edges,
        truncated,
    })
}

/// Number of functions first reached at each depth of the unbounded call tree.
///
/// Terminates on cyclic graphs because every function is visited once.
pub fn depth_summary(store: &CallGraphStore, root: &str) -> Result<BTreeMap<usize, usize>> {
    let tree = call_tree(store, root, None)?;
    let mut summary = BTreeMap::new();
    for node in &tree.nodes {
        *summary.entry(node.depth).or_insert(0) += 1;
    }
    Ok(summary)
}
