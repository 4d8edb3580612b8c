//! Payload-shaped JSON export of call trees.
//!
//! The output has the same `{"functions": [...], "calls": [...]}` shape as
//! the ingestion payload, restricted to the tree's nodes and edges.

use crate::graph::{CallGraphPayload, CallRecord, CallTree};
use crate::Result;

/// Convert a call tree into a payload: functions in discovery order, calls in
/// traversal order.
pub fn tree_to_payload(tree: &CallTree<'_>) -> CallGraphPayload {
    CallGraphPayload {
        functions: tree.nodes.iter().map(|n| n.function.clone()).collect(),
        calls: tree.edges.iter().map(|e| CallRecord::from(*e)).collect(),
    }
}

/// Export a call tree as pretty-printed payload JSON.
pub fn export_json(tree: &CallTree<'_>) -> Result<String> {
    tree_to_payload(tree).to_json_pretty()
}
