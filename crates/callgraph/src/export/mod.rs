//! Export module for re-ingesting and visualizing call trees.
//!
//! Supports two formats:
//! - **JSON**: the ingestion payload shape, loadable into a fresh store
//! - **DOT**: Graphviz visualization

pub mod dot;
pub mod json;

pub use dot::{export_dot, export_dot_styled, DotOptions};
pub use json::{export_json, tree_to_payload};
