//! Core call graph types and operations.
//!
//! This module defines the fundamental building blocks:
//! - [`Function`]: Graph nodes representing function definitions
//! - [`CallEdge`]: Directed caller-to-callee relationships
//! - [`CallGraphPayload`]: The portable ingestion/export shape
//! - [`CallGraphStore`]: The typed store over a storage backend

mod payload;
mod store;
mod types;
pub mod algorithms;

pub use algorithms::{CallTree, TreeNode};
pub use payload::{CallGraphPayload, CallRecord};
pub use store::{BatchRejection, CallGraphStore};
pub use types::{
    CallAttributes, CallEdge, CallsiteId, Direction, EdgeId, EntityRef, Function, FunctionId,
    ResolutionMethod, Visibility,
};
