//! # callgraph
//!
//! Ingestion and query engine for static function call graphs.
//!
//! A producer (a compiler plugin, a clang-based parser, anything) emits a JSON
//! payload of functions and calls. callgraph validates it, loads it into a
//! persistent store as one snapshot, and answers structural questions about
//! it: who calls what, how deep a call tree goes, where the hotspots are.
//!
//! ## Core Principles
//!
//! - **Validate Before Write**: a payload with errors never touches the store
//! - **Snapshot Semantics**: a load replaces the whole graph, never patches it
//! - **Explicit Failure**: every lookup returns `Result`, nothing panics on bad ids
//! - **Cycle Safe**: traversals terminate on recursion and report back edges
//!
//! ## Architecture
//!
//! callgraph is organized in layers:
//!
//! ```text
//! Payload (JSON functions + calls)
//!     ↓
//! Validator (pure, report-producing)
//!     ↓
//! Loader (snapshot ingestion)
//!     ↓
//! Call Graph Store (typed functions, call edges, indexes)
//!     ↓
//! Storage Backend (RocksDB, memory)
//! ```
//!
//! The [`QueryEngine`] reads from the store; [`export`] turns its call trees
//! back into payloads or Graphviz DOT.
//!
//! ## Example
//!
//! ```rust
//! use callgraph::{CallAttributes, CallGraphPayload, CallGraphStore, Function, Loader};
//!
//! # fn example() -> callgraph::Result<()> {
//! let payload = CallGraphPayload::new()
//!     .with_function(Function::new("F1", "main"))
//!     .with_function(Function::new("F2", "init"))
//!     .with_function(Function::new("F4", "run"))
//!     .with_call("F1", "F2", CallAttributes::direct())
//!     .with_call("F1", "F4", CallAttributes::indirect(true));
//!
//! let mut store = CallGraphStore::in_memory()?;
//! Loader::default().load(&mut store, &payload)?;
//!
//! let callees = store.query().callees("F1")?;
//! assert_eq!(callees.len(), 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod loader;
pub mod query;
pub mod storage;
pub mod validate;

// Re-export main types
pub use config::{LoaderConfig, QueryConfig};
pub use error::{GraphError, Result};
pub use graph::{
    CallAttributes, CallEdge, CallGraphPayload, CallGraphStore, CallRecord, CallTree, CallsiteId,
    Direction, EdgeId, EntityRef, Function, FunctionId, ResolutionMethod, TreeNode, Visibility,
};
pub use loader::{FanOutEntry, LoadProgress, LoadReport, Loader, RejectedEntity};
pub use query::{DepthLevel, FanStats, FunctionDetail, QueryEngine};
pub use storage::{MemoryBackend, StorageBackend};
#[cfg(feature = "rocksdb-backend")]
pub use storage::RocksDBBackend;
pub use validate::{validate, ValidationReport, Violation, ViolationKind, Warning, WarningKind};
