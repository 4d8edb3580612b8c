//! Configuration for loading and querying.
//!
//! Plain serde structs with sensible defaults. Embedding applications can
//! deserialize them from their own config files; this crate reads no
//! environment variables.

use serde::{Deserialize, Serialize};

/// Configuration for [`Loader`](crate::Loader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// How many functions to list in the load report's fan-out ranking
    pub top_n: usize,

    /// Replace the previous snapshot in one atomic backend batch.
    ///
    /// When false, each function and call is written individually and a
    /// mid-load failure leaves the already-written prefix in place.
    pub atomic: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            atomic: true,
        }
    }
}

impl LoaderConfig {
    /// Set the size of the fan-out ranking.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Choose between batched and per-entity writes.
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }
}

/// Configuration for [`QueryEngine`](crate::QueryEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Subgraph exports with more nodes than this fail
    pub export_node_limit: usize,

    /// Subgraph exports with more nodes than this log a warning
    pub export_warn_threshold: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            export_node_limit: 100_000,
            export_warn_threshold: 10_000,
        }
    }
}

impl QueryConfig {
    /// Set the hard node limit for subgraph exports.
    pub fn with_export_node_limit(mut self, limit: usize) -> Self {
        self.export_node_limit = limit;
        self
    }
}
