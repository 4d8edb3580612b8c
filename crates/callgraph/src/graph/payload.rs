//! The normalized ingestion payload: `{"functions": [...], "calls": [...]}`.
//!
//! Subgraph exports produce the same shape, so a payload can always be fed
//! back into a fresh store.

use super::types::{CallAttributes, CallEdge, Function, FunctionId};
use crate::error::{GraphError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One call relationship as it appears in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Calling function id
    pub caller: FunctionId,
    /// Called function id
    pub callee: FunctionId,
    /// Call-site metadata
    #[serde(default)]
    pub attributes: CallAttributes,
}

impl CallRecord {
    /// Create a record between two function ids.
    pub fn new(
        caller: impl Into<FunctionId>,
        callee: impl Into<FunctionId>,
        attributes: CallAttributes,
    ) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
            attributes,
        }
    }
}

impl From<&CallEdge> for CallRecord {
    fn from(edge: &CallEdge) -> Self {
        Self {
            caller: edge.caller.clone(),
            callee: edge.callee.clone(),
            attributes: edge.attributes.clone(),
        }
    }
}

/// A complete call graph snapshot in portable form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphPayload {
    /// Function records
    #[serde(default)]
    pub functions: Vec<Function>,
    /// Call records
    #[serde(default)]
    pub calls: Vec<CallRecord>,
}

impl CallGraphPayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: append a function.
    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    /// Builder-style: append a call.
    pub fn with_call(
        mut self,
        caller: impl Into<FunctionId>,
        callee: impl Into<FunctionId>,
        attributes: CallAttributes,
    ) -> Self {
        self.calls.push(CallRecord::new(caller, callee, attributes));
        self
    }

    /// Parse a payload from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Serialization`] for malformed JSON, missing
    /// required fields, or unknown enum values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GraphError::serialization("Failed to parse call graph payload", Some(e)))
    }

    /// Parse a payload from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| GraphError::serialization("Failed to parse call graph payload", Some(e)))
    }

    /// Read and parse a payload file.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::FileNotFound`] if the path does not exist and
    /// [`GraphError::Serialization`] if the contents are not a valid payload.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GraphError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path).map_err(|e| {
            GraphError::storage(format!("Failed to read payload file {path:?}"), Some(e))
        })?;
        let payload = Self::from_json_slice(&bytes)?;
        info!(
            "Read payload from {path:?}: {} functions, {} calls",
            payload.functions.len(),
            payload.calls.len()
        );
        Ok(payload)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            GraphError::serialization("Failed to serialize call graph payload", Some(e))
        })
    }

    /// Write the payload as pretty-printed JSON, creating parent directories.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphError::storage(format!("Failed to create directory {parent:?}"), Some(e))
            })?;
        }
        let json = self.to_json_pretty()?;
        std::fs::write(path, json).map_err(|e| {
            GraphError::storage(format!("Failed to write payload to {path:?}"), Some(e))
        })?;
        debug!("Wrote payload to {path:?}");
        Ok(())
    }

    /// True when the payload holds no functions and no calls.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.calls.is_empty()
    }
}
