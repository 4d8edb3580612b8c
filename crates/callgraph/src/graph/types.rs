//! Core call graph types: identifiers, enums, functions, and call edges.
//!
//! Each entity type exposes a single `check` method that returns the field
//! constraints it violates. The validator builds its report from these.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a call edge (monotonic counter assigned by the store).
pub type EdgeId = u64;

/// Stable identifier of a function, as supplied by the ingestion payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(String);

impl FunctionId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FunctionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for FunctionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FunctionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a single call site. Unique within a store when present.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallsiteId(String);

impl CallsiteId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallsiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallsiteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for CallsiteId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Declared visibility of a function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Externally visible symbol
    #[default]
    Public,
    /// Not visible outside its defining unit
    Private,
    /// File-local (C `static`)
    Static,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
            Visibility::Static => write!(f, "static"),
        }
    }
}

/// How the call target was resolved by the producer of the call graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMethod {
    /// Resolved from source/IR without running the program
    #[default]
    Static,
    /// Observed at runtime
    Dynamic,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMethod::Static => write!(f, "static"),
            ResolutionMethod::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Direction for edge enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Follow outgoing edges (callees)
    Outgoing,
    /// Follow incoming edges (callers)
    Incoming,
}

/// A function node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Unique, stable identifier
    pub id: FunctionId,
    /// Source-level name (not unique)
    pub name: String,
    /// Linker-level name, when the producer knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mangled_name: Option<String>,
    /// Source file of the definition
    #[serde(default)]
    pub file: String,
    /// Line of the definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    /// Declared return type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Parameter types in declaration order
    #[serde(default)]
    pub params: Vec<String>,
    /// Declared visibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Whether the function is declared static
    #[serde(default)]
    pub is_static: bool,
    /// Source language tag (e.g. "c", "cpp")
    #[serde(default)]
    pub language: String,
    /// Advisory fan-in from the producer; never trusted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_in: Option<u64>,
    /// Advisory fan-out from the producer; never trusted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_out: Option<u64>,
}

impl Function {
    /// Create a function with the given id and name and default attributes.
    pub fn new(id: impl Into<FunctionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mangled_name: None,
            file: String::new(),
            line: None,
            return_type: None,
            params: Vec::new(),
            visibility: Visibility::default(),
            is_static: false,
            language: String::new(),
            fan_in: None,
            fan_out: None,
        }
    }

    /// Set the definition location.
    pub fn at(mut self, file: impl Into<String>, line: i64) -> Self {
        self.file = file.into();
        self.line = Some(line);
        self
    }

    /// Set the source language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the parameter types.
    pub fn with_params<S: Into<String>>(mut self, params: impl IntoIterator<Item = S>) -> Self {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Set the declared visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Field constraints this function violates (empty when valid).
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.id.as_str().trim().is_empty() {
            problems.push("function id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            problems.push("function name must not be empty".to_string());
        }
        if let Some(line) = self.line {
            if line < 0 {
                problems.push(format!("line must be non-negative, got {line}"));
            }
        }
        if let Some(position) = self.params.iter().position(|p| p.trim().is_empty()) {
            problems.push(format!("parameter {position} has an empty type"));
        }
        problems
    }
}

fn default_direct() -> bool {
    true
}

/// Call-site metadata attached to a call edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAttributes {
    /// Call through a named symbol
    #[serde(default = "default_direct")]
    pub direct: bool,
    /// Call through a pointer, vtable, or similar
    #[serde(default)]
    pub indirect: bool,
    /// Indirect call through a function pointer
    #[serde(default)]
    pub via_function_pointer: bool,
    /// How the callee was resolved
    #[serde(default)]
    pub resolution_method: ResolutionMethod,
    /// File containing the call site
    #[serde(default)]
    pub file: String,
    /// Line of the call site
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    /// Producer's depth hint; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
    /// Unique call-site identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsite_id: Option<CallsiteId>,
}

impl Default for CallAttributes {
    fn default() -> Self {
        Self {
            direct: true,
            indirect: false,
            via_function_pointer: false,
            resolution_method: ResolutionMethod::default(),
            file: String::new(),
            line: None,
            depth: None,
            callsite_id: None,
        }
    }
}

impl CallAttributes {
    /// Attributes for a direct, statically resolved call.
    pub fn direct() -> Self {
        Self::default()
    }

    /// Attributes for an indirect call, optionally through a function pointer.
    pub fn indirect(via_function_pointer: bool) -> Self {
        Self {
            direct: false,
            indirect: true,
            via_function_pointer,
            ..Self::default()
        }
    }

    /// Set the call-site location.
    pub fn at(mut self, file: impl Into<String>, line: i64) -> Self {
        self.file = file.into();
        self.line = Some(line);
        self
    }

    /// Set the call-site identifier.
    pub fn with_callsite(mut self, callsite_id: impl Into<String>) -> Self {
        self.callsite_id = Some(CallsiteId::new(callsite_id));
        self
    }

    /// Set the resolution method.
    pub fn resolved(mut self, method: ResolutionMethod) -> Self {
        self.resolution_method = method;
        self
    }

    /// True when exactly one of `direct`/`indirect` is set.
    pub fn flags_consistent(&self) -> bool {
        self.direct != self.indirect
    }

    /// Field constraints these attributes violate (empty when valid).
    ///
    /// The direct/indirect exclusivity rule is checked separately through
    /// [`CallAttributes::flags_consistent`] because it has its own violation kind.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.via_function_pointer && !self.indirect {
            problems.push("via_function_pointer requires an indirect call".to_string());
        }
        if let Some(line) = self.line {
            if line < 0 {
                problems.push(format!("line must be non-negative, got {line}"));
            }
        }
        if let Some(depth) = self.depth {
            if depth < 0 {
                problems.push(format!("depth hint must be non-negative, got {depth}"));
            }
        }
        if let Some(callsite) = &self.callsite_id {
            if callsite.as_str().trim().is_empty() {
                problems.push("callsite_id must not be empty when present".to_string());
            }
        }
        problems
    }
}

/// Reference to one entity of a payload, used in validation and load reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// A function record, by id
    Function(FunctionId),
    /// A call record, by position in the payload's `calls` list
    Call {
        /// Index into `calls`
        index: usize,
        /// Calling function id
        caller: FunctionId,
        /// Called function id
        callee: FunctionId,
        /// Callsite id, when the record has one
        callsite_id: Option<CallsiteId>,
    },
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Function(id) => write!(f, "function {id}"),
            EntityRef::Call {
                index,
                caller,
                callee,
                callsite_id: Some(callsite),
            } => write!(f, "call[{index}] {caller} -> {callee} ({callsite})"),
            EntityRef::Call {
                index,
                caller,
                callee,
                callsite_id: None,
            } => write!(f, "call[{index}] {caller} -> {callee}"),
        }
    }
}

/// A committed call edge between two stored functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    /// Unique identifier (assigned by the store)
    pub id: EdgeId,
    /// Calling function
    pub caller: FunctionId,
    /// Called function
    pub callee: FunctionId,
    /// Call-site metadata
    pub attributes: CallAttributes,
}

impl CallEdge {
    /// Create a new edge (ID will be assigned by the store).
    pub fn new(
        id: EdgeId,
        caller: FunctionId,
        callee: FunctionId,
        attributes: CallAttributes,
    ) -> Self {
        Self {
            id,
            caller,
            callee,
            attributes,
        }
    }

    /// True when the edge calls its own caller.
    pub fn is_self_loop(&self) -> bool {
        self.caller == self.callee
    }

    /// The endpoint on the far side when walking in `direction`.
    pub fn endpoint(&self, direction: Direction) -> &FunctionId {
        match direction {
            Direction::Outgoing => &self.callee,
            Direction::Incoming => &self.caller,
        }
    }
}
