//! Payload validation.
//!
//! [`validate`] is a pure function: it inspects the whole payload, never
//! touches a store, and returns a [`ValidationReport`] instead of failing on
//! the first problem. Errors block ingestion; warnings do not.

use crate::graph::{CallGraphPayload, CallsiteId, EntityRef, FunctionId};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Kind of an error-level validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A field constraint does not hold
    SchemaViolation,
    /// Two functions share an id
    DuplicateFunction,
    /// A call names a function id that the payload does not define
    DanglingReference,
    /// Two calls share a callsite id
    DuplicateCallsite,
    /// `direct` and `indirect` are both set or both clear
    InvalidCallFlags,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::SchemaViolation => "SchemaViolation",
            ViolationKind::DuplicateFunction => "DuplicateFunction",
            ViolationKind::DanglingReference => "DanglingReference",
            ViolationKind::DuplicateCallsite => "DuplicateCallsite",
            ViolationKind::InvalidCallFlags => "InvalidCallFlags",
        };
        f.write_str(name)
    }
}

/// Kind of a warning-level validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// Function with no incoming or outgoing calls
    Orphan,
    /// Payload without any functions
    EmptyGraph,
}

/// One error-level finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// What kind of rule was broken
    pub kind: ViolationKind,
    /// The offending entity
    pub entity: EntityRef,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.entity, self.message)
    }
}

/// One warning-level finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// What was noticed
    pub kind: WarningKind,
    /// The entity concerned, if any
    pub entity: Option<EntityRef>,
    /// Human-readable description
    pub message: String,
}

/// Outcome of validating a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    errors: Vec<Violation>,
    warnings: Vec<Warning>,
}

impl ValidationReport {
    /// True when no error-level violation was found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error-level findings, in payload order.
    pub fn errors(&self) -> &[Violation] {
        &self.errors
    }

    /// Warning-level findings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Errors of one kind.
    pub fn errors_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.errors.iter().filter(move |v| v.kind == kind)
    }

    /// Ids of functions flagged as orphans.
    pub fn orphans(&self) -> Vec<&FunctionId> {
        self.warnings
            .iter()
            .filter(|w| w.kind == WarningKind::Orphan)
            .filter_map(|w| match &w.entity {
                Some(EntityRef::Function(id)) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn error(&mut self, kind: ViolationKind, entity: EntityRef, message: impl Into<String>) {
        self.errors.push(Violation {
            kind,
            entity,
            message: message.into(),
        });
    }
}

/// Validate a payload before ingestion.
///
/// Checks, over the whole payload:
/// 1. function ids are non-empty and unique
/// 2. every call endpoint names a payload function (`DanglingReference`)
/// 3. callsite ids are unique when present (`DuplicateCallsite`)
/// 4. field constraints hold (`SchemaViolation`)
/// 5. exactly one of `direct`/`indirect` is set (`InvalidCallFlags`)
///
/// Orphan functions and empty payloads are reported as warnings.
pub fn validate(payload: &CallGraphPayload) -> ValidationReport {
    let mut report = ValidationReport::default();

    if payload.functions.is_empty() {
        report.warnings.push(Warning {
            kind: WarningKind::EmptyGraph,
            entity: None,
            message: "payload contains no functions".to_string(),
        });
    }

    let mut function_ids: HashSet<&FunctionId> = HashSet::with_capacity(payload.functions.len());
    for function in &payload.functions {
        let entity = EntityRef::Function(function.id.clone());
        for problem in function.check() {
            report.error(ViolationKind::SchemaViolation, entity.clone(), problem);
        }
        if !function_ids.insert(&function.id) {
            report.error(
                ViolationKind::DuplicateFunction,
                entity,
                format!("function id '{}' is defined more than once", function.id),
            );
        }
    }

    let mut first_use: HashMap<&CallsiteId, usize> = HashMap::new();
    let mut touched: HashSet<&FunctionId> = HashSet::new();
    for (index, call) in payload.calls.iter().enumerate() {
        let attributes = &call.attributes;
        let entity = EntityRef::Call {
            index,
            caller: call.caller.clone(),
            callee: call.callee.clone(),
            callsite_id: attributes.callsite_id.clone(),
        };
        touched.insert(&call.caller);
        touched.insert(&call.callee);

        for (role, endpoint) in [("caller", &call.caller), ("callee", &call.callee)] {
            if !function_ids.contains(endpoint) {
                report.error(
                    ViolationKind::DanglingReference,
                    entity.clone(),
                    format!("{role} '{endpoint}' is not a known function"),
                );
            }
        }

        if let Some(callsite) = &attributes.callsite_id {
            if let Some(first) = first_use.get(callsite) {
                report.error(
                    ViolationKind::DuplicateCallsite,
                    entity.clone(),
                    format!("callsite '{callsite}' already used by call[{first}]"),
                );
            } else {
                first_use.insert(callsite, index);
            }
        }

        for problem in attributes.check() {
            report.error(ViolationKind::SchemaViolation, entity.clone(), problem);
        }

        if !attributes.flags_consistent() {
            report.error(
                ViolationKind::InvalidCallFlags,
                entity,
                format!(
                    "exactly one of direct/indirect must be set (direct={}, indirect={})",
                    attributes.direct, attributes.indirect
                ),
            );
        }
    }

    for function in &payload.functions {
        if !touched.contains(&function.id) {
            report.warnings.push(Warning {
                kind: WarningKind::Orphan,
                entity: Some(EntityRef::Function(function.id.clone())),
                message: format!("function '{}' has no incoming or outgoing calls", function.name),
            });
        }
    }

    if report.is_valid() {
        info!(
            "Validation passed: {} functions, {} calls, {} warning(s)",
            payload.functions.len(),
            payload.calls.len(),
            report.warnings.len()
        );
    } else {
        warn!(
            "Validation failed: {} error(s), {} warning(s)",
            report.errors.len(),
            report.warnings.len()
        );
    }

    report
}
