use handling_schema::{Axis, FieldKind, FieldValue};
use thiserror::Error;

/// Which end of a field's range a proposed value fell outside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundViolation {
    pub bound: Bound,
    /// Set for vector fields.
    pub component: Option<Axis>,
}

/// Errors surfaced by edits, merges and preset lookups. None of them leave a
/// value set partially modified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("invalid value for '{field}': expected {expected}, got {found}")]
    InvalidValue {
        field: String,
        expected: FieldKind,
        found: String,
    },
    #[error("value {value} for '{field}' is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: FieldValue,
        min: FieldValue,
        max: FieldValue,
        violated: BoundViolation,
    },
    #[error("corrupt preset ({} issue(s))", .issues.len())]
    CorruptPreset { issues: Vec<PresetIssue> },
    #[error("preset '{0}' already exists")]
    DuplicateName(String),
    #[error("preset '{0}' not found")]
    NotFound(String),
    #[error("preset store rejected '{0}'")]
    Rejected(String),
    #[error("subject is no longer available")]
    SubjectUnavailable,
}

/// Problem with one entry of a preset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PresetIssue {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{0}' is not numeric")]
    NotNumeric(String),
    #[error("field '{field}' expects {expected}, found {found}")]
    KindMismatch {
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },
    #[error("field '{field}' is missing its '{attribute}' attribute")]
    MissingValue {
        field: String,
        attribute: &'static str,
    },
    #[error("field '{field}' has a malformed value: {reason}")]
    MalformedValue { field: String, reason: String },
    #[error("field '{0}' appears more than once")]
    DuplicateEntry(String),
    #[error("field '{field}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: FieldValue,
        min: FieldValue,
        max: FieldValue,
    },
}
