//! Error types for the template registry, validator and record store

use std::fmt;

use thiserror::Error;

/// Result type for registry and store operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry, store and loading errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Template already exists: {0}")]
    DuplicateTemplateId(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid template {id}: {reason}")]
    InvalidTemplate { id: String, reason: String },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model {model} collects {expected} records, not {actual}")]
    TemplateMismatch {
        model: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown record {record} in model {model}")]
    UnknownRecord { model: String, record: String },

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("State lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    pub(crate) fn invalid_template(id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// What went wrong with a single field (or the record as a whole)
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    UnknownTemplate,
    TypeMismatch { expected: &'static str },
    PatternMismatch { pattern: String },
    NotInVocabulary { options: Vec<String> },
    MissingRequired,
    MissingMandatory,
    OutOfBounds { limit: f64 },
    CoordinatePairIncomplete,
    ZeroZeroCoordinate,
    UnknownField,
}

/// A single field-qualified validation message
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub field: Option<String>,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn field(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: Some(field.into()),
            kind,
        }
    }

    pub fn unknown_template() -> Self {
        Self {
            field: None,
            kind: ViolationKind::UnknownTemplate,
        }
    }

    /// True when this violation is reported against `key`
    pub fn is_for(&self, key: &str) -> bool {
        self.field.as_deref() == Some(key)
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::UnknownTemplate => write!(f, "Unknown template"),
            ViolationKind::TypeMismatch { expected } => write!(f, "expected {}", expected),
            ViolationKind::PatternMismatch { pattern } => {
                write!(f, "does not match pattern {}", pattern)
            }
            ViolationKind::NotInVocabulary { options } => {
                write!(f, "must be one of [{}]", options.join(", "))
            }
            ViolationKind::MissingRequired => write!(f, "required field is missing"),
            ViolationKind::MissingMandatory => write!(f, "mandatory field is missing or empty"),
            ViolationKind::OutOfBounds { limit } => {
                write!(f, "out of bounds (must be between -{} and {})", limit, limit)
            }
            ViolationKind::CoordinatePairIncomplete => {
                write!(f, "latitude and longitude must be supplied together")
            }
            ViolationKind::ZeroZeroCoordinate => {
                write!(f, "(0, 0) is not accepted as a real location")
            }
            ViolationKind::UnknownField => write!(f, "field is not defined by the template"),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A rejected record: the ordered violations of the first failing stage
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Validation failed: {}", summary(.violations))]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Human-readable messages, one per violation
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    /// Whether any violation of `kind`'s variant is reported against `key`
    pub fn has(&self, key: &str, kind: &ViolationKind) -> bool {
        self.violations
            .iter()
            .any(|v| v.is_for(key) && std::mem::discriminant(&v.kind) == std::mem::discriminant(kind))
    }
}

fn summary(violations: &[Violation]) -> String {
    match violations.len() {
        1 => "1 error".to_string(),
        n => format!("{} errors", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages_are_field_qualified() {
        let v = Violation::field("latitude", ViolationKind::MissingMandatory);
        assert_eq!(v.to_string(), "latitude: mandatory field is missing or empty");
        assert_eq!(Violation::unknown_template().to_string(), "Unknown template");
    }

    #[test]
    fn test_failure_summary() {
        let failure = ValidationFailure::new(vec![
            Violation::field("a", ViolationKind::MissingRequired),
            Violation::field("b", ViolationKind::MissingRequired),
        ]);
        assert_eq!(failure.to_string(), "Validation failed: 2 errors");
        assert!(failure.has("b", &ViolationKind::MissingRequired));
        assert!(!failure.has("b", &ViolationKind::MissingMandatory));
    }
}
