//! Error types for Verity.
//!
//! Uses thiserror for structured errors with context. Errors are split by
//! who has to act on them:
//! - [`ConfigurationError`]: the declarations are wrong; detected during
//!   metadata aggregation where possible, otherwise on first use
//! - [`ValidatorFailure`]: a user-supplied validator failed while running
//!
//! Constraint violations are never errors; they are returned as data.

use crate::core::types::{TypeName, TypeRef};
use crate::groups::GroupId;
use crate::metadata::descriptor::ConstraintKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for Verity.
#[derive(Error, Debug)]
pub enum VerityError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validator failure: {0}")]
    Validator(#[from] ValidatorFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Invalid instance document: {0}")]
    Instance(String),
}

/// Errors caused by invalid declarations or requests.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigurationError {
    #[error("At least one group has to be specified")]
    EmptyGroupSet,

    #[error("'{group}' is not a group or group sequence")]
    NotAGroupMarker { group: GroupId },

    #[error("Cyclic dependency in group sequence '{sequence}': {cycle:?}")]
    CyclicSequence { sequence: GroupId, cycle: Vec<GroupId> },

    #[error("Unable to expand group sequence '{sequence}': {reason}")]
    IllegalSequenceComposition { sequence: GroupId, reason: String },

    #[error("Invalid default group sequence for '{type_name}': {reason}")]
    InvalidDefaultGroupSequence { type_name: TypeName, reason: String },

    #[error("No validator could be found for constraint '{constraint}' validating type '{value_type}'")]
    NoValidatorFound {
        constraint: ConstraintKind,
        value_type: TypeRef,
    },

    #[error("Several validators for constraint '{constraint}' match type '{value_type}': {candidates:?}")]
    AmbiguousValidator {
        constraint: ConstraintKind,
        value_type: TypeRef,
        candidates: Vec<String>,
    },

    #[error("Several value extractors match container type '{container_type}': {candidates:?}")]
    AmbiguousValueExtractor {
        container_type: TypeRef,
        candidates: Vec<TypeRef>,
    },

    #[error("Unknown constraint '{constraint}'")]
    UnknownConstraint { constraint: ConstraintKind },

    #[error("Invalid declaration of constraint '{constraint}': {reason}")]
    InvalidConstraintDeclaration {
        constraint: ConstraintKind,
        reason: String,
    },

    #[error("Invalid group conversion on '{location}': {reason}")]
    InvalidGroupConversion { location: String, reason: String },

    #[error("Invalid property path '{path}' for type '{type_name}': {reason}")]
    InvalidPropertyPath {
        type_name: TypeName,
        path: String,
        reason: String,
    },

    #[error("Type '{type_name}' has no constrained method '{method}'")]
    UnknownExecutable { type_name: TypeName, method: String },

    #[error("Method '{method}' expects {expected} arguments, got {actual}")]
    ParameterCountMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("Metadata source '{source_name}' failed: {message}")]
    MetadataSource { source_name: String, message: String },
}

/// A user-supplied validator returned an error instead of a verdict.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("validator '{validator}' for constraint '{constraint}' at '{path}' failed: {message}")]
pub struct ValidatorFailure {
    /// Constraint being evaluated
    pub constraint: ConstraintKind,
    /// Identifier of the failing validator
    pub validator: String,
    /// Rendered path of the validated value
    pub path: String,
    /// Error reported by the validator
    pub message: String,
}

/// Error returned by [`ConstraintValidator::is_valid`](crate::validators::ConstraintValidator::is_valid).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ValidatorError {
    /// Description of the failure
    pub message: String,
}

impl ValidatorError {
    /// Create a validator error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for configuration-level operations.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result type for validation calls.
pub type VerityResult<T> = Result<T, VerityError>;

// ============================================================================
// Error helpers
// ============================================================================

impl ConfigurationError {
    /// Whether the error stems from the request rather than the declarations.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ConfigurationError::EmptyGroupSet
                | ConfigurationError::InvalidPropertyPath { .. }
                | ConfigurationError::UnknownExecutable { .. }
                | ConfigurationError::ParameterCountMismatch { .. }
        )
    }

    /// Get a suggested fix for this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ConfigurationError::EmptyGroupSet => {
                Some("Pass at least one group, or an empty list to use Default".to_string())
            }
            ConfigurationError::NotAGroupMarker { group } => {
                Some(format!("Define '{}' in the group catalog before using it", group))
            }
            ConfigurationError::CyclicSequence { sequence, .. } => Some(format!(
                "Remove the self-reference from sequence '{}'",
                sequence
            )),
            ConfigurationError::InvalidDefaultGroupSequence { type_name, .. } => Some(format!(
                "The default sequence of '{}' must list '{}' and must not list 'Default'",
                type_name, type_name
            )),
            ConfigurationError::NoValidatorFound { constraint, value_type } => Some(format!(
                "Register a validator for '{}' accepting '{}'",
                constraint, value_type
            )),
            ConfigurationError::AmbiguousValidator { value_type, .. } => Some(format!(
                "Register a validator whose accepted type is exactly '{}'",
                value_type
            )),
            ConfigurationError::UnknownConstraint { constraint } => Some(format!(
                "Register a definition for '{}' in the validator registry",
                constraint
            )),
            ConfigurationError::InvalidGroupConversion { .. } => {
                Some("Group conversions require the element to be cascaded".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigurationError::NoValidatorFound {
            constraint: ConstraintKind::new("Size"),
            value_type: TypeRef::named("Long"),
        };
        assert!(err.to_string().contains("'Size'"));
        assert!(err.to_string().contains("'Long'"));
    }

    #[test]
    fn test_suggestions() {
        let err = ConfigurationError::NotAGroupMarker {
            group: GroupId::new("Checks"),
        };
        assert!(err.suggested_fix().unwrap().contains("Checks"));
        assert!(!err.is_request_error());
        assert!(ConfigurationError::EmptyGroupSet.is_request_error());
    }

    #[test]
    fn test_top_level_conversion() {
        let err: VerityError = ConfigurationError::EmptyGroupSet.into();
        assert!(matches!(err, VerityError::Configuration(_)));
    }

    #[test]
    fn test_configuration_error_serializes() {
        let err = ConfigurationError::CyclicSequence {
            sequence: GroupId::new("A"),
            cycle: vec![GroupId::new("A"), GroupId::new("B"), GroupId::new("A")],
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: ConfigurationError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
