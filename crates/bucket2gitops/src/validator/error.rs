//! Validation error types.

use thiserror::Error;

/// Which structural bound a document exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureLimit {
    Depth(usize),
    CollectionLength(usize),
    StringLength(usize),
}

impl std::fmt::Display for StructureLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureLimit::Depth(max) => write!(f, "nesting depth exceeds {}", max),
            StructureLimit::CollectionLength(max) => {
                write!(f, "collection length exceeds {}", max)
            }
            StructureLimit::StringLength(max) => write!(f, "string length exceeds {}", max),
        }
    }
}

/// Identifier fields checked against RFC 1123 label rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierField {
    Namespace,
    ResourceName,
    Environment,
}

impl std::fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierField::Namespace => write!(f, "namespace"),
            IdentifierField::ResourceName => write!(f, "resource name"),
            IdentifierField::Environment => write!(f, "environment name"),
        }
    }
}

/// Errors raised by the validator. Every variant is recoverable per object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Object is {size} bytes, exceeding the {limit} byte limit")]
    SizeExceeded { size: usize, limit: usize },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Object is not valid UTF-8: {message}")]
    EncodingError { message: String },

    #[error("Dangerous content matched rule '{rule}'")]
    DangerousContent { rule: String },

    #[error("Document {limit} at '{path}'")]
    StructureLimitExceeded { path: String, limit: StructureLimit },

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidIdentifier {
        field: IdentifierField,
        value: String,
        reason: String,
    },
}

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
