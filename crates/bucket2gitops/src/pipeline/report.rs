use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::gitops::BuildWarning;
use crate::normalizer::NormalizeError;
use crate::store::StoreError;
use crate::validator::ValidationError;

/// What went wrong with one object or resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    SizeExceeded,
    PathTraversal,
    EncodingError,
    DangerousContent,
    StructureLimitExceeded,
    InvalidIdentifier,
    InvalidKey,
    UnsupportedObject,
    ParseError,
    MalformedDocument,
    UnknownKind,
    ResourceLimitExceeded,
    FetchFailed,
    NoResourcesForNamespace,
    StorageFallback,
    WriteRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl DiagnosticKind {
    /// Warnings leave the resource in the output; errors skip it.
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnknownKind
            | DiagnosticKind::NoResourcesForNamespace
            | DiagnosticKind::StorageFallback => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl From<&ValidationError> for DiagnosticKind {
    fn from(error: &ValidationError) -> Self {
        match error {
            ValidationError::SizeExceeded { .. } => DiagnosticKind::SizeExceeded,
            ValidationError::PathTraversal { .. } => DiagnosticKind::PathTraversal,
            ValidationError::EncodingError { .. } => DiagnosticKind::EncodingError,
            ValidationError::DangerousContent { .. } => DiagnosticKind::DangerousContent,
            ValidationError::StructureLimitExceeded { .. } => {
                DiagnosticKind::StructureLimitExceeded
            }
            ValidationError::InvalidIdentifier { .. } => DiagnosticKind::InvalidIdentifier,
        }
    }
}

impl From<&NormalizeError> for DiagnosticKind {
    fn from(error: &NormalizeError) -> Self {
        match error {
            NormalizeError::Parse { .. } | NormalizeError::Serialize { .. } => {
                DiagnosticKind::ParseError
            }
            NormalizeError::NotAMapping | NormalizeError::MalformedDocument { .. } => {
                DiagnosticKind::MalformedDocument
            }
        }
    }
}

/// One recorded finding, tied to the object key it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub key: String,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(key: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }

    pub fn validation(key: &str, error: &ValidationError) -> Self {
        Self::new(key, error.into(), error.to_string())
    }

    pub fn normalize(key: &str, error: &NormalizeError) -> Self {
        Self::new(key, error.into(), error.to_string())
    }

    pub fn fetch(key: &str, error: &StoreError) -> Self {
        Self::new(key, DiagnosticKind::FetchFailed, error.to_string())
    }

    pub fn build(warning: &BuildWarning) -> Self {
        match warning {
            BuildWarning::NoResourcesForNamespace { namespace } => Self::new(
                namespace.as_str(),
                DiagnosticKind::NoResourcesForNamespace,
                format!("namespace '{}' has no usable resources", namespace),
            ),
            BuildWarning::StorageFallback {
                namespace,
                resource,
                reason,
            } => Self::new(
                format!("{}/{}", namespace, resource),
                DiagnosticKind::StorageFallback,
                format!("storage request unusable ({}), default size assumed", reason),
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}: {}", self.kind, self.key, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Success,
    SuccessWithWarnings,
    /// Nothing was found to generate and nothing went wrong.
    NothingToDo,
    /// Objects failed and no namespace was generated.
    Failed,
}

/// Outcome of a run. Fatal errors end the run with an error instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub batches: usize,
    pub objects_listed: usize,
    /// Objects that contributed at least one resource.
    pub objects_processed: usize,
    pub objects_skipped: usize,
    /// Objects that could not be fetched after retries.
    pub objects_failed: usize,
    pub resources: usize,
    pub namespaces: Vec<String>,
    pub files_created: usize,
    pub files_updated: usize,
    pub files_unchanged: usize,
    /// Files created or updated by this run.
    pub written: Vec<PathBuf>,
    pub backups: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn status(&self) -> RunStatus {
        if self.resources == 0 && self.namespaces.is_empty() {
            if self.errors().next().is_some() {
                RunStatus::Failed
            } else {
                RunStatus::NothingToDo
            }
        } else if self.diagnostics.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::SuccessWithWarnings
        }
    }

    pub fn files_written(&self) -> usize {
        self.files_created + self.files_updated
    }

    /// One-line summary of counts.
    pub fn summary(&self) -> String {
        format!(
            "{} objects listed: {} processed, {} skipped, {} failed; {} resources in {} namespaces; \
             files: {} created, {} updated, {} unchanged; {} diagnostics",
            self.objects_listed,
            self.objects_processed,
            self.objects_skipped,
            self.objects_failed,
            self.resources,
            self.namespaces.len(),
            self.files_created,
            self.files_updated,
            self.files_unchanged,
            self.diagnostics.len()
        )
    }
}
