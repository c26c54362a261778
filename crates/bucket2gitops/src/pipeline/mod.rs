//! Batch-sequential driver wiring the stages together.
//!
//! One listing batch is fetched (concurrently, bounded by the connection
//! limit), then validated, parsed, classified and normalized on the calling
//! task before the next batch is requested. Building and writing happen once
//! every batch is in.

pub mod ingest;
pub mod progress;
pub mod report;
pub mod runner;

pub use ingest::{list_prefix, parse_key, IngestOutcome, Ingestor, ObjectKey};
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use report::{Diagnostic, DiagnosticKind, RunReport, RunStatus, Severity};
pub use runner::{build_store, Generator};
