pub mod classifier;
pub mod config;
pub mod error;
pub mod gitops;
pub mod normalizer;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod validator;

pub use classifier::{classify, Classification, ClassificationMethod, ResourceKind};
pub use config::{load_config, Config};
pub use error::{ConfigError, GeneratorError, Result, StorageError};
pub use gitops::{
    ArtifactKind, EnvironmentProfile, GeneratedArtifact, GitOpsStructureBuilder, SyncPolicy,
};
pub use normalizer::{NamespaceBundle, NormalizeError, Normalizer, ParsedResource};
pub use pipeline::{Diagnostic, DiagnosticKind, Generator, RunReport, RunStatus};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::{FileManager, FileManagerSettings, WriteResult};
pub use store::{ObjectStore, ObjectStoreClient, RawObject, StoreError};
pub use telemetry::{init_tracing, LogFormat};
pub use validator::{ValidationError, ValidationLimits, Validator};
