use std::path::PathBuf;
use thiserror::Error;

use crate::gitops::BuildError;
use crate::secrets::SecretError;
use crate::store::StoreError;

/// Errors that end a run. Per-object problems never reach this type; they
/// become [`crate::pipeline::Diagnostic`]s instead.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    #[error("GitOps build error: {0}")]
    Build(#[from] BuildError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GeneratorError {
    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Build(_) => 2,
            Self::Store(_) => 3,
            Self::Storage(_) => 4,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid dangerous-content pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Credential error: {0}")]
    Secret(#[from] SecretError),

    #[error("Invalid environment profiles: {0}")]
    Profiles(#[from] BuildError),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to back up '{path}' to '{backup}': {source}")]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to sync directory '{path}': {source}")]
    SyncDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to query free space of '{path}': {source}")]
    DiskSpace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Insufficient disk space at '{path}': {available} bytes available, {required} required")]
    InsufficientDiskSpace {
        path: PathBuf,
        available: u64,
        required: u64,
    },

    #[error("Refusing to write '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: String },
}

impl StorageError {
    /// Errors after which no further writes should be attempted. Only a
    /// rejected artifact path is confined to that one artifact.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidPath { .. })
    }
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
