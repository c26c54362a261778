//! GitOps tree synthesis.
//!
//! For every namespace and environment profile the builder emits an overlay
//! (scaled manifests plus a kustomization), an Argo CD Application pointing
//! at it, and a README per namespace. Nothing here touches the filesystem;
//! artifacts are handed to [`crate::storage::FileManager`].

pub mod builder;
pub mod error;
pub mod manifests;
pub mod profile;
pub mod quantity;
pub mod readme;

use std::path::PathBuf;

pub use builder::{BuildOutput, BuildWarning, GitOpsStructureBuilder, DEFAULT_STORAGE};
pub use error::BuildError;
pub use manifests::{Application, Kustomization, SourceRepository};
pub use profile::{EnvironmentProfile, SyncPolicy, DEFAULT_CLUSTER_ENDPOINT};
pub use quantity::Quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Manifest,
    Kustomization,
    Application,
    Readme,
}

/// A file to be written, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub relative_path: PathBuf,
    pub content: Vec<u8>,
    pub kind: ArtifactKind,
}
