//! Errors raised while synthesizing the output tree.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid environment profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("No environment profiles configured")]
    NoProfiles,

    #[error("Duplicate environment profile '{0}'")]
    DuplicateProfile(String),

    #[error("Repository URL must not be empty")]
    MissingRepository,

    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: String, message: String },
}

impl BuildError {
    pub(crate) fn serialize(what: impl Into<String>, error: impl std::fmt::Display) -> Self {
        BuildError::Serialize {
            what: what.into(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
