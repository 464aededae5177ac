//! Error types shared by the scanner, the fix coordinator, and the bundled hosts.

use std::path::PathBuf;
use thiserror::Error;

/// Broad category of an [`InspectError`], used to decide how far a failure
/// propagates: configuration errors abort the scan, process errors settle a
/// fix, per-file errors only drop one file from the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Process,
    PerFile,
}

#[derive(Error, Debug)]
pub enum InspectError {
    #[error(".gitignore not found at {}", path.display())]
    MissingGitignore { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {message}", path.display())]
    ParseConfig { path: PathBuf, message: String },

    #[error("invalid custom error rule: {0}")]
    InvalidCustomRule(#[from] regex::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("script \"{script}\" is not defined in package.json")]
    MissingScript { script: String },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("diagnostics unavailable for {}: {message}", path.display())]
    Diagnostics { path: PathBuf, message: String },

    #[error("editor request failed for {}: {message}", path.display())]
    Editor { path: PathBuf, message: String },
}

impl InspectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InspectError::MissingGitignore { .. }
            | InspectError::ReadConfig { .. }
            | InspectError::ParseConfig { .. }
            | InspectError::InvalidCustomRule(_)
            | InspectError::InvalidConfig(_)
            | InspectError::MissingScript { .. }
            | InspectError::Discovery(_) => ErrorKind::Configuration,
            InspectError::Spawn { .. } => ErrorKind::Process,
            InspectError::Open { .. }
            | InspectError::Diagnostics { .. }
            | InspectError::Editor { .. } => ErrorKind::PerFile,
        }
    }
}

pub type Result<T> = std::result::Result<T, InspectError>;
