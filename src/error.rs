// ABOUTME: Application-wide error types for stowage.
// ABOUTME: Uses thiserror for ergonomic error handling and maps errors to exit codes.

use crate::backend::{BackendError, BackendKind};
use crate::process::CommandError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("unable to find '{reference}' in the following backends: {searched}")]
    ImageNotFound { reference: String, searched: String },

    #[error("the container '{0}' doesn't exist")]
    ContainerNotFound(String),

    #[error("no images to delete")]
    NoImagesToDelete,

    #[error("unable to associate '{0}' with a storage backend")]
    UnknownBackend(String),

    #[error("the '{0}' backend appears unavailable/inactive")]
    BackendUnavailable(BackendKind),

    #[error("no storage backends are enabled")]
    NoBackends,

    #[error("found '{reference}' in multiple storage backends: {backends}")]
    AmbiguousImage { reference: String, backends: String },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid location {}: {reason}", path.display())]
    InvalidLocation { path: PathBuf, reason: String },

    #[error("user aborted delete operation for {0}")]
    Aborted(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Aborted(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
