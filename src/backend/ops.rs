// ABOUTME: Capability trait every storage backend implements.
// ABOUTME: Image/container queries, image deletion and pruning.

use super::kind::BackendKind;
use super::record::{ContainerRecord, ImageRecord};
use super::sealed::Sealed;
use crate::process::CommandError;
use async_trait::async_trait;

/// Uniform query and mutation surface over one storage engine.
///
/// Every call hits live engine state; implementations keep no caches.
#[async_trait]
pub trait Backend: Sealed + Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether the engine can currently be reached.
    async fn is_available(&self) -> bool;

    /// List images. `all` includes untagged intermediate layers.
    async fn list_images(&self, all: bool) -> Result<Vec<ImageRecord>, BackendError>;

    /// List containers, running or not.
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, BackendError>;

    /// Look up an image by name, tag, or ID prefix.
    async fn find_image(&self, reference: &str) -> Result<Option<ImageRecord>, BackendError>;

    /// Look up a container by name or ID.
    async fn find_container(&self, name: &str) -> Result<Option<ContainerRecord>, BackendError>;

    /// Delete an image by the reference the caller used to find it.
    async fn delete_image(&self, reference: &str, force: bool) -> Result<(), BackendError>;

    /// Remove every dangling image this backend owns.
    async fn prune(&self) -> Result<PruneReport, BackendError>;
}

/// What a prune pass removed, plus non-fatal problems.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub removed: Vec<String>,
    pub warnings: Vec<String>,
}

/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("image reference {reference} matches several images: {ids}")]
    AmbiguousImage { reference: String, ids: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed engine data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}
