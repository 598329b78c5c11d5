// ABOUTME: In-memory backend used by workflow and registry unit tests.
// ABOUTME: Records deletions and prunes through a shared probe handle.

use super::kind::BackendKind;
use super::ops::{Backend, BackendError, PruneReport};
use super::record::{ContainerRecord, ImageRecord};
use super::sealed::Sealed;
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Read side of a [`FakeBackend`] that stays usable after the backend moves
/// into a registry.
#[derive(Clone, Default)]
pub(crate) struct FakeProbe {
    deleted: Arc<Mutex<Vec<(String, bool)>>>,
    prunes: Arc<Mutex<usize>>,
}

impl FakeProbe {
    /// Every `(reference, force)` passed to `delete_image`, in order.
    pub fn deleted(&self) -> Vec<(String, bool)> {
        self.deleted.lock().clone()
    }

    pub fn prune_count(&self) -> usize {
        *self.prunes.lock()
    }
}

/// Serves fixed images and containers and records every mutation.
pub(crate) struct FakeBackend {
    kind: BackendKind,
    available: bool,
    images: Vec<ImageRecord>,
    containers: Vec<ContainerRecord>,
    failing: HashSet<String>,
    probe: FakeProbe,
}

impl FakeBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            available: true,
            images: Vec::new(),
            containers: Vec::new(),
            failing: HashSet::new(),
            probe: FakeProbe::default(),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Add an image with one tag, or untagged when `tag` is `None`.
    pub fn image(mut self, id: &str, tag: Option<&str>, dangling: bool) -> Self {
        let tags = tag.map(|t| vec![t.to_string()]).unwrap_or_default();
        self.images.push(
            ImageRecord::new(ImageId::new(id), self.kind)
                .with_tags(tags)
                .with_dangling(dangling),
        );
        self
    }

    pub fn container(mut self, id: &str, image: &str) -> Self {
        self.containers
            .push(ContainerRecord::new(ContainerId::new(id), ImageId::new(image), self.kind));
        self
    }

    /// Add an installed system container with an on-disk checkout.
    pub fn system_container(
        mut self,
        name: &str,
        image: &str,
        checkout: &std::path::Path,
        runtime: Option<&str>,
    ) -> Self {
        let mut record =
            ContainerRecord::new(ContainerId::new(name), ImageId::new(image), self.kind);
        record.checkout = Some(checkout.to_path_buf());
        record.runtime = runtime.map(str::to_string);
        self.containers.push(record);
        self
    }

    /// Make deleting `reference` fail with a conflict.
    pub fn failing_delete(mut self, reference: &str) -> Self {
        self.failing.insert(reference.to_string());
        self
    }

    pub fn probe(&self) -> FakeProbe {
        self.probe.clone()
    }

    fn lookup(&self, reference: &str) -> Option<&ImageRecord> {
        self.images.iter().find(|img| {
            img.id.starts_with(reference)
                || img
                    .repo_tags
                    .iter()
                    .any(|t| t == reference || t.strip_suffix(":latest") == Some(reference))
        })
    }
}

impl Sealed for FakeBackend {}

#[async_trait]
impl Backend for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageRecord>, BackendError> {
        Ok(self
            .images
            .iter()
            .filter(|img| all || img.name().is_some() || img.dangling)
            .cloned()
            .collect())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, BackendError> {
        Ok(self.containers.clone())
    }

    async fn find_image(&self, reference: &str) -> Result<Option<ImageRecord>, BackendError> {
        Ok(self
            .lookup(reference)
            .cloned()
            .map(|img| img.with_input_name(reference)))
    }

    async fn find_container(&self, name: &str) -> Result<Option<ContainerRecord>, BackendError> {
        Ok(self
            .containers
            .iter()
            .find(|c| c.name == name || c.id.starts_with(name))
            .cloned())
    }

    async fn delete_image(&self, reference: &str, force: bool) -> Result<(), BackendError> {
        self.probe.deleted.lock().push((reference.to_string(), force));
        if self.failing.contains(reference) {
            return Err(BackendError::Conflict(format!("{} is in use", reference)));
        }
        Ok(())
    }

    async fn prune(&self) -> Result<PruneReport, BackendError> {
        *self.probe.prunes.lock() += 1;
        Ok(PruneReport {
            removed: vec![format!("{}-dangling", self.kind)],
            warnings: Vec::new(),
        })
    }
}
