// ABOUTME: Normalized image and container descriptors shared by all backends.
// ABOUTME: Built fresh from live queries; they name their backend instead of owning it.

use super::kind::BackendKind;
use crate::types::{ContainerId, ImageId};
use std::path::PathBuf;

/// Repository tag engines report for untagged images.
pub const NONE_TAG: &str = "<none>";

/// An image as reported by one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: ImageId,
    /// Human-readable references, most relevant first. May be empty.
    pub repo_tags: Vec<String>,
    /// Untagged and not referenced by any tagged image.
    pub dangling: bool,
    pub backend: BackendKind,
    /// The reference the caller supplied, or the ID for listed images.
    pub input_name: String,
    /// Set by workflows when a live container runs this image.
    pub used: bool,
}

impl ImageRecord {
    pub fn new(id: ImageId, backend: BackendKind) -> Self {
        let input_name = id.to_string();
        Self {
            id,
            repo_tags: Vec::new(),
            dangling: false,
            backend,
            input_name,
            used: false,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.repo_tags = tags;
        self
    }

    pub fn with_dangling(mut self, dangling: bool) -> Self {
        self.dangling = dangling;
        self
    }

    pub fn with_input_name(mut self, input_name: impl Into<String>) -> Self {
        self.input_name = input_name.into();
        self
    }

    /// First repository tag, unless it is the `<none>` placeholder.
    pub fn name(&self) -> Option<&str> {
        self.repo_tags
            .first()
            .map(String::as_str)
            .filter(|tag| !tag.contains(NONE_TAG))
    }

    /// Name shown in tables: the first tag, else the short ID.
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or_else(|| self.id.short())
    }

    /// An untagged layer that tagged images still build on.
    pub fn is_unnamed_layer(&self) -> bool {
        self.name().is_none() && !self.dangling
    }
}

/// A container as reported by one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub name: String,
    /// ID of the image the container runs.
    pub image: ImageId,
    pub backend: BackendKind,
    /// On-disk checkout, for system containers.
    pub checkout: Option<PathBuf>,
    /// OCI runtime recorded at install time, for system containers.
    pub runtime: Option<String>,
}

impl ContainerRecord {
    pub fn new(id: ContainerId, image: ImageId, backend: BackendKind) -> Self {
        Self {
            name: id.to_string(),
            id,
            image,
            backend,
            checkout: None,
            runtime: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "7968321274dc6b6171697c33df7815310468e694ac5be0ec03ff053bb135e768";

    #[test]
    fn display_name_prefers_tag() {
        let img = ImageRecord::new(ImageId::new(ID), BackendKind::Docker)
            .with_tags(vec!["docker.io/busybox:latest".to_string()]);
        assert_eq!(img.display_name(), "docker.io/busybox:latest");
    }

    #[test]
    fn none_tag_falls_back_to_short_id() {
        let img = ImageRecord::new(ImageId::new(format!("sha256:{ID}")), BackendKind::Docker)
            .with_tags(vec!["<none>:<none>".to_string()]);
        assert_eq!(img.display_name(), "7968321274dc");
        assert!(img.is_unnamed_layer());
    }

    #[test]
    fn dangling_images_are_not_unnamed_layers() {
        let img = ImageRecord::new(ImageId::new(ID), BackendKind::Ostree).with_dangling(true);
        assert!(!img.is_unnamed_layer());
    }

    #[test]
    fn listed_images_use_id_as_input_name() {
        let img = ImageRecord::new(ImageId::new(ID), BackendKind::Docker);
        assert_eq!(img.input_name, ID);
    }
}
