// ABOUTME: Docker-compatible engine backend built on bollard.
// ABOUTME: Works against Docker or Podman's Docker API socket.

use super::detection::detect_engine_socket;
use super::kind::BackendKind;
use super::ops::{Backend, BackendError, PruneReport};
use super::record::{ContainerRecord, ImageRecord};
use super::sealed::Sealed;
use crate::config::DockerConfig;
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptions, ListImagesOptions, PruneImagesOptions,
    RemoveImageOptions,
};
use std::collections::{HashMap, HashSet};

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_image_remove_error(e: bollard::errors::Error, image_name: &str) -> BackendError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            BackendError::ImageNotFound(image_name.to_string())
        }
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => BackendError::Conflict(message.clone()),
        _ => BackendError::Runtime(format!("failed to remove {}: {}", image_name, e)),
    }
}

fn map_list_error(e: bollard::errors::Error, what: &str) -> BackendError {
    BackendError::Runtime(format!("failed to list {}: {}", what, e))
}

fn is_not_found(e: &bollard::errors::Error) -> bool {
    matches!(
        e,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn dangling_filter() -> HashMap<String, Vec<String>> {
    HashMap::from([("dangling".to_string(), vec!["true".to_string()])])
}

// =============================================================================
// DockerBackend
// =============================================================================

/// Backend for images and containers managed by a Docker-API engine.
pub struct DockerBackend {
    client: Option<Docker>,
}

impl DockerBackend {
    /// Wrap an already-connected client.
    pub fn new(client: Docker) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// A backend with no engine behind it; always unavailable.
    pub fn disconnected() -> Self {
        Self { client: None }
    }

    /// Connect to the detected (or configured) engine socket.
    ///
    /// Failing to find or open a socket yields a disconnected backend rather than
    /// an error, so the other backends stay usable.
    pub fn connect(config: &DockerConfig) -> Self {
        let Some(socket) = detect_engine_socket(config) else {
            tracing::debug!("no Docker-compatible engine socket found");
            return Self::disconnected();
        };

        match Docker::connect_with_unix(
            &socket.path,
            config.timeout.as_secs(),
            bollard::API_DEFAULT_VERSION,
        ) {
            Ok(client) => {
                tracing::debug!(socket = %socket.path, podman = socket.podman, "engine socket");
                Self::new(client)
            }
            Err(e) => {
                tracing::warn!("cannot open engine socket {}: {}", socket.path, e);
                Self::disconnected()
            }
        }
    }

    fn client(&self) -> Result<&Docker, BackendError> {
        self.client
            .as_ref()
            .ok_or_else(|| BackendError::Unavailable("no engine socket".to_string()))
    }

    /// IDs of untagged images no tagged image builds on.
    async fn dangling_ids(&self) -> Result<HashSet<ImageId>, BackendError> {
        let opts = ListImagesOptions {
            filters: Some(dangling_filter()),
            ..Default::default()
        };
        let images = self
            .client()?
            .list_images(Some(opts))
            .await
            .map_err(|e| map_list_error(e, "dangling images"))?;
        Ok(images.into_iter().map(|i| ImageId::new(i.id)).collect())
    }
}

impl Sealed for DockerBackend {}

#[async_trait]
impl Backend for DockerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Docker
    }

    async fn is_available(&self) -> bool {
        match self.client {
            Some(ref client) => match client.ping().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("engine ping failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageRecord>, BackendError> {
        let dangling = self.dangling_ids().await?;
        let opts = ListImagesOptions {
            all,
            ..Default::default()
        };
        let images = self
            .client()?
            .list_images(Some(opts))
            .await
            .map_err(|e| map_list_error(e, "images"))?;

        Ok(images
            .into_iter()
            .map(|summary| {
                let id = ImageId::new(summary.id);
                let is_dangling = dangling.contains(&id);
                ImageRecord::new(id, BackendKind::Docker)
                    .with_tags(summary.repo_tags)
                    .with_dangling(is_dangling)
            })
            .collect())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, BackendError> {
        let opts = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let containers = self
            .client()?
            .list_containers(Some(opts))
            .await
            .map_err(|e| map_list_error(e, "containers"))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let mut record = ContainerRecord::new(
                    ContainerId::new(c.id.unwrap_or_default()),
                    ImageId::new(c.image_id.unwrap_or_default()),
                    BackendKind::Docker,
                );
                if let Some(name) = c.names.unwrap_or_default().first() {
                    record.name = name.trim_start_matches('/').to_string();
                }
                record
            })
            .collect())
    }

    async fn find_image(&self, reference: &str) -> Result<Option<ImageRecord>, BackendError> {
        let details = match self.client()?.inspect_image(reference).await {
            Ok(details) => details,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(BackendError::Runtime(format!(
                    "failed to inspect {}: {}",
                    reference, e
                )));
            }
        };

        let id = ImageId::new(details.id.unwrap_or_default());
        let dangling = self.dangling_ids().await?.contains(&id);
        Ok(Some(
            ImageRecord::new(id, BackendKind::Docker)
                .with_tags(details.repo_tags.unwrap_or_default())
                .with_dangling(dangling)
                .with_input_name(reference),
        ))
    }

    async fn find_container(&self, name: &str) -> Result<Option<ContainerRecord>, BackendError> {
        let details = match self
            .client()?
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => details,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(BackendError::Runtime(format!(
                    "failed to inspect {}: {}",
                    name, e
                )));
            }
        };

        let mut record = ContainerRecord::new(
            ContainerId::new(details.id.unwrap_or_default()),
            ImageId::new(details.image.unwrap_or_default()),
            BackendKind::Docker,
        );
        if let Some(container_name) = details.name {
            record.name = container_name.trim_start_matches('/').to_string();
        }
        Ok(Some(record))
    }

    async fn delete_image(&self, reference: &str, force: bool) -> Result<(), BackendError> {
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client()?
            .remove_image(reference, Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, reference))?;

        tracing::info!("removed image {}", reference);
        Ok(())
    }

    async fn prune(&self) -> Result<PruneReport, BackendError> {
        let opts = PruneImagesOptions {
            filters: Some(dangling_filter()),
            ..Default::default()
        };
        let response = self
            .client()?
            .prune_images(Some(opts))
            .await
            .map_err(|e| BackendError::Runtime(format!("failed to prune images: {}", e)))?;

        let removed = response
            .images_deleted
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| item.deleted.or(item.untagged))
            .collect();

        Ok(PruneReport {
            removed,
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_backend_is_unavailable() {
        let backend = DockerBackend::disconnected();
        assert!(!backend.is_available().await);
        assert!(matches!(
            backend.list_images(false).await,
            Err(BackendError::Unavailable(_))
        ));
    }

    #[test]
    fn not_found_maps_to_image_not_found() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such image".to_string(),
        };
        assert!(matches!(
            map_image_remove_error(err, "busybox"),
            BackendError::ImageNotFound(ref name) if name == "busybox"
        ));
    }

    #[test]
    fn conflict_keeps_engine_message() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: "image is being used by running container".to_string(),
        };
        assert!(matches!(
            map_image_remove_error(err, "busybox"),
            BackendError::Conflict(ref msg) if msg.contains("running container")
        ));
    }
}
