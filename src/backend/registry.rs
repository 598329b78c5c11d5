// ABOUTME: Fixed, ordered set of storage backends for one invocation.
// ABOUTME: Resolves backend names, image references and container names to a backend.

use super::docker::DockerBackend;
use super::kind::BackendKind;
use super::ops::Backend;
use super::ostree::OstreeBackend;
use super::record::{ContainerRecord, ImageRecord};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::CommandRunner;
use crate::types::{ContainerId, ImageId};
use std::fmt::Write as _;
use std::sync::Arc;

/// Owns every backend for the lifetime of one command.
///
/// Backends are held in priority order. Nothing is cached: each query goes to
/// the engines again, so records always reflect live state.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
    default: BackendKind,
}

impl BackendRegistry {
    /// Build a registry from backends given in priority order.
    pub fn new(backends: Vec<Box<dyn Backend>>, default: BackendKind) -> Self {
        Self { backends, default }
    }

    /// Docker-compatible engine first, then OSTree.
    pub fn from_config(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        let backends: Vec<Box<dyn Backend>> = vec![
            Box::new(DockerBackend::connect(&config.docker)),
            Box::new(OstreeBackend::from_config(config, runner)),
        ];
        Self::new(backends, config.default_storage)
    }

    pub fn default_kind(&self) -> BackendKind {
        self.default
    }

    /// Every known backend in priority order, reachable or not.
    pub fn backends(&self) -> impl Iterator<Item = &dyn Backend> {
        self.backends.iter().map(|b| b.as_ref())
    }

    /// The backend of a given kind, whether or not it is reachable.
    pub fn get(&self, kind: BackendKind) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .map(|b| b.as_ref())
    }

    /// Reachable backends in priority order.
    pub async fn available(&self) -> Result<Vec<&dyn Backend>> {
        let mut available = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            if backend.is_available().await {
                available.push(backend.as_ref());
            } else {
                tracing::debug!(backend = %backend.kind(), "backend unavailable");
            }
        }
        if available.is_empty() {
            return Err(Error::NoBackends);
        }
        Ok(available)
    }

    /// The named backend, or the configured default when no name is given.
    pub async fn resolve_backend(&self, name: Option<&str>) -> Result<&dyn Backend> {
        let kind = match name {
            Some(name) => name.parse()?,
            None => self.default,
        };
        self.active(kind).await
    }

    async fn active(&self, kind: BackendKind) -> Result<&dyn Backend> {
        let backend = self
            .get(kind)
            .ok_or_else(|| Error::UnknownBackend(kind.to_string()))?;
        if !backend.is_available().await {
            return Err(Error::BackendUnavailable(kind));
        }
        Ok(backend)
    }

    /// Find the one backend that holds `reference`.
    ///
    /// A `preferred` backend is searched first. With `required`, only that
    /// backend is searched. Otherwise every other reachable backend is searched
    /// too, and the reference must match in exactly one of them.
    pub async fn resolve_image(
        &self,
        reference: &str,
        preferred: Option<BackendKind>,
        required: bool,
    ) -> Result<ImageRecord> {
        let mut searched = Vec::new();
        if let Some(kind) = preferred {
            match self.active(kind).await {
                Ok(backend) => {
                    if let Some(image) = backend.find_image(reference).await? {
                        return Ok(image);
                    }
                    searched.push(kind);
                }
                Err(e) if required => return Err(e),
                Err(_) => {}
            }
            if required {
                return Err(not_found(reference, &searched));
            }
        }

        let mut hits = Vec::new();
        for backend in self.available().await? {
            if searched.contains(&backend.kind()) {
                continue;
            }
            searched.push(backend.kind());
            if let Some(image) = backend.find_image(reference).await? {
                hits.push(image);
            }
        }
        single_hit(reference, hits, &searched, |img| img.backend)
    }

    /// Find the one backend that holds the container `name`.
    pub async fn resolve_container(
        &self,
        name: &str,
        preferred: Option<BackendKind>,
        required: bool,
    ) -> Result<ContainerRecord> {
        if let Some(kind) = preferred {
            let backend = match self.active(kind).await {
                Ok(backend) => Some(backend),
                Err(e) if required => return Err(e),
                Err(_) => None,
            };
            if let Some(backend) = backend
                && let Some(container) = backend.find_container(name).await?
            {
                return Ok(container);
            }
            if required {
                return Err(Error::ContainerNotFound(name.to_string()));
            }
        }

        let mut hits = Vec::new();
        for backend in self.available().await? {
            if Some(backend.kind()) == preferred {
                continue;
            }
            if let Some(container) = backend.find_container(name).await? {
                hits.push(container);
            }
        }
        match hits.len() {
            0 => Err(Error::ContainerNotFound(name.to_string())),
            1 => Ok(hits.remove(0)),
            _ => Err(Error::InvalidArguments(format!(
                "container '{}' exists in multiple storage backends: {}",
                name,
                join_kinds(hits.iter().map(|c| c.backend))
            ))),
        }
    }

    /// Images from one backend, or from every reachable backend.
    pub async fn list_images(
        &self,
        scope: Option<BackendKind>,
        all: bool,
    ) -> Result<Vec<ImageRecord>> {
        let backends = match scope {
            Some(kind) => vec![self.active(kind).await?],
            None => self.available().await?,
        };
        let mut images = Vec::new();
        for backend in backends {
            images.extend(backend.list_images(all).await?);
        }
        Ok(images)
    }

    /// Containers from every reachable backend.
    pub async fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        let mut containers = Vec::new();
        for backend in self.available().await? {
            containers.extend(backend.list_containers().await?);
        }
        Ok(containers)
    }

    /// IDs of containers on any backend that run image `id`.
    pub async fn container_ids_for_image(&self, id: &ImageId) -> Result<Vec<ContainerId>> {
        Ok(self
            .list_containers()
            .await?
            .into_iter()
            .filter(|c| &c.image == id)
            .map(|c| c.id)
            .collect())
    }

    /// One-line summary of every known backend and whether it is reachable.
    pub async fn describe(&self) -> String {
        let mut out = String::from("Backends(");
        for backend in &self.backends {
            let state = if backend.is_available().await {
                "Active"
            } else {
                "Inactive"
            };
            let _ = write!(out, "{}: {}, ", backend.kind(), state);
        }
        out.push(')');
        out
    }
}

fn join_kinds(kinds: impl Iterator<Item = BackendKind>) -> String {
    kinds.map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

fn not_found(reference: &str, searched: &[BackendKind]) -> Error {
    Error::ImageNotFound {
        reference: reference.to_string(),
        searched: join_kinds(searched.iter().copied()),
    }
}

fn single_hit<T>(
    reference: &str,
    mut hits: Vec<T>,
    searched: &[BackendKind],
    kind_of: impl Fn(&T) -> BackendKind,
) -> Result<T> {
    match hits.len() {
        0 => Err(not_found(reference, searched)),
        1 => Ok(hits.remove(0)),
        _ => Err(Error::AmbiguousImage {
            reference: reference.to_string(),
            backends: join_kinds(hits.iter().map(kind_of)),
        }),
    }
}
