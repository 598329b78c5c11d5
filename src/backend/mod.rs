// ABOUTME: Storage backends (Docker-compatible engine, OSTree system containers).
// ABOUTME: One sealed capability trait, one implementation per engine, and the registry.

mod detection;
mod docker;
#[cfg(test)]
pub(crate) mod fake;
mod kind;
mod ops;
mod ostree;
mod record;
mod registry;
pub(crate) mod sealed;

pub use detection::{EngineSocket, current_uid, detect_engine_socket};
pub use docker::DockerBackend;
pub use kind::BackendKind;
pub use ops::{Backend, BackendError, PruneReport};
pub use ostree::{OstreeBackend, OstreeRepo};
pub use record::{ContainerRecord, ImageRecord, NONE_TAG};
pub use registry::BackendRegistry;
