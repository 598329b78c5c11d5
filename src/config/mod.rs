// ABOUTME: Configuration types and loading for stowage.yml.
// ABOUTME: Read once at startup, with environment overrides for storage paths.

mod docker;

pub use docker::DockerConfig;

use crate::backend::BackendKind;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/stowage/stowage.yml";
pub const CONFIG_ENV: &str = "STOWAGE_CONFIG";
pub const CHECKOUT_PATH_ENV: &str = "STOWAGE_CHECKOUT_PATH";
pub const OSTREE_REPO_ENV: &str = "STOWAGE_OSTREE_REPO";

const SYSTEM_OSTREE_REPO: &str = "/ostree/repo";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend used when none is named on the command line.
    #[serde(default)]
    pub default_storage: BackendKind,

    /// Where system containers are checked out.
    #[serde(default = "default_checkout_path")]
    pub checkout_path: PathBuf,

    /// Read-only location of system containers shipped with the OS.
    #[serde(default = "default_preinstalled_path")]
    pub preinstalled_path: PathBuf,

    #[serde(default)]
    pub ostree_repository: Option<PathBuf>,

    /// OCI runtime used to exec into or run system containers.
    #[serde(default = "default_runtime")]
    pub runtime: PathBuf,

    #[serde(default)]
    pub docker: DockerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_storage: BackendKind::default(),
            checkout_path: default_checkout_path(),
            preinstalled_path: default_preinstalled_path(),
            ostree_repository: None,
            runtime: default_runtime(),
            docker: DockerConfig::default(),
        }
    }
}

fn default_checkout_path() -> PathBuf {
    PathBuf::from("/var/lib/containers/atomic")
}

fn default_preinstalled_path() -> PathBuf {
    PathBuf::from("/usr/lib/containers/atomic")
}

fn default_runtime() -> PathBuf {
    PathBuf::from("/usr/bin/runc")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Load the configuration.
    ///
    /// An explicit path (argument, then `STOWAGE_CONFIG`) must exist. The
    /// default path is optional and falls back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let explicit = explicit.map(Path::to_path_buf).or(from_env);

        let config = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(Error::ConfigNotFound(path));
                }
                Self::from_yaml(&std::fs::read_to_string(&path)?)?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.is_file() {
                    Self::from_yaml(&std::fs::read_to_string(path)?)?
                } else {
                    tracing::debug!("no configuration at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };

        Ok(config.with_env_overrides())
    }

    /// Apply `STOWAGE_CHECKOUT_PATH` and `STOWAGE_OSTREE_REPO`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(CHECKOUT_PATH_ENV).filter(|p| !p.is_empty()) {
            self.checkout_path = PathBuf::from(path);
        }
        if let Some(path) = std::env::var_os(OSTREE_REPO_ENV).filter(|p| !p.is_empty()) {
            self.ostree_repository = Some(PathBuf::from(path));
        }
        self
    }

    /// Directory holding extracted image layers next to the checkouts.
    pub fn storage_path(&self) -> PathBuf {
        self.checkout_path.join(".storage")
    }

    /// The OSTree repository holding system-container images.
    pub fn ostree_repo_location(&self) -> PathBuf {
        if let Some(ref repo) = self.ostree_repository {
            return repo.clone();
        }
        if Path::new(SYSTEM_OSTREE_REPO).join("config").exists() {
            return PathBuf::from(SYSTEM_OSTREE_REPO);
        }
        self.storage_path().join("ostree")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.default_storage, BackendKind::Docker);
        assert_eq!(config.runtime, PathBuf::from("/usr/bin/runc"));
    }

    #[test]
    fn storage_path_is_under_checkouts() {
        let config = Config {
            checkout_path: PathBuf::from("/srv/checkouts"),
            ..Config::default()
        };
        assert_eq!(config.storage_path(), PathBuf::from("/srv/checkouts/.storage"));
    }

    #[test]
    fn explicit_repository_wins() {
        let config = Config {
            ostree_repository: Some(PathBuf::from("/srv/repo")),
            ..Config::default()
        };
        assert_eq!(config.ostree_repo_location(), PathBuf::from("/srv/repo"));
    }
}
