// ABOUTME: On-disk checkouts of system containers.
// ABOUTME: Locates, lists and reads the info file of installed containers.

use crate::config::Config;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

/// Metadata written next to a checkout at install time.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInfo {
    /// Image name the container was installed from.
    #[serde(default)]
    pub image: String,
    /// ID of that image.
    #[serde(default)]
    pub revision: String,
    #[serde(default, rename = "ostree-commit")]
    pub commit: Option<String>,
    #[serde(default = "default_true", rename = "has-container-service")]
    pub has_container_service: bool,
    /// OCI runtime the container was installed for.
    #[serde(default)]
    pub runtime: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One installed system container.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub name: String,
    pub path: PathBuf,
    pub preinstalled: bool,
    pub info: CheckoutInfo,
}

/// The checkout directory plus the read-only preinstalled directory.
#[derive(Debug, Clone)]
pub struct CheckoutStore {
    checkout_path: PathBuf,
    preinstalled_path: PathBuf,
}

impl CheckoutStore {
    pub fn new(checkout_path: impl Into<PathBuf>, preinstalled_path: impl Into<PathBuf>) -> Self {
        Self {
            checkout_path: checkout_path.into(),
            preinstalled_path: preinstalled_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.checkout_path, &config.preinstalled_path)
    }

    pub fn checkout_path(&self) -> &Path {
        &self.checkout_path
    }

    /// Path of the named container's checkout, installed ones first.
    pub fn locate(&self, name: &str) -> io::Result<Option<PathBuf>> {
        if name.is_empty() || name.contains('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid container name '{}'", name),
            ));
        }
        Ok([&self.checkout_path, &self.preinstalled_path]
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|path| path.exists()))
    }

    /// Load the named checkout with its info file.
    pub fn load(&self, name: &str) -> io::Result<Option<Checkout>> {
        let Some(path) = self.locate(name)? else {
            return Ok(None);
        };
        let preinstalled = !path.starts_with(&self.checkout_path);
        let info = read_info(&path)?;
        Ok(Some(Checkout {
            name: name.to_string(),
            path,
            preinstalled,
            info,
        }))
    }

    /// Every installed container, checkouts before preinstalled ones.
    pub fn list(&self) -> io::Result<Vec<Checkout>> {
        let mut checkouts = scan(&self.checkout_path, false)?;
        checkouts.extend(scan(&self.preinstalled_path, true)?);
        Ok(checkouts)
    }

    /// `name.0`/`name.1` deployments whose `name` link is gone.
    pub fn orphaned_deployments(&self) -> io::Result<Vec<PathBuf>> {
        let mut orphans = Vec::new();
        for entry in read_dir_sorted(&self.checkout_path)? {
            let Some(file_name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            let Some(container) = deployment_base(file_name) else {
                continue;
            };
            if self.checkout_path.join(container).symlink_metadata().is_ok() {
                continue;
            }
            if entry.is_dir() {
                orphans.push(entry);
            }
        }
        Ok(orphans)
    }
}

/// Parse `<checkout>/info`.
pub fn read_info(checkout: &Path) -> io::Result<CheckoutInfo> {
    let content = std::fs::read_to_string(checkout.join("info"))?;
    serde_json::from_str(&content).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid info file in {}: {}", checkout.display(), e),
        )
    })
}

fn deployment_base(name: &str) -> Option<&str> {
    name.strip_suffix(".0").or_else(|| name.strip_suffix(".1"))
}

fn read_dir_sorted(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn scan(dir: &Path, preinstalled: bool) -> io::Result<Vec<Checkout>> {
    let mut checkouts = Vec::new();
    for path in read_dir_sorted(dir)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') || !path.exists() {
            continue;
        }
        // A deployment shadowed by its link is reported through the link.
        if let Some(base) = deployment_base(&name)
            && dir.join(base).is_symlink()
        {
            continue;
        }
        match read_info(&path) {
            Ok(info) => checkouts.push(Checkout {
                name,
                path,
                preinstalled,
                info,
            }),
            Err(e) => tracing::warn!("skipping checkout {}: {}", path.display(), e),
        }
    }
    Ok(checkouts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_checkout(dir: &Path, name: &str, info: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("info"), info).unwrap();
        path
    }

    #[test]
    fn locate_prefers_installed_checkouts() {
        let installed = tempfile::tempdir().unwrap();
        let preinstalled = tempfile::tempdir().unwrap();
        write_checkout(installed.path(), "etcd", "{}");
        write_checkout(preinstalled.path(), "etcd", "{}");
        write_checkout(preinstalled.path(), "flannel", "{}");

        let store = CheckoutStore::new(installed.path(), preinstalled.path());
        assert_eq!(
            store.locate("etcd").unwrap(),
            Some(installed.path().join("etcd"))
        );
        assert_eq!(
            store.locate("flannel").unwrap(),
            Some(preinstalled.path().join("flannel"))
        );
        assert_eq!(store.locate("missing").unwrap(), None);
    }

    #[test]
    fn empty_name_is_rejected() {
        let store = CheckoutStore::new("/nonexistent", "/nonexistent");
        assert!(store.locate("").is_err());
    }

    #[test]
    fn list_skips_linked_deployments_and_dot_entries() {
        let installed = tempfile::tempdir().unwrap();
        let deployment = write_checkout(
            installed.path(),
            "etcd.0",
            r#"{"image": "docker.io/etcd:3.5", "revision": "abc123", "runtime": "/usr/bin/crun"}"#,
        );
        std::os::unix::fs::symlink(&deployment, installed.path().join("etcd")).unwrap();
        fs::create_dir_all(installed.path().join(".storage")).unwrap();

        let store = CheckoutStore::new(installed.path(), "/nonexistent");
        let checkouts = store.list().unwrap();
        assert_eq!(checkouts.len(), 1);
        assert_eq!(checkouts[0].name, "etcd");
        assert_eq!(checkouts[0].info.revision, "abc123");
        assert_eq!(checkouts[0].info.runtime.as_deref(), Some("/usr/bin/crun"));
        assert!(checkouts[0].info.has_container_service);
    }

    #[test]
    fn orphaned_deployments_have_no_link() {
        let installed = tempfile::tempdir().unwrap();
        let kept = write_checkout(installed.path(), "etcd.0", "{}");
        std::os::unix::fs::symlink(&kept, installed.path().join("etcd")).unwrap();
        write_checkout(installed.path(), "old.1", "{}");

        let store = CheckoutStore::new(installed.path(), "/nonexistent");
        assert_eq!(
            store.orphaned_deployments().unwrap(),
            vec![installed.path().join("old.1")]
        );
    }
}
