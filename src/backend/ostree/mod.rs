// ABOUTME: OSTree-backed storage for system containers.
// ABOUTME: Images live as refs under `ociimage/`; containers are on-disk checkouts.

mod repo;

pub use repo::OstreeRepo;

use super::kind::BackendKind;
use super::ops::{Backend, BackendError, PruneReport};
use super::record::{ContainerRecord, ImageRecord, NONE_TAG};
use super::sealed::Sealed;
use crate::config::Config;
use crate::process::CommandRunner;
use crate::syscontainer::{Checkout, CheckoutStore};
use crate::types::image_name::decode_ref_component;
use crate::types::remote_ref::strip_transport;
use crate::types::{ContainerId, ImageId, ImageName};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ref namespace holding images and their layers.
pub const IMAGE_REF_PREFIX: &str = "ociimage/";

/// One `ociimage/` ref, resolved.
#[derive(Debug, Clone)]
struct StoredImage {
    /// Ref name without the namespace prefix.
    branch: String,
    record: ImageRecord,
    /// Layer digests a tagged image is built from.
    layers: Vec<String>,
    /// Digest of the image configuration blob.
    config: Option<String>,
}

impl StoredImage {
    fn tagged(&self) -> bool {
        !is_hex(&self.branch)
    }
}

/// Every image ref plus the set of blobs tagged images reference.
struct Catalog {
    images: Vec<StoredImage>,
    referenced: HashSet<String>,
    /// Refs whose names are not valid encoded image names.
    invalid: Vec<String>,
}

/// System-container storage in an OSTree repository.
#[derive(Debug)]
pub struct OstreeBackend {
    repo: OstreeRepo,
    checkouts: CheckoutStore,
    storage_path: PathBuf,
}

impl OstreeBackend {
    pub fn new(repo: OstreeRepo, checkouts: CheckoutStore, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            checkouts,
            storage_path: storage_path.into(),
        }
    }

    pub fn from_config(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(
            OstreeRepo::new(config.ostree_repo_location(), runner),
            CheckoutStore::from_config(config),
            config.storage_path(),
        )
    }

    pub fn repo(&self) -> &OstreeRepo {
        &self.repo
    }

    pub fn checkouts(&self) -> &CheckoutStore {
        &self.checkouts
    }

    async fn image_branches(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .repo
            .refs()
            .await?
            .into_iter()
            .filter_map(|r| r.strip_prefix(IMAGE_REF_PREFIX).map(str::to_string))
            .collect())
    }

    async fn load(&self, branch: &str) -> Result<Option<StoredImage>, BackendError> {
        let Some(rev) = self.repo.resolve(&format!("{IMAGE_REF_PREFIX}{branch}")).await? else {
            return Ok(None);
        };

        if is_hex(branch) {
            let record = ImageRecord::new(ImageId::new(branch), BackendKind::Ostree)
                .with_tags(vec![NONE_TAG.to_string()]);
            return Ok(Some(StoredImage {
                branch: branch.to_string(),
                record,
                layers: Vec::new(),
                config: None,
            }));
        }

        let manifest = match self.repo.metadata(&rev, "docker.manifest").await? {
            Some(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(branch, "ignoring malformed image manifest: {}", e);
                    None
                }
            },
            None => None,
        };
        let digest = self.repo.metadata(&rev, "docker.digest").await?;
        let id = digest
            .or_else(|| manifest.as_ref().and_then(manifest_image_id))
            .unwrap_or_else(|| rev.clone());

        let record = ImageRecord::new(ImageId::new(id), BackendKind::Ostree)
            .with_tags(vec![decode_ref_component(branch)]);
        Ok(Some(StoredImage {
            branch: branch.to_string(),
            record,
            layers: manifest.as_ref().map(manifest_layers).unwrap_or_default(),
            config: manifest.as_ref().and_then(manifest_config),
        }))
    }

    async fn catalog(&self) -> Result<Catalog, BackendError> {
        let mut loaded = Vec::new();
        let mut invalid = Vec::new();
        for branch in self.image_branches().await? {
            if !is_valid_branch(&branch) {
                invalid.push(branch);
                continue;
            }
            if let Some(image) = self.load(&branch).await? {
                loaded.push(image);
            }
        }

        let mut referenced = HashSet::new();
        let mut configs = HashSet::new();
        for image in loaded.iter().filter(|i| i.tagged()) {
            referenced.extend(image.layers.iter().cloned());
            if let Some(ref config) = image.config {
                referenced.insert(config.clone());
                configs.insert(config.clone());
            }
        }

        // Config blobs are image metadata, not images of their own.
        let images = loaded
            .into_iter()
            .filter(|i| i.tagged() || !configs.contains(&i.branch))
            .map(|mut i| {
                if !i.tagged() {
                    i.record.dangling = !referenced.contains(&i.branch);
                }
                i
            })
            .collect();

        Ok(Catalog {
            images,
            referenced,
            invalid,
        })
    }

    /// Refs a reference names: an exact image name, else the one image ID it prefixes.
    ///
    /// Every returned ref carries the same image ID.
    async fn matching(&self, reference: &str) -> Result<Vec<StoredImage>, BackendError> {
        let stripped = strip_transport(reference.trim());
        let stripped = stripped.strip_prefix("sha256:").unwrap_or(stripped);
        if stripped.is_empty() {
            return Ok(Vec::new());
        }

        if let Ok(name) = ImageName::parse(stripped)
            && let Some(image) = self.load(&name.to_ostree_ref()).await?
        {
            return Ok(vec![image]);
        }

        if !stripped.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(Vec::new());
        }
        let images: Vec<StoredImage> = self
            .catalog()
            .await?
            .images
            .into_iter()
            .filter(|i| i.record.id.starts_with(stripped))
            .collect();

        let ids: BTreeSet<&str> = images.iter().map(|i| i.record.id.as_str()).collect();
        if ids.len() > 1 {
            let ids: Vec<&str> = ids.iter().map(|&id| id.get(..12).unwrap_or(id)).collect();
            return Err(BackendError::AmbiguousImage {
                reference: reference.to_string(),
                ids: ids.join(", "),
            });
        }
        Ok(images)
    }

    async fn prune_refs(&self, report: &mut PruneReport) -> Result<(), BackendError> {
        let catalog = self.catalog().await?;
        let doomed = catalog
            .images
            .iter()
            .filter(|i| !i.tagged() && !catalog.referenced.contains(&i.branch))
            .map(|i| i.branch.clone())
            .chain(catalog.invalid.iter().cloned());

        for branch in doomed {
            let refspec = format!("{IMAGE_REF_PREFIX}{branch}");
            match self.repo.delete_ref(&refspec).await {
                Ok(()) => report.removed.push(refspec),
                Err(e) => report
                    .warnings
                    .push(format!("failed to delete ref {}: {}", refspec, e)),
            }
        }

        if let Err(e) = self.repo.prune_refs_only().await {
            report
                .warnings
                .push(format!("failed to prune ostree repository: {}", e));
        }
        Ok(())
    }

    /// Remove extracted layer directories whose ref is gone.
    async fn prune_storage(&self, report: &mut PruneReport) -> Result<(), BackendError> {
        if !self.storage_path.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.storage_path)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == "ostree" {
                continue;
            }
            if self
                .repo
                .resolve(&format!("{IMAGE_REF_PREFIX}{name}"))
                .await?
                .is_some()
            {
                continue;
            }
            remove_path(&path, report);
        }
        Ok(())
    }
}

impl Sealed for OstreeBackend {}

#[async_trait]
impl Backend for OstreeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ostree
    }

    async fn is_available(&self) -> bool {
        self.repo.tool_available().await
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageRecord>, BackendError> {
        Ok(self
            .catalog()
            .await?
            .images
            .into_iter()
            .filter(|i| all || i.tagged())
            .map(|i| i.record)
            .collect())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, BackendError> {
        Ok(self.checkouts.list()?.iter().map(container_record).collect())
    }

    async fn find_image(&self, reference: &str) -> Result<Option<ImageRecord>, BackendError> {
        Ok(self
            .matching(reference)
            .await?
            .into_iter()
            .next()
            .map(|i| i.record.with_input_name(reference)))
    }

    async fn find_container(&self, name: &str) -> Result<Option<ContainerRecord>, BackendError> {
        if name.is_empty() || name.contains('/') {
            return Ok(None);
        }
        Ok(self.checkouts.load(name)?.as_ref().map(container_record))
    }

    async fn delete_image(&self, reference: &str, force: bool) -> Result<(), BackendError> {
        let images = self.matching(reference).await?;
        if images.is_empty() {
            return Err(BackendError::ImageNotFound(reference.to_string()));
        }
        tracing::debug!(reference, force, count = images.len(), "deleting ostree image");
        for image in images {
            self.repo
                .delete_ref(&format!("{IMAGE_REF_PREFIX}{}", image.branch))
                .await?;
        }
        Ok(())
    }

    async fn prune(&self) -> Result<PruneReport, BackendError> {
        let mut report = PruneReport::default();

        for deployment in self.checkouts.orphaned_deployments()? {
            remove_path(&deployment, &mut report);
        }

        if !self.repo.exists() {
            tracing::debug!(repo = %self.repo.path().display(), "no ostree repository to prune");
            return Ok(report);
        }
        self.prune_refs(&mut report).await?;
        self.prune_storage(&mut report).await?;
        Ok(report)
    }
}

fn container_record(checkout: &Checkout) -> ContainerRecord {
    let image = if checkout.info.revision.is_empty() {
        checkout.info.image.clone()
    } else {
        checkout.info.revision.clone()
    };
    let mut record = ContainerRecord::new(
        ContainerId::new(checkout.name.as_str()),
        ImageId::new(image),
        BackendKind::Ostree,
    );
    record.checkout = Some(checkout.path.clone());
    record.runtime = checkout.info.runtime.clone();
    record
}

fn remove_path(path: &Path, report: &mut PruneReport) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => report.removed.push(path.display().to_string()),
        Err(e) => report
            .warnings
            .push(format!("failed to remove {}: {}", path.display(), e)),
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_valid_branch(branch: &str) -> bool {
    !branch.is_empty()
        && branch
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn bare_digest(digest: &str) -> String {
    digest.strip_prefix("sha256:").unwrap_or(digest).to_string()
}

/// Layer digests of a schema 1 or schema 2 manifest, base layer first.
fn manifest_layers(manifest: &Value) -> Vec<String> {
    if let Some(fs_layers) = manifest.get("fsLayers").and_then(Value::as_array) {
        return fs_layers
            .iter()
            .rev()
            .filter_map(|l| l.get("blobSum").and_then(Value::as_str))
            .map(bare_digest)
            .collect();
    }
    if let Some(layers) = manifest.get("layers").and_then(Value::as_array) {
        return layers
            .iter()
            .filter_map(|l| l.get("digest").and_then(Value::as_str))
            .map(bare_digest)
            .collect();
    }
    manifest
        .get("Layers")
        .and_then(Value::as_array)
        .map(|layers| {
            layers
                .iter()
                .filter_map(Value::as_str)
                .map(bare_digest)
                .collect()
        })
        .unwrap_or_default()
}

fn manifest_config(manifest: &Value) -> Option<String> {
    manifest
        .get("config")
        .and_then(|c| c.get("digest"))
        .and_then(Value::as_str)
        .map(bare_digest)
}

fn manifest_image_id(manifest: &Value) -> Option<String> {
    manifest
        .get("Digest")
        .and_then(Value::as_str)
        .map(bare_digest)
        .or_else(|| manifest_config(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedRunner;
    use std::fs;

    const CONFIG: &str = "c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00";
    const BASE: &str = "aaaa0000aaaa0000aaaa0000aaaa0000aaaa0000aaaa0000aaaa0000aaaa0000";
    const ORPHAN: &str = "bbbb1111bbbb1111bbbb1111bbbb1111bbbb1111bbbb1111bbbb1111bbbb1111";

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        runner: Arc<ScriptedRunner>,
        backend: OstreeBackend,
    }

    /// A repository holding `busybox:latest` (one layer), its config blob and an orphaned layer.
    fn fixture() -> Fixture {
        fixture_with(|runner, _| runner)
    }

    fn fixture_with(extra: impl FnOnce(ScriptedRunner, &str) -> ScriptedRunner) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let repo_path = root.join("repo");
        fs::create_dir_all(&repo_path).unwrap();
        fs::write(repo_path.join("config"), "").unwrap();

        let repo = format!("--repo={}", repo_path.display());
        let manifest = format!(
            r#"'{{"schemaVersion": 2, "config": {{"digest": "sha256:{CONFIG}"}}, "layers": [{{"digest": "sha256:{BASE}"}}]}}'"#
        );
        let mut runner = ScriptedRunner::new()
            .on(
                &["ostree", &repo, "refs"],
                0,
                &format!(
                    "ociimage/busybox_3Alatest\nociimage/{CONFIG}\nociimage/{BASE}\nociimage/{ORPHAN}\nother/ref\n"
                ),
            )
            .on(&["ostree", &repo, "rev-parse"], 1, "")
            .on(&["ostree", &repo, "show"], 1, "")
            .on(
                &["ostree", &repo, "rev-parse", "ociimage/busybox_3Alatest"],
                0,
                "rev-busybox\n",
            )
            .on(
                &["ostree", &repo, "show", "--print-metadata-key=docker.manifest", "rev-busybox"],
                0,
                &manifest,
            );
        for hex in [CONFIG, BASE, ORPHAN] {
            runner = runner.on(
                &["ostree", &repo, "rev-parse", &format!("ociimage/{hex}")],
                0,
                &format!("rev-{hex}\n"),
            );
        }
        let runner = Arc::new(extra(runner, repo.as_str()));

        let checkouts = CheckoutStore::new(root.join("checkouts"), root.join("preinstalled"));
        let backend = OstreeBackend::new(
            OstreeRepo::new(&repo_path, runner.clone()),
            checkouts,
            root.join("checkouts/.storage"),
        );
        Fixture {
            _dir: dir,
            root,
            runner,
            backend,
        }
    }

    #[tokio::test]
    async fn lists_tagged_images_by_default() {
        let f = fixture();
        let images = f.backend.list_images(false).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name(), Some("busybox:latest"));
        assert_eq!(images[0].id.as_str(), CONFIG);
        assert_eq!(images[0].backend, BackendKind::Ostree);
    }

    #[tokio::test]
    async fn listing_all_marks_unreferenced_layers_dangling() {
        let f = fixture();
        let images = f.backend.list_images(true).await.unwrap();
        assert_eq!(images.len(), 3);

        let layer = images.iter().find(|i| i.id.as_str() == BASE).unwrap();
        assert!(!layer.dangling);
        assert!(layer.is_unnamed_layer());

        let orphan = images.iter().find(|i| i.id.as_str() == ORPHAN).unwrap();
        assert!(orphan.dangling);
    }

    #[tokio::test]
    async fn find_by_name_or_id_prefix() {
        let f = fixture();
        let by_name = f.backend.find_image("busybox").await.unwrap().unwrap();
        assert_eq!(by_name.id.as_str(), CONFIG);
        assert_eq!(by_name.input_name, "busybox");

        let by_id = f.backend.find_image("bbbb1111").await.unwrap().unwrap();
        assert_eq!(by_id.id.as_str(), ORPHAN);

        assert!(f.backend.find_image("nginx").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_image_ref() {
        let f = fixture();
        f.backend.delete_image("busybox:latest", false).await.unwrap();
        assert!(f.runner.calls().iter().any(|c| c.ends_with(&[
            "refs".to_string(),
            "--delete".to_string(),
            "ociimage/busybox_3Alatest".to_string(),
        ])));
    }

    const NGINX_CONFIG: &str = "c0ffee11c0ffee11c0ffee11c0ffee11c0ffee11c0ffee11c0ffee11c0ffee11";

    /// Adds `nginx:latest`, whose ID shares the `c0ffee` prefix with busybox.
    fn with_nginx(runner: ScriptedRunner, repo: &str) -> ScriptedRunner {
        let manifest = format!(
            r#"'{{"schemaVersion": 2, "config": {{"digest": "sha256:{NGINX_CONFIG}"}}, "layers": [{{"digest": "sha256:{BASE}"}}]}}'"#
        );
        runner
            .on(
                &["ostree", repo, "refs"],
                0,
                &format!(
                    "ociimage/busybox_3Alatest\nociimage/nginx_3Alatest\nociimage/{CONFIG}\nociimage/{NGINX_CONFIG}\nociimage/{BASE}\n"
                ),
            )
            .on(
                &["ostree", repo, "rev-parse", "ociimage/nginx_3Alatest"],
                0,
                "rev-nginx\n",
            )
            .on(
                &["ostree", repo, "rev-parse", &format!("ociimage/{NGINX_CONFIG}")],
                0,
                &format!("rev-{NGINX_CONFIG}\n"),
            )
            .on(
                &["ostree", repo, "show", "--print-metadata-key=docker.manifest", "rev-nginx"],
                0,
                &manifest,
            )
    }

    fn deleted_refs(runner: &ScriptedRunner) -> Vec<String> {
        runner
            .calls()
            .iter()
            .filter(|c| c.iter().any(|a| a == "--delete"))
            .filter_map(|c| c.last().cloned())
            .collect()
    }

    #[tokio::test]
    async fn id_prefix_shared_by_several_images_is_ambiguous() {
        let f = fixture_with(with_nginx);

        let err = f.backend.find_image("c0ffee").await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::AmbiguousImage { ref reference, .. } if reference == "c0ffee"
        ));

        let err = f.backend.delete_image("c0ffee", false).await.unwrap_err();
        assert!(matches!(err, BackendError::AmbiguousImage { .. }));
        assert!(deleted_refs(&f.runner).is_empty());
    }

    #[tokio::test]
    async fn id_prefix_deletes_only_the_image_it_resolves_to() {
        let f = fixture_with(with_nginx);

        let found = f.backend.find_image("c0ffee00").await.unwrap().unwrap();
        assert_eq!(found.name(), Some("busybox:latest"));

        f.backend.delete_image("c0ffee00", false).await.unwrap();
        assert_eq!(deleted_refs(&f.runner), vec!["ociimage/busybox_3Alatest".to_string()]);
    }

    #[tokio::test]
    async fn deleting_unknown_image_is_not_found() {
        let f = fixture();
        let err = f.backend.delete_image("nginx", true).await.unwrap_err();
        assert!(matches!(err, BackendError::ImageNotFound(ref r) if r == "nginx"));
    }

    #[tokio::test]
    async fn prune_deletes_orphans_and_stale_storage() {
        let f = fixture();
        let storage = f.root.join("checkouts/.storage");
        fs::create_dir_all(storage.join(BASE)).unwrap();
        fs::create_dir_all(storage.join("deadbeef")).unwrap();
        fs::create_dir_all(storage.join("ostree")).unwrap();
        fs::create_dir_all(f.root.join("checkouts/gone.0")).unwrap();

        let report = f.backend.prune().await.unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert!(report.removed.contains(&format!("ociimage/{ORPHAN}")));
        assert!(!report.removed.contains(&format!("ociimage/{BASE}")));
        assert!(!report.removed.contains(&format!("ociimage/{CONFIG}")));

        assert!(storage.join(BASE).exists());
        assert!(storage.join("ostree").exists());
        assert!(!storage.join("deadbeef").exists());
        assert!(!f.root.join("checkouts/gone.0").exists());

        assert!(f
            .runner
            .calls()
            .iter()
            .any(|c| c.ends_with(&["prune".to_string(), "--refs-only".to_string()])));
    }

    #[tokio::test]
    async fn containers_come_from_checkouts() {
        let f = fixture();
        let checkout = f.root.join("checkouts/etcd");
        fs::create_dir_all(&checkout).unwrap();
        fs::write(
            checkout.join("info"),
            format!(r#"{{"image": "busybox:latest", "revision": "{CONFIG}"}}"#),
        )
        .unwrap();

        let containers = f.backend.list_containers().await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "etcd");
        assert_eq!(containers[0].image.as_str(), CONFIG);

        let found = f.backend.find_container("etcd").await.unwrap().unwrap();
        assert_eq!(found.checkout.as_deref(), Some(checkout.as_path()));
        assert!(f.backend.find_container("nope").await.unwrap().is_none());
    }

    #[test]
    fn schema1_layers_are_base_first() {
        let manifest: Value = serde_json::from_str(
            r#"{"fsLayers": [{"blobSum": "sha256:top"}, {"blobSum": "sha256:base"}]}"#,
        )
        .unwrap();
        assert_eq!(manifest_layers(&manifest), vec!["base", "top"]);
        assert_eq!(manifest_image_id(&manifest), None);
    }
}
