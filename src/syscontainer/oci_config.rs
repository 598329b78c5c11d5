// ABOUTME: Prepares a checkout's OCI config.json for a one-off run.
// ABOUTME: The rewritten copy lives in a private temporary directory.

use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Bind sources under these prefixes are normally created by systemd.
const RUNTIME_DIR_PREFIXES: [&str; 2] = ["/run/", "/var/run/"];

/// A rewritten `config.json` ready for `<runtime> run`.
///
/// The temporary directory is removed on drop.
#[derive(Debug)]
pub struct RunConfig {
    dir: TempDir,
    config: Value,
}

impl RunConfig {
    /// Copy `<checkout>/config.json` with the caller's process arguments.
    ///
    /// `root.path` is made absolute and canonical relative to the checkout, and
    /// `process.terminal` follows `tty`.
    pub fn prepare(checkout: &Path, args: &[String], tty: bool) -> Result<Self> {
        let source = checkout.join("config.json");
        let mut config: Value = serde_json::from_str(&std::fs::read_to_string(&source)?)?;

        let process = config
            .get_mut("process")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| invalid(&source, "missing process section"))?;
        process.insert("args".to_string(), Value::from(args.to_vec()));
        process.insert("terminal".to_string(), Value::Bool(tty));

        let root = config
            .get_mut("root")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| invalid(&source, "missing root section"))?;
        let root_path = root
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(&source, "missing root.path"))?;
        let rootfs = checkout.join(root_path);
        let rootfs = std::fs::canonicalize(&rootfs)
            .map_err(|e| invalid(&rootfs, &format!("cannot resolve rootfs: {e}")))?;
        root.insert(
            "path".to_string(),
            Value::String(rootfs.display().to_string()),
        );

        let dir = tempfile::Builder::new().prefix("stowage-run-").tempdir()?;
        std::fs::write(
            dir.path().join("config.json"),
            serde_json::to_string_pretty(&config)?,
        )?;
        tracing::debug!(dir = %dir.path().display(), "wrote run configuration");

        Ok(Self { dir, config })
    }

    /// Directory holding the rewritten `config.json`.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Bind-mount sources under `/run/` or `/var/run/`.
    pub fn runtime_bind_sources(&self) -> Vec<PathBuf> {
        self.config
            .get("mounts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|m| m.get("type").and_then(Value::as_str) == Some("bind"))
            .filter_map(|m| m.get("source").and_then(Value::as_str))
            .filter(|src| RUNTIME_DIR_PREFIXES.iter().any(|p| src.starts_with(p)))
            .map(PathBuf::from)
            .collect()
    }

    /// Create missing runtime bind sources, as systemd would on service start.
    pub fn create_runtime_dirs(&self) -> Result<()> {
        for source in self.runtime_bind_sources() {
            if !source.exists() {
                tracing::debug!(path = %source.display(), "creating runtime directory");
                std::fs::create_dir_all(&source)?;
            }
        }
        Ok(())
    }
}

fn invalid(path: &Path, reason: &str) -> Error {
    Error::InvalidLocation {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
