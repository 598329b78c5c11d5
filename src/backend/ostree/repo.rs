// ABOUTME: Thin wrapper over the `ostree` command line for one repository.
// ABOUTME: Ref listing, rev-parse, commit metadata, ref deletion and pruning.

use crate::backend::ops::BackendError;
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An OSTree repository driven through the `ostree` binary.
#[derive(Clone)]
pub struct OstreeRepo {
    path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for OstreeRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OstreeRepo").field("path", &self.path).finish()
    }
}

impl OstreeRepo {
    pub fn new(path: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            path: path.into(),
            runner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the repository has been initialized on disk.
    pub fn exists(&self) -> bool {
        self.path.join("config").exists()
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new("ostree").arg(format!("--repo={}", self.path.display()))
    }

    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, BackendError> {
        Ok(self.runner.output(&spec).await?.checked(&spec)?)
    }

    /// Whether the `ostree` tool can be executed at all.
    pub async fn tool_available(&self) -> bool {
        matches!(
            self.runner.output(&CommandSpec::new("ostree").arg("--version")).await,
            Ok(out) if out.success()
        )
    }

    /// Every ref in the repository.
    pub async fn refs(&self) -> Result<Vec<String>, BackendError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let out = self.run(self.command().arg("refs")).await?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Commit a ref points at, or `None` when the ref does not exist.
    pub async fn resolve(&self, refspec: &str) -> Result<Option<String>, BackendError> {
        if !self.exists() {
            return Ok(None);
        }
        let spec = self.command().args(["rev-parse", refspec]);
        let out = self.runner.output(&spec).await?;
        if !out.success() {
            tracing::trace!(refspec, stderr = %out.stderr.trim(), "ref does not resolve");
            return Ok(None);
        }
        let rev = out.stdout.trim();
        Ok((!rev.is_empty()).then(|| rev.to_string()))
    }

    /// String value of a commit metadata key, or `None` when unset.
    pub async fn metadata(&self, rev: &str, key: &str) -> Result<Option<String>, BackendError> {
        let spec = self
            .command()
            .args(["show", &format!("--print-metadata-key={}", key), rev]);
        let out = self.runner.output(&spec).await?;
        if !out.success() {
            return Ok(None);
        }
        Ok(parse_gvariant_string(&out.stdout))
    }

    pub async fn delete_ref(&self, refspec: &str) -> Result<(), BackendError> {
        tracing::debug!(refspec, "deleting ostree ref");
        self.run(self.command().args(["refs", "--delete", refspec]))
            .await?;
        Ok(())
    }

    /// Drop objects no longer reachable from any ref.
    pub async fn prune_refs_only(&self) -> Result<(), BackendError> {
        self.run(self.command().args(["prune", "--refs-only"]))
            .await?;
        Ok(())
    }
}

/// Decode the text form of a GVariant string, e.g. `'sha256:abc'`.
///
/// Returns `None` for anything that is not a quoted string.
pub(crate) fn parse_gvariant_string(text: &str) -> Option<String> {
    let text = text.trim();
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedRunner;

    #[test]
    fn gvariant_strings_are_unquoted() {
        assert_eq!(
            parse_gvariant_string("'sha256:abc'\n").as_deref(),
            Some("sha256:abc")
        );
        assert_eq!(
            parse_gvariant_string(r#""it's""#).as_deref(),
            Some("it's")
        );
        assert_eq!(
            parse_gvariant_string(r#"'{"a": "b\\"c"}'"#).as_deref(),
            Some(r#"{"a": "b\"c"}"#)
        );
        assert_eq!(parse_gvariant_string("uint32 5"), None);
    }

    #[tokio::test]
    async fn missing_repository_has_no_refs() {
        let runner = Arc::new(ScriptedRunner::new());
        let repo = OstreeRepo::new("/nonexistent/repo", runner.clone());
        assert!(repo.refs().await.unwrap().is_empty());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn refs_are_listed_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config"), "").unwrap();
        let repo_arg = format!("--repo={}", dir.path().display());
        let runner = Arc::new(ScriptedRunner::new().on(
            &["ostree", &repo_arg, "refs"],
            0,
            "ociimage/abc\nociimage/busybox_3Alatest\n\n",
        ));
        let repo = OstreeRepo::new(dir.path(), runner);
        assert_eq!(
            repo.refs().await.unwrap(),
            vec!["ociimage/abc", "ociimage/busybox_3Alatest"]
        );
    }

    #[tokio::test]
    async fn metadata_key_missing_is_none() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on(&["ostree", "--repo=/r", "show"], 1, "")
                .on(
                    &["ostree", "--repo=/r", "show", "--print-metadata-key=docker.digest"],
                    0,
                    "'sha256:feed'\n",
                ),
        );
        let repo = OstreeRepo::new("/r", runner);
        assert_eq!(
            repo.metadata("rev", "docker.digest").await.unwrap().as_deref(),
            Some("sha256:feed")
        );
        assert_eq!(repo.metadata("rev", "docker.manifest").await.unwrap(), None);
    }
}
