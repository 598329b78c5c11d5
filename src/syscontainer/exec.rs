// ABOUTME: Runs a command in a system container.
// ABOUTME: Execs into a running service, or starts a one-off run from the checkout.

use super::oci_config::RunConfig;
use crate::backend::{BackendKind, BackendRegistry, current_uid};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::{CommandRunner, CommandSpec};
use crate::types::ImageName;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Arguments of `containers exec`.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub name: String,
    pub detach: bool,
    pub args: Vec<String>,
}

/// Facts about the calling process that steer exec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecEnv {
    /// Running as an unprivileged user.
    pub user_mode: bool,
    /// Standard input is a terminal.
    pub tty: bool,
}

impl ExecEnv {
    pub fn detect() -> Self {
        Self {
            user_mode: current_uid().is_some_and(|uid| uid != 0),
            tty: std::io::stdin().is_terminal(),
        }
    }
}

/// Where a system container stands, probed fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    /// Its systemd service is active.
    Running,
    /// Installed but not running.
    Stopped {
        checkout: PathBuf,
        runtime: Option<String>,
    },
}

/// Whether systemd reports the unit `name` as active.
pub async fn service_active(runner: &dyn CommandRunner, name: &str) -> bool {
    match runner
        .output(&CommandSpec::new("systemctl").args(["is-active", name]))
        .await
    {
        Ok(out) => out.stdout.trim() == "active",
        Err(e) => {
            tracing::debug!(name, "service probe failed: {}", e);
            false
        }
    }
}

/// Probe the service first, then the checkout.
pub async fn probe_state(
    registry: &BackendRegistry,
    runner: &dyn CommandRunner,
    name: &str,
) -> Result<ContainerState> {
    if service_active(runner, name).await {
        return Ok(ContainerState::Running);
    }
    let container = registry
        .resolve_container(name, Some(BackendKind::Ostree), true)
        .await?;
    let checkout = container
        .checkout
        .ok_or_else(|| Error::ContainerNotFound(name.to_string()))?;
    Ok(ContainerState::Stopped {
        checkout,
        runtime: container.runtime,
    })
}

/// Run `request` in the named system container and return the runtime's exit code.
pub async fn exec_container(
    registry: &BackendRegistry,
    runner: &dyn CommandRunner,
    config: &Config,
    env: ExecEnv,
    request: &ExecRequest,
) -> Result<i32> {
    if env.user_mode {
        return Err(Error::UnsupportedOperation(
            "exec is not supported for user containers".to_string(),
        ));
    }
    let name = request.name.as_str();
    if ImageName::is_image_reference(name) {
        return Err(Error::UnsupportedOperation(format!(
            "'{}' names an image; install it as a system container before running it",
            name
        )));
    }

    let default_runtime = config.runtime.display().to_string();
    match probe_state(registry, runner, name).await? {
        ContainerState::Running => {
            if request.detach {
                tracing::debug!(name, "ignoring --detach for a running container");
            }
            let mut spec = CommandSpec::new(default_runtime).arg("exec");
            if env.tty {
                spec = spec.arg("--tty");
            }
            let spec = spec.arg(name).args(request.args.iter().cloned());
            Ok(runner.status(&spec).await?)
        }
        ContainerState::Stopped { checkout, runtime } => {
            if request.detach {
                return Err(Error::InvalidOperation(
                    "cannot use --detach with a container that is not running".to_string(),
                ));
            }
            let run = RunConfig::prepare(&checkout, &request.args, env.tty)?;
            run.create_runtime_dirs()?;
            let spec = CommandSpec::new(runtime.unwrap_or(default_runtime))
                .args(["run", name])
                .current_dir(run.dir());
            // `run` must outlive the runtime process; it deletes the directory on drop.
            let code = runner.status(&spec).await?;
            drop(run);
            Ok(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::backend::fake::FakeBackend;
    use crate::process::fake::ScriptedRunner;
    use std::fs;

    const IMAGE: &str = "5555555555555555555555555555555555555555555555555555555555555555";

    fn registry(ostree: FakeBackend) -> BackendRegistry {
        let backends: Vec<Box<dyn Backend>> =
            vec![Box::new(FakeBackend::new(BackendKind::Docker)), Box::new(ostree)];
        BackendRegistry::new(backends, BackendKind::Docker)
    }

    fn request(name: &str, detach: bool, args: &[&str]) -> ExecRequest {
        ExecRequest {
            name: name.to_string(),
            detach,
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn running(name: &str) -> ScriptedRunner {
        ScriptedRunner::new().on(&["systemctl", "is-active", name], 0, "active\n")
    }

    fn root() -> ExecEnv {
        ExecEnv {
            user_mode: false,
            tty: false,
        }
    }

    fn checkout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("rootfs/usr")).unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"process": {"args": ["/usr/bin/etcd"]}, "root": {"path": "rootfs"}}"#,
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn user_mode_is_rejected_before_any_probe() {
        let runner = running("etcd");
        let env = ExecEnv {
            user_mode: true,
            tty: true,
        };
        let err = exec_container(
            &registry(FakeBackend::new(BackendKind::Ostree)),
            &runner,
            &Config::default(),
            env,
            &request("etcd", false, &[]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn image_references_are_not_run() {
        let runner = ScriptedRunner::new();
        let err = exec_container(
            &registry(FakeBackend::new(BackendKind::Ostree)),
            &runner,
            &Config::default(),
            root(),
            &request("docker.io/busybox:latest", false, &["sh"]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn running_service_gets_exec_with_tty_only_on_a_terminal() {
        for tty in [true, false] {
            let runner = running("etcd").on(&["/usr/bin/runc", "exec"], 0, "");
            let env = ExecEnv {
                user_mode: false,
                tty,
            };
            let code = exec_container(
                &registry(FakeBackend::new(BackendKind::Ostree)),
                &runner,
                &Config::default(),
                env,
                &request("etcd", true, &["etcdctl", "member", "list"]),
            )
            .await
            .unwrap();
            assert_eq!(code, 0);

            let last = runner.calls().pop().unwrap();
            let mut expected = vec!["/usr/bin/runc", "exec"];
            if tty {
                expected.push("--tty");
            }
            expected.extend(["etcd", "etcdctl", "member", "list"]);
            assert_eq!(last, expected);
        }
    }

    #[tokio::test]
    async fn runtime_exit_code_is_returned() {
        let runner = running("etcd").on(&["/usr/bin/runc", "exec"], 3, "");
        let code = exec_container(
            &registry(FakeBackend::new(BackendKind::Ostree)),
            &runner,
            &Config::default(),
            root(),
            &request("etcd", false, &["false"]),
        )
        .await
        .unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn stopped_without_checkout_is_not_found() {
        let runner = ScriptedRunner::new().on(&["systemctl", "is-active"], 3, "inactive\n");
        let err = exec_container(
            &registry(FakeBackend::new(BackendKind::Ostree)),
            &runner,
            &Config::default(),
            root(),
            &request("etcd", false, &[]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ContainerNotFound(ref name) if name == "etcd"));
    }

    #[tokio::test]
    async fn detach_is_invalid_for_a_stopped_container() {
        let dir = checkout();
        let ostree = FakeBackend::new(BackendKind::Ostree)
            .system_container("etcd", IMAGE, dir.path(), None);
        let runner = ScriptedRunner::new();
        let err = exec_container(
            &registry(ostree),
            &runner,
            &Config::default(),
            root(),
            &request("etcd", true, &["sh"]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn stopped_container_gets_a_fresh_run_from_its_checkout() {
        let dir = checkout();
        let ostree = FakeBackend::new(BackendKind::Ostree).system_container(
            "etcd",
            IMAGE,
            dir.path(),
            Some("/usr/bin/crun"),
        );
        let runner = ScriptedRunner::new();
        let code = exec_container(
            &registry(ostree),
            &runner,
            &Config::default(),
            root(),
            &request("etcd", false, &["sh"]),
        )
        .await
        .unwrap();
        assert_eq!(code, 0);

        let spec = runner.specs().pop().unwrap();
        assert_eq!(spec.argv(), vec!["/usr/bin/crun", "run", "etcd"]);
        let cwd = spec.cwd().unwrap();
        assert!(cwd.file_name().unwrap().to_string_lossy().starts_with("stowage-run-"));
        // The rewritten configuration is gone once the run finishes.
        assert!(!cwd.exists());
    }
}
