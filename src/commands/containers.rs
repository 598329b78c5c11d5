// ABOUTME: System container command implementations.
// ABOUTME: Handles exec into system containers and remote rootfs checks.

use std::path::Path;
use std::sync::Arc;
use stowage::backend::BackendRegistry;
use stowage::config::Config;
use stowage::error::Result;
use stowage::output::Output;
use stowage::process::CommandRunner;
use stowage::syscontainer::{ExecEnv, ExecRequest, exec_container, resolve_remote_location};

/// Run a command in a system container, returning the runtime's exit code.
pub async fn exec(
    config: &Config,
    runner: Arc<dyn CommandRunner>,
    output: &Output,
    request: ExecRequest,
) -> Result<i32> {
    let registry = BackendRegistry::from_config(config, runner.clone());
    output.progress(&format!("  → Looking up {}...", request.name));
    exec_container(&registry, runner.as_ref(), config, ExecEnv::detect(), &request).await
}

/// Print the canonical container location for `path`.
pub fn check_remote(path: &Path, output: &Output) -> Result<i32> {
    let location = resolve_remote_location(path)?;
    output.success(&location.display().to_string());
    Ok(0)
}
