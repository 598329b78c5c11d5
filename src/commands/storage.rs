// ABOUTME: Storage command implementations.
// ABOUTME: Reports which backends are active.

use std::sync::Arc;
use stowage::backend::BackendRegistry;
use stowage::config::Config;
use stowage::error::Result;
use stowage::output::Output;
use stowage::process::CommandRunner;

/// Print every backend with its state, then the configured default.
pub async fn list_storage(
    config: &Config,
    runner: Arc<dyn CommandRunner>,
    output: &Output,
) -> Result<i32> {
    let registry = BackendRegistry::from_config(config, runner);
    output.info(&registry.describe().await);
    output.info(&format!("Default storage: {}", registry.default_kind()));
    Ok(0)
}
