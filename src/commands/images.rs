// ABOUTME: Image command implementations.
// ABOUTME: Wires the delete and prune workflows to the host.

use std::sync::Arc;
use stowage::backend::BackendRegistry;
use stowage::config::Config;
use stowage::diagnostics::Diagnostics;
use stowage::error::Result;
use stowage::images::{DeleteOptions, delete_images, prune_images};
use stowage::output::Output;
use stowage::process::CommandRunner;
use stowage::prompt::StdinPrompt;

/// Delete local or remote images.
pub async fn delete(
    config: &Config,
    runner: Arc<dyn CommandRunner>,
    output: &Output,
    opts: DeleteOptions,
) -> Result<i32> {
    let registry = BackendRegistry::from_config(config, runner.clone());
    delete_images(&registry, runner.as_ref(), &StdinPrompt, output, &opts).await
}

/// Prune dangling images from every backend.
pub async fn prune(config: &Config, runner: Arc<dyn CommandRunner>, output: &Output) -> Result<i32> {
    let mut output = output.clone();
    output.start_timer();

    let registry = BackendRegistry::from_config(config, runner);
    let mut diag = Diagnostics::default();
    let result = prune_images(&registry, &output, &mut diag).await;

    // Emit collected warnings
    diag.emit(&output);

    let summary = result?;
    output.success(&format!(
        "Pruned {} ({} removed)",
        if summary.pruned.is_empty() {
            "nothing".to_string()
        } else {
            summary.pruned.join(", ")
        },
        summary.removed
    ));
    Ok(0)
}
