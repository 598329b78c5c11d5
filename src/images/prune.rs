// ABOUTME: Removes dangling images from every reachable backend.
// ABOUTME: Ignores any backend selection; prune always covers all storage.

use crate::backend::BackendRegistry;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::output::Output;

/// What one prune invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Backends that were pruned, in priority order.
    pub pruned: Vec<String>,
    pub removed: usize,
}

/// Prune each reachable backend once. Unreachable backends are skipped with a
/// warning; a backend that fails to prune aborts the command.
pub async fn prune_images(
    registry: &BackendRegistry,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<PruneSummary> {
    let mut summary = PruneSummary::default();
    for backend in registry.backends() {
        let kind = backend.kind();
        if !backend.is_available().await {
            diag.warn(Warning::backend_skipped(kind));
            continue;
        }

        output.progress(&format!("Pruning {} images...", kind));
        let report = backend.prune().await?;
        for removed in &report.removed {
            output.progress(&format!("  deleted {}", removed));
        }
        for warning in report.warnings {
            diag.warn(Warning::prune_cleanup(kind, warning));
        }
        summary.removed += report.removed.len();
        summary.pruned.push(kind.to_string());
    }
    Ok(summary)
}
