// ABOUTME: Marks images for deletion directly on their registry.
// ABOUTME: Best effort per target; never consults local backends.

use crate::output::Output;
use crate::process::{CommandRunner, CommandSpec};
use crate::types::RemoteReference;

/// Exit status when any remote target could not be deleted.
pub const REMOTE_FAILURE_CODE: i32 = 2;

fn skopeo_delete(reference: &RemoteReference) -> CommandSpec {
    CommandSpec::new("skopeo")
        .arg("delete")
        .args(reference.tool_args())
        .arg(reference.transport_ref())
}

/// Delete every target from its registry, continuing past failures.
///
/// Returns 0 when every target was marked for deletion, else
/// [`REMOTE_FAILURE_CODE`].
pub async fn delete_remote(runner: &dyn CommandRunner, output: &Output, targets: &[String]) -> i32 {
    let mut status = 0;
    for target in targets {
        let reference = RemoteReference::parse(target);
        let spec = skopeo_delete(&reference);
        let result = match runner.output(&spec).await {
            Ok(out) => out.checked(&spec).map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => output.info(&format!("Image {} marked for deletion", reference)),
            Err(e) => {
                tracing::debug!(target = %target, "remote delete failed: {}", e);
                output.failure(&format!(
                    "Failed to mark Image {} for deletion: {}",
                    reference, e
                ));
                status = REMOTE_FAILURE_CODE;
            }
        }
    }
    status
}
