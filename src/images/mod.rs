// ABOUTME: Image workflows spanning every storage backend.
// ABOUTME: Local delete with safety checks, registry-side delete, and prune.

mod delete;
mod prune;
mod remote;

pub use delete::{
    DeleteOptions, DeletePlan, Selection, conflict_message, delete_images, unnamed_layer_message,
};
pub use prune::{PruneSummary, prune_images};
pub use remote::{REMOTE_FAILURE_CODE, delete_remote};
