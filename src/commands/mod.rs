// ABOUTME: Command module aggregator for the stowage CLI.
// ABOUTME: Re-exports image, container and storage command handlers.

mod containers;
mod images;
mod storage;

pub use containers::{check_remote, exec};
pub use images::{delete, prune};
pub use storage::list_storage;
