// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to keep image and container IDs apart at compile time.

mod id;
pub(crate) mod image_name;
pub(crate) mod remote_ref;

pub use id::{ContainerId, ImageId, SHORT_ID_LEN};
pub use image_name::{ImageName, ParseImageNameError};
pub use remote_ref::RemoteReference;
