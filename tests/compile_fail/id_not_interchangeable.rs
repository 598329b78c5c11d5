// ABOUTME: Compile-fail test verifying ContainerId and ImageId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use stowage::types::{ContainerId, ImageId};

fn takes_image_id(_id: ImageId) {}

fn main() {
    let container_id = ContainerId::new("abc123");
    takes_image_id(container_id); // ERROR: expected ImageId, found ContainerId
}
