// ABOUTME: Sealed trait pattern for the backend trait.
// ABOUTME: The set of engines is closed; only this crate implements Backend.

/// Sealed trait to prevent external implementations.
pub trait Sealed {}
