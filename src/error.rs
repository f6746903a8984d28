//! Error types for BVH construction.

use thiserror::Error;

/// Errors that can occur while building a BVH.
///
/// Construction is all-or-nothing: on any error every scratch allocation is
/// released and no partial hierarchy is returned. Traversal is infallible and
/// has no error type.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// Fewer than two primitives were supplied. A hierarchy over zero or one
    /// primitive has no internal nodes; callers handle those cases directly.
    #[error("fewer than two primitives")]
    EmptyOrTrivial,

    /// An allocation for the scratch buffers or the node array failed.
    #[error("allocation failed during build")]
    OutOfMemory,
}
