//! Error types for LSEQ sequence operations.
//!
//! Only conditions the caller must act on are errors. A duplicate insert is
//! reported as `false` and a removal of an unknown identifier as `None`, since
//! at-least-once delivery makes both legitimate.

use thiserror::Error;

/// Result type alias for LSEQ operations
pub type Result<T> = std::result::Result<T, LSeqError>;

/// Errors that can occur while editing or replicating an [`LSeqTree`](crate::LSeqTree)
#[derive(Error, Debug)]
pub enum LSeqError {
    /// Index outside the visible sequence
    #[error("Index {index} is not between 0 and {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Identifier whose digit, sites and counters do not line up
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// Node fragment that is not a single root-to-leaf chain
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// Rejected configuration
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Allocation needs a level wider than a 64-bit digit slot
    #[error("No room left to allocate at level {level}")]
    DepthExhausted { level: usize },

    /// A freshly allocated identifier was already present locally
    #[error("Allocated identifier already exists in the tree")]
    AllocationCollision,

    /// Snapshot (de)serialization failure
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
