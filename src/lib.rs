//! # LSEQ Tree - Sequence CRDT
//!
//! A Conflict-free Replicated Data Type (CRDT) implementation of an ordered
//! sequence, suitable for collaborative text editing and similar applications
//! where concurrent modifications need to be merged consistently across
//! distributed systems.
//!
//! ## Features
//!
//! - **Conflict-free**: Concurrent operations can be applied in any order and will converge
//! - **Dense identifiers**: Every element gets an identifier that can always be split further
//! - **Sub-linear identifiers**: Boundary allocation keeps identifiers short under common editing patterns
//! - **No tombstones**: Removed elements leave the tree entirely
//!
//! ## Example
//!
//! ```rust
//! use lseq_tree::{LSeqOptions, LSeqTree};
//!
//! let mut alice = LSeqTree::seeded(1, LSeqOptions::default(), 1).unwrap();
//! let mut bob = LSeqTree::seeded(2, LSeqOptions::default(), 2).unwrap();
//!
//! let op = alice.insert('a', 0).unwrap();
//! bob.apply_insert(op).unwrap();
//!
//! assert_eq!(bob.to_vec(), vec!['a']);
//! ```

pub mod crdt;
pub mod error;

// Re-export the main public API from the CRDT module
pub use crdt::{Base, Identifier, LSeqOptions, LSeqTree, MAX_PENDING_REMOVALS, Node, Payload};
pub use crdt::{SharedLSeq, Strategy};
pub use crdt::{Counter, InsertPayload, Operation, RandomSource, SiteClock, SiteId, Snapshot, Triple};
pub use error::{LSeqError, Result};
