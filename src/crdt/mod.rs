//! CRDT (Conflict-free Replicated Data Type) implementation module.
//!
//! This module contains the LSEQ sequence CRDT: the exponential tree, the
//! identifier encoding, the allocation strategy and the replica façade.

pub mod base;
pub mod identifier;
pub mod lseq;
pub mod node;
pub mod operation;
pub mod options;
pub mod shared;
pub mod strategy;
pub mod types;

// Re-export the main public API
pub use base::Base;
pub use identifier::Identifier;
pub use lseq::{LSeqTree, MAX_PENDING_REMOVALS};
pub use node::{Node, Payload};
pub use operation::{InsertPayload, Operation, Snapshot};
pub use options::LSeqOptions;
pub use shared::SharedLSeq;
pub use strategy::{RandomSource, Strategy};
pub use types::{Counter, SiteClock, SiteId, Triple};
