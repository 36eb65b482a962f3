//! Value types for the LSEQ tree.
//!
//! This module contains the small, copyable types every other part of the
//! sequence is built from, organized into focused submodules.

pub mod clock;
pub mod replica;
pub mod triple;

pub use clock::SiteClock;
pub use replica::{Counter, SiteId};
pub use triple::Triple;
