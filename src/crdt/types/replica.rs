//! Site and counter types that stamp every identifier level.
//!
//! A site is the replica that allocated a level of an identifier, the counter
//! is that site's local clock at allocation time. Together they make identifiers
//! produced by different replicas distinct even when their digits collide.

/// A unique identifier for each replica (site) of the sequence.
///
/// `SiteId::MAX` is reserved for the upper boundary sentinel.
pub type SiteId = u64;

/// Per-site monotonic counter value.
pub type Counter = u64;
