//! The `<digit, site, counter>` triple, one level of an identifier.
//!
//! Identifiers are root-to-leaf paths of triples in the exponential tree, and
//! the children of every tree node are kept sorted by triple order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::crdt::types::replica::{Counter, SiteId};

/// One level of an LSEQ identifier.
///
/// # Ordering
///
/// Triples are ordered by digit first, then by site, then by counter. The digit
/// alone positions the level in the dense space; site and counter only break
/// ties between replicas that picked the same digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Triple {
    /// Position in the dense space at this level
    pub path: u64,
    /// Site that allocated this level
    pub site: SiteId,
    /// Counter of that site at allocation time
    pub counter: Counter,
}

impl Triple {
    pub fn new(path: u64, site: SiteId, counter: Counter) -> Self {
        Triple {
            path,
            site,
            counter,
        }
    }

    /// Lower boundary sentinel `<0, 0, 0>`
    pub fn min_bound() -> Self {
        Triple::new(0, 0, 0)
    }

    /// Upper boundary sentinel `<max_digit, MAX, MAX>` for the given depth-0 width
    pub fn max_bound(max_digit: u64) -> Self {
        Triple::new(max_digit, SiteId::MAX, Counter::MAX)
    }
}

impl PartialOrd for Triple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Triple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.site.cmp(&other.site))
            .then_with(|| self.counter.cmp(&other.counter))
    }
}
