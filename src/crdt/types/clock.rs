//! Local monotonic counter of a replica.
//!
//! Each local insertion ticks the counter once; the resulting value stamps the
//! levels of the new identifier that are not inherited from a neighbour.

use serde::{Deserialize, Serialize};

use crate::crdt::types::replica::{Counter, SiteId};

/// Site identity plus its local counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteClock {
    site: SiteId,
    counter: Counter,
}

impl SiteClock {
    /// Creates a clock for `site` starting at zero
    pub fn new(site: SiteId) -> Self {
        Self::resume(site, 0)
    }

    /// Recreates a clock at a previously reached value, e.g. from a snapshot
    pub fn resume(site: SiteId, counter: Counter) -> Self {
        SiteClock { site, counter }
    }

    /// Advances the counter and returns the new value
    pub fn tick(&mut self) -> Counter {
        self.counter += 1;
        self.counter
    }

    /// Current counter value
    pub fn counter(&self) -> Counter {
        self.counter
    }

    /// Site this clock belongs to
    pub fn site(&self) -> SiteId {
        self.site
    }
}
