//! Packed position identifiers.
//!
//! An [`Identifier`] is the broadcast form of a root-to-leaf path of
//! [`Triple`]s: every level's digit is concatenated into one arbitrary-precision
//! integer, with the sites and counters kept in parallel lists.

use std::cmp::Ordering;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::crdt::base::Base;
use crate::crdt::types::{Counter, SiteId, Triple};
use crate::error::{LSeqError, Result};

/// Unique and immutable position of an element in the sequence.
///
/// # Design Notes
///
/// Identifiers are only meaningful together with the [`Base`] they were packed
/// with; every replica of one sequence shares the same base, so the base is
/// passed in rather than stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    digit: BigUint,
    sites: Vec<SiteId>,
    counters: Vec<Counter>,
}

impl Identifier {
    /// Creates an identifier from its raw parts without validation
    pub fn new(digit: BigUint, sites: Vec<SiteId>, counters: Vec<Counter>) -> Self {
        Identifier {
            digit,
            sites,
            counters,
        }
    }

    /// Packs a root-to-leaf path into an identifier
    pub fn from_path(path: &[Triple], base: &Base) -> Self {
        let digits: Vec<u64> = path.iter().map(|t| t.path).collect();
        Identifier {
            digit: base.pack(&digits),
            sites: path.iter().map(|t| t.site).collect(),
            counters: path.iter().map(|t| t.counter).collect(),
        }
    }

    /// Unpacks the identifier into its root-to-leaf path
    pub fn to_path(&self, base: &Base) -> Vec<Triple> {
        let depth = self.depth();
        self.sites
            .iter()
            .zip(&self.counters)
            .enumerate()
            .map(|(level, (&site, &counter))| {
                Triple::new(base.digit_at(&self.digit, depth, level), site, counter)
            })
            .collect()
    }

    /// Like [`Identifier::to_path`], after checking the parts line up.
    ///
    /// Used for identifiers received from other replicas.
    pub fn checked_path(&self, base: &Base) -> Result<Vec<Triple>> {
        self.validate(base)?;
        Ok(self.to_path(base))
    }

    /// Checks that `digit` decomposes into exactly one value per site/counter
    pub fn validate(&self, base: &Base) -> Result<()> {
        if self.sites.len() != self.counters.len() {
            return Err(LSeqError::MalformedIdentifier(format!(
                "{} sites but {} counters",
                self.sites.len(),
                self.counters.len()
            )));
        }
        if self.sites.is_empty() {
            return Err(LSeqError::MalformedIdentifier("empty identifier".into()));
        }
        if base.bit_base(self.depth() - 1) > 64 {
            return Err(LSeqError::MalformedIdentifier(format!(
                "depth {} exceeds the digit width",
                self.depth()
            )));
        }
        let width = base.sum_bit(self.depth() - 1) as u64;
        if self.digit.bits() > width {
            return Err(LSeqError::MalformedIdentifier(format!(
                "digit uses {} bits, depth {} allows {}",
                self.digit.bits(),
                self.depth(),
                width
            )));
        }
        Ok(())
    }

    /// Total order shared by every replica.
    ///
    /// Levels are compared from the root: the digit prefix first, then the
    /// site, then the counter. When every shared level ties, the shorter
    /// identifier (the ancestor) sorts first.
    pub fn compare(&self, other: &Identifier, base: &Base) -> Ordering {
        let bits = base.sum_bit(self.depth().saturating_sub(1));
        let other_bits = base.sum_bit(other.depth().saturating_sub(1));

        let mine = self.sites.iter().zip(&self.counters);
        let theirs = other.sites.iter().zip(&other.counters);
        for (level, (stamp, other_stamp)) in mine.zip(theirs).enumerate() {
            let sum = base.sum_bit(level);
            let digit = &self.digit >> (bits - sum);
            let other_digit = &other.digit >> (other_bits - sum);

            let ordering = digit.cmp(&other_digit).then_with(|| stamp.cmp(&other_stamp));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        self.depth().cmp(&other.depth())
    }

    /// Number of levels that carry both a site and a counter
    pub fn depth(&self) -> usize {
        self.sites.len().min(self.counters.len())
    }

    pub fn digit(&self) -> &BigUint {
        &self.digit
    }

    pub fn sites(&self) -> &[SiteId] {
        &self.sites
    }

    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }
}
