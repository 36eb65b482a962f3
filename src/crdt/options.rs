//! Configuration shared by every replica of one sequence.
//!
//! Replicas only converge when they agree on both values: `base` decides how
//! identifiers are packed and `boundary` how far apart new identifiers land.

use serde::{Deserialize, Serialize};

use crate::crdt::base::Base;
use crate::error::{LSeqError, Result};

/// Tree options, serialized inside snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LSeqOptions {
    /// Bit width of the depth-0 digit; the root has `2^base` slots
    pub base: u32,
    /// Largest gap left between a new identifier and its neighbour
    pub boundary: u64,
}

impl LSeqOptions {
    pub const DEFAULT_BOUNDARY: u64 = 10;
    /// Widest depth-0 digit accepted, leaving room for deep paths below
    pub const MAX_BASE: u32 = 32;

    pub fn with_base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    pub fn with_boundary(mut self, boundary: u64) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.base == 0 || self.base > Self::MAX_BASE {
            return Err(LSeqError::InvalidOptions(format!(
                "base must be between 1 and {}, got {}",
                Self::MAX_BASE,
                self.base
            )));
        }
        if self.boundary == 0 {
            return Err(LSeqError::InvalidOptions(
                "boundary must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn bit_base(&self) -> Base {
        Base::new(self.base)
    }
}

impl Default for LSeqOptions {
    fn default() -> Self {
        LSeqOptions {
            base: Base::DEFAULT,
            boundary: Self::DEFAULT_BOUNDARY,
        }
    }
}
