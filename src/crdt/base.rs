//! Bit-width schedule of the exponential tree.
//!
//! Level `i` of an identifier holds a digit of `base + i` bits, so the arity of
//! the tree doubles with every level. Packed identifiers concatenate the digits
//! of all levels, most significant level first.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;

use crate::crdt::types::Triple;

/// Per-depth digit widths, shared by identifiers and the allocation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base {
    base: usize,
}

/// Digit values of both neighbours truncated to a level, as seen by the
/// allocator.
///
/// Once `p` is known to be the greater side, `next` holds the maximum digit of
/// every remaining level instead of `q`'s values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub prev: Vec<u64>,
    pub next: Vec<u64>,
    pub common_root: bool,
    pub p_is_greater: bool,
}

impl Base {
    pub const DEFAULT: u32 = 15;

    pub fn new(base: u32) -> Self {
        Base {
            base: base as usize,
        }
    }

    /// Width of the depth-0 digit
    pub fn base(&self) -> u32 {
        self.base as u32
    }

    /// Number of bits of the digit at `level`
    pub fn bit_base(&self, level: usize) -> usize {
        self.base + level
    }

    /// Bits used by levels `0..=level` together.
    ///
    /// Sum of consecutive widths `base..=base + level`, i.e. the difference of
    /// two triangular numbers.
    pub fn sum_bit(&self, level: usize) -> usize {
        let n = self.bit_base(level);
        let m = self.base.saturating_sub(1);
        n * (n + 1) / 2 - m * (m + 1) / 2
    }

    /// Largest digit representable at `level`
    pub fn max_digit(&self, level: usize) -> u64 {
        match self.bit_base(level) {
            bits if bits >= 64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        }
    }

    /// Number of identifiers that fit strictly between `p` and `q` when both
    /// are truncated to `level`.
    ///
    /// Zero or a negative count means the level is full and the caller has to
    /// look one level deeper.
    pub fn interval(&self, level: usize, p: &[Triple], q: &[Triple]) -> BigInt {
        let bounds = self.bounds(level, p, q);
        let mut interval =
            BigInt::from(self.pack(&bounds.next)) - BigInt::from(self.pack(&bounds.prev));
        if !bounds.common_root && !bounds.p_is_greater {
            interval -= 1;
        }
        interval
    }

    /// Walks `p` and `q` in lock-step down to `level`.
    ///
    /// An absent level of `p` counts as digit 0. An absent level of `q` counts
    /// as 0 once the paths diverged, but while they still share their digits it
    /// means `q` ended first, which makes `p` the greater side from here on.
    pub(crate) fn bounds(&self, level: usize, p: &[Triple], q: &[Triple]) -> Bounds {
        let mut prev = Vec::with_capacity(level + 1);
        let mut next = Vec::with_capacity(level + 1);
        let mut common_root = true;
        let mut p_is_greater = false;

        for i in 0..=level {
            let prev_value = p.get(i).map_or(0, |t| t.path);
            let mut next_value = q.get(i).map_or(0, |t| t.path);

            if common_root {
                if q.get(i).is_none() {
                    common_root = false;
                    p_is_greater = true;
                } else if prev_value != next_value {
                    common_root = false;
                    p_is_greater = prev_value > next_value;
                }
            }
            if p_is_greater {
                next_value = self.max_digit(i);
            }

            prev.push(prev_value);
            next.push(next_value);
        }

        Bounds {
            prev,
            next,
            common_root,
            p_is_greater,
        }
    }

    /// Packs per-level digits into one integer, level 0 most significant
    pub fn pack(&self, digits: &[u64]) -> BigUint {
        let mut packed = BigUint::zero();
        for (i, digit) in digits.iter().enumerate() {
            packed += *digit;
            if i + 1 != digits.len() {
                packed <<= self.bit_base(i + 1);
            }
        }
        packed
    }

    /// Extracts the digit of `level` from an integer packing `depth` levels
    pub fn digit_at(&self, packed: &BigUint, depth: usize, level: usize) -> u64 {
        let shift = self.sum_bit(depth - 1) - self.sum_bit(level);
        let shifted = packed >> shift;
        let low = shifted.iter_u64_digits().next().unwrap_or(0);
        low & self.max_digit(level)
    }
}

impl Default for Base {
    fn default() -> Self {
        Base::new(Base::DEFAULT)
    }
}
