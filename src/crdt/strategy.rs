//! Boundary allocation of new identifiers.
//!
//! Given the neighbours `p < q` of an insertion point, the allocator looks for
//! the shallowest level with free digits between them and picks a random digit
//! close to one side of the gap: close to `p` on even levels (`b_plus`), close
//! to `q` on odd levels (`b_minus`). Alternating sides keeps identifiers short
//! under both left-to-right and right-to-left editing.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use rand::{Rng, RngCore};
use tracing::debug;

use crate::crdt::base::Base;
use crate::crdt::identifier::Identifier;
use crate::crdt::types::{Counter, SiteId, Triple};
use crate::error::{LSeqError, Result};

/// Source of uniformly distributed reals in `[0, 1)`.
///
/// Every `rand` generator is a random source, so seeded generators such as
/// `ChaCha8Rng::seed_from_u64` give reproducible allocations.
pub trait RandomSource: Send + Sync {
    fn real(&mut self) -> f64;
}

impl<R: RngCore + Send + Sync> RandomSource for R {
    fn real(&mut self) -> f64 {
        self.gen_range(0.0..1.0)
    }
}

/// Randomized boundary allocation strategy
pub struct Strategy {
    base: Base,
    boundary: u64,
    random: Box<dyn RandomSource>,
}

impl Strategy {
    pub fn new(base: Base, boundary: u64, random: Box<dyn RandomSource>) -> Self {
        Strategy {
            base,
            boundary,
            random,
        }
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn boundary(&self) -> u64 {
        self.boundary
    }

    /// Allocates an identifier strictly between the paths `p` and `q`.
    ///
    /// The leaf of the result always carries `(site, counter)`, so distinct
    /// allocations never yield the same identifier. A candidate whose leaf
    /// would fall on a node of `p` or `q` is discarded and the search moves
    /// one level deeper.
    pub fn allocate(
        &mut self,
        p: &[Triple],
        q: &[Triple],
        site: SiteId,
        counter: Counter,
    ) -> Result<Identifier> {
        let mut level = 0;
        loop {
            if self.base.bit_base(level) > 64 {
                return Err(LSeqError::DepthExhausted { level });
            }
            let interval = self.base.interval(level, p, q);
            if interval > BigInt::from(0) {
                let id = if level % 2 == 0 {
                    debug!(level, %interval, "allocating with b_plus");
                    self.b_plus(p, q, level, &interval, site, counter)
                } else {
                    debug!(level, %interval, "allocating with b_minus");
                    self.b_minus(p, q, level, &interval, site, counter)
                };

                let path = id.to_path(&self.base);
                if !lands_on(&path, p) && !lands_on(&path, q) {
                    return Ok(id);
                }
                debug!(level, "candidate falls on a neighbour node, going deeper");
            }
            level += 1;
        }
    }

    /// Copies `p` down to `level` and adds a random offset in `[1, step]`.
    pub fn b_plus(
        &mut self,
        p: &[Triple],
        q: &[Triple],
        level: usize,
        interval: &BigInt,
        site: SiteId,
        counter: Counter,
    ) -> Identifier {
        let step = self.step(interval);
        let bounds = self.base.bounds(level, p, q);

        let mut digit = self.base.pack(&bounds.prev);
        digit += self.draw(step) + 1;

        self.stamp(digit, p, q, level, site, counter)
    }

    /// Copies `q` down to `level`, or the maximum digits once `p` is known to
    /// be greater, and subtracts a random offset.
    ///
    /// The offset is `[1, step]` on the lesser side but `[0, step - 1]` when `p`
    /// is greater: the substituted maximum is itself a free slot, whereas `q`'s
    /// own digits are not.
    pub fn b_minus(
        &mut self,
        p: &[Triple],
        q: &[Triple],
        level: usize,
        interval: &BigInt,
        site: SiteId,
        counter: Counter,
    ) -> Identifier {
        let step = self.step(interval);
        let bounds = self.base.bounds(level, p, q);

        let mut digit = self.base.pack(&bounds.next);
        let offset = if bounds.p_is_greater {
            self.draw(step)
        } else {
            self.draw(step) + 1
        };
        digit -= BigUint::from(offset);

        self.stamp(digit, p, q, level, site, counter)
    }

    /// Stamps every level of a freshly allocated digit with a site and counter.
    ///
    /// Above the leaf, a level whose digit equals a neighbour's digit at that
    /// depth inherits the neighbour's stamp, `p` taking precedence over `q`.
    /// The leaf and every other level get the local site and counter.
    fn stamp(
        &self,
        digit: BigUint,
        p: &[Triple],
        q: &[Triple],
        level: usize,
        site: SiteId,
        counter: Counter,
    ) -> Identifier {
        let depth = level + 1;
        let mut sites = Vec::with_capacity(depth);
        let mut counters = Vec::with_capacity(depth);

        for i in 0..depth {
            let value = self.base.digit_at(&digit, depth, i);
            let stamp = match (p.get(i), q.get(i)) {
                _ if i == level => (site, counter),
                (Some(prev), _) if prev.path == value => (prev.site, prev.counter),
                (_, Some(next)) if next.path == value => (next.site, next.counter),
                _ => (site, counter),
            };
            sites.push(stamp.0);
            counters.push(stamp.1);
        }

        Identifier::new(digit, sites, counters)
    }

    fn step(&self, interval: &BigInt) -> u64 {
        interval
            .to_u64()
            .map_or(self.boundary, |interval| interval.min(self.boundary))
    }

    /// Uniform draw in `[0, step)`
    fn draw(&mut self, step: u64) -> u64 {
        let offset = (self.random.real() * step as f64).floor() as u64;
        offset.min(step.saturating_sub(1))
    }
}

/// Whether `path` shares every level of `neighbour` above its leaf and the
/// leaf digit at that depth, i.e. would name a node of the neighbour's path.
fn lands_on(path: &[Triple], neighbour: &[Triple]) -> bool {
    let Some((leaf, prefix)) = path.split_last() else {
        return false;
    };
    neighbour.len() > prefix.len()
        && neighbour[..prefix.len()] == *prefix
        && neighbour[prefix.len()].path == leaf.path
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("base", &self.base)
            .field("boundary", &self.boundary)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// Always returns the same real, to pin the offset
    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn real(&mut self) -> f64 {
            self.0
        }
    }

    fn strategy(base: u32, boundary: u64, random: impl RandomSource + 'static) -> Strategy {
        Strategy::new(Base::new(base), boundary, Box::new(random))
    }

    fn between(strategy: &Strategy, id: &Identifier, p: &[Triple], q: &[Triple]) -> bool {
        let base = strategy.base();
        let p = Identifier::from_path(p, base);
        let q = Identifier::from_path(q, base);
        id.compare(&p, base) == Ordering::Greater && id.compare(&q, base) == Ordering::Less
    }

    #[test]
    fn test_b_plus_adds_to_previous() {
        let mut strategy = strategy(3, 10, Fixed(0.0));
        let p = vec![Triple::min_bound()];
        let q = vec![Triple::max_bound(7)];

        let id = strategy.allocate(&p, &q, 4, 1).unwrap();
        // level 0, offset floor(0 * 6) + 1
        assert_eq!(id.to_path(strategy.base()), vec![Triple::new(1, 4, 1)]);
    }

    #[test]
    fn test_b_minus_subtracts_from_next() {
        let mut strategy = strategy(3, 10, Fixed(0.0));
        let p = vec![Triple::new(3, 1, 1)];
        let q = vec![Triple::new(4, 2, 1)];

        let id = strategy.allocate(&p, &q, 9, 5).unwrap();
        // level 1 is odd: [4, 0] - 1 = [3, 15]
        assert_eq!(
            id.to_path(strategy.base()),
            vec![Triple::new(3, 1, 1), Triple::new(15, 9, 5)]
        );
        assert!(between(&strategy, &id, &p, &q));
    }

    #[test]
    fn test_b_minus_keeps_greater_side_offset() {
        let mut strategy = strategy(3, 10, Fixed(0.0));
        let p = vec![Triple::new(3, 1, 1)];
        let q = vec![Triple::new(3, 2, 1)];

        let id = strategy.allocate(&p, &q, 9, 5).unwrap();
        // p is the greater side at level 1: the maximum digit itself is used
        assert_eq!(
            id.to_path(strategy.base()),
            vec![Triple::new(3, 1, 1), Triple::new(15, 9, 5)]
        );
        assert!(between(&strategy, &id, &p, &q));
    }

    #[test]
    fn test_offset_capped_by_boundary() {
        let mut strategy = strategy(15, 10, Fixed(0.999_999));
        let p = vec![Triple::min_bound()];
        let q = vec![Triple::max_bound(Base::new(15).max_digit(0))];

        let id = strategy.allocate(&p, &q, 1, 1).unwrap();
        assert_eq!(id.to_path(strategy.base())[0].path, 10);
    }

    #[test]
    fn test_offset_capped_by_interval() {
        let mut strategy = strategy(3, 10, Fixed(0.999_999));
        let p = vec![Triple::new(2, 1, 1)];
        let q = vec![Triple::new(4, 1, 2)];

        // Only digit 3 is free
        let id = strategy.allocate(&p, &q, 1, 3).unwrap();
        assert_eq!(id.to_path(strategy.base()), vec![Triple::new(3, 1, 3)]);
    }

    #[test]
    fn test_stamp_inherits_neighbour_levels() {
        let mut strategy = strategy(3, 10, Fixed(0.5));
        let p = vec![Triple::new(3, 1, 7)];
        let q = vec![Triple::new(4, 2, 8)];

        let path = strategy.allocate(&p, &q, 9, 9).unwrap().to_path(strategy.base());
        assert_eq!(path.len(), 2);
        // level 0 digit 3 comes from p
        assert_eq!(path[0], Triple::new(3, 1, 7));
        assert_eq!((path[1].site, path[1].counter), (9, 9));
    }

    #[test]
    fn test_leaf_never_takes_neighbour_stamp() {
        // offset floor(0.75 * 20) + 1 = 16: [4, 15] - 16 = [3, 15], and 15 is
        // also q's digit at level 1
        let mut strategy = strategy(3, 20, Fixed(0.75));
        let p = vec![Triple::new(3, 1, 1)];
        let q = vec![Triple::new(4, 2, 1), Triple::new(15, 2, 9)];

        let id = strategy.allocate(&p, &q, 9, 5).unwrap();
        assert_eq!(
            id.to_path(strategy.base()),
            vec![Triple::new(3, 1, 1), Triple::new(15, 9, 5)]
        );
        assert!(between(&strategy, &id, &p, &q));
    }

    #[test]
    fn test_lands_on_neighbour_nodes() {
        let q = vec![Triple::new(0, 0, 0), Triple::new(1, 3, 3), Triple::new(1, 3, 13)];

        assert!(lands_on(&[Triple::new(0, 0, 0), Triple::new(1, 7, 20)], &q));
        assert!(lands_on(&[Triple::new(0, 0, 0), Triple::new(1, 3, 3), Triple::new(1, 7, 20)], &q));
        // a different stamp above the leaf makes it another node
        assert!(!lands_on(&[Triple::new(0, 0, 0), Triple::new(1, 4, 3), Triple::new(1, 7, 20)], &q));
        assert!(!lands_on(&[Triple::new(0, 0, 0), Triple::new(2, 7, 20)], &q));
        assert!(!lands_on(&q, &q[..2]));
    }

    #[test]
    fn test_allocations_never_repeat() {
        // Tiny digits force frequent digit matches with both neighbours
        let mut strategy = strategy(1, 1, ChaCha8Rng::seed_from_u64(4));
        let mut paths = vec![vec![Triple::min_bound()], vec![Triple::max_bound(1)]];
        let mut issued = std::collections::HashSet::new();

        for counter in 1..=200u64 {
            let at = (counter as usize * 37) % (paths.len() - 1);
            let id = strategy
                .allocate(&paths[at], &paths[at + 1], 3, counter)
                .unwrap();
            let path = id.to_path(strategy.base());
            assert!(between(&strategy, &id, &paths[at], &paths[at + 1]));
            assert_eq!(path.last().map(|t| (t.site, t.counter)), Some((3, counter)));
            assert!(issued.insert(id));

            paths.insert(at + 1, path);
            // drop an element now and then, leaving its neighbours adjacent
            if counter % 3 == 0 && paths.len() > 3 {
                paths.remove(1 + (counter as usize * 13) % (paths.len() - 2));
            }
        }
    }

    #[test]
    fn test_random_allocations_stay_between_neighbours() {
        let mut strategy = strategy(3, 10, ChaCha8Rng::seed_from_u64(7));
        let p = vec![Triple::new(5, 1, 1), Triple::new(3, 1, 2)];
        let q = vec![Triple::new(5, 1, 1), Triple::new(4, 2, 1)];

        for counter in 0..200 {
            let id = strategy.allocate(&p, &q, 3, counter).unwrap();
            assert!(between(&strategy, &id, &p, &q));
        }
    }
}
