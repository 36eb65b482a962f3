//! Core LSEQ sequence implementation.
//!
//! This module contains the replica-level façade: it turns linear indices into
//! tree neighbours, asks the allocation strategy for identifiers in between and
//! applies local and remote operations through the same tree entry points.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, trace};

use crate::crdt::base::Base;
use crate::crdt::identifier::Identifier;
use crate::crdt::node::{Node, Payload};
use crate::crdt::operation::{InsertPayload, Operation, Snapshot, check_widths};
use crate::crdt::options::LSeqOptions;
use crate::crdt::strategy::{RandomSource, Strategy};
use crate::crdt::types::{Counter, SiteClock, SiteId, Triple};
use crate::error::{LSeqError, Result};

/// A replica of an LSEQ sequence.
///
/// Elements are stored in an exponential tree keyed by identifiers, so every
/// replica that received the same set of operations holds the same sequence,
/// whatever the delivery order.
///
/// # Design
///
/// - Two permanent sentinels bound the sequence; they are counted by the tree
///   but hidden from indices and [`LSeqTree::len`]
/// - Removal deletes the identifier's path outright, no tombstones are kept
/// - A removal that arrives before its insert is held back until the insert
///   shows up and cancels it; at most [`MAX_PENDING_REMOVALS`] are held
/// - Re-applying an insert is rejected and re-applying a removal is a no-op
/// - The tree is not synchronized; see [`SharedLSeq`](crate::SharedLSeq) for a
///   handle that can be shared across threads
#[derive(Debug)]
pub struct LSeqTree<T> {
    clock: SiteClock,
    options: LSeqOptions,
    base: Base,
    strategy: Strategy,
    root: Node<T>,
    /// Removals received before their insert, oldest first
    pending_removals: VecDeque<Vec<Triple>>,
}

/// Capacity of the buffer of removals waiting for their insert.
///
/// Once full, the oldest waiting removal is dropped.
pub const MAX_PENDING_REMOVALS: usize = 1024;

/// Borrowed form of [`Snapshot`], serialized without cloning the tree
#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    site: SiteId,
    counter: Counter,
    options: LSeqOptions,
    root: &'a Node<T>,
}

impl<T> LSeqTree<T> {
    /// Creates an empty replica with default options and an entropy-seeded
    /// random source.
    pub fn new(site: SiteId) -> Self {
        Self::build(
            SiteClock::new(site),
            LSeqOptions::default(),
            Box::new(ChaCha8Rng::from_entropy()),
        )
    }

    /// Creates an empty replica with the given options
    pub fn with_options(site: SiteId, options: LSeqOptions) -> Result<Self> {
        Self::with_random(site, options, ChaCha8Rng::from_entropy())
    }

    /// Creates an empty replica whose allocations are reproducible
    pub fn seeded(site: SiteId, options: LSeqOptions, seed: u64) -> Result<Self> {
        Self::with_random(site, options, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Creates an empty replica drawing allocation offsets from `random`
    pub fn with_random(
        site: SiteId,
        options: LSeqOptions,
        random: impl RandomSource + 'static,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(SiteClock::new(site), options, Box::new(random)))
    }

    fn build(clock: SiteClock, options: LSeqOptions, random: Box<dyn RandomSource>) -> Self {
        let base = options.bit_base();
        let mut root = Node::root();
        root.add(&[Triple::min_bound()], Payload::Bound);
        root.add(&[Triple::max_bound(base.max_digit(0))], Payload::Bound);

        LSeqTree {
            clock,
            options,
            base,
            strategy: Strategy::new(base, options.boundary, random),
            root,
            pending_removals: VecDeque::new(),
        }
    }

    pub fn site(&self) -> SiteId {
        self.clock.site()
    }

    /// Local counter, i.e. the number of local insertions so far
    pub fn counter(&self) -> Counter {
        self.clock.counter()
    }

    pub fn options(&self) -> &LSeqOptions {
        &self.options
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    /// Root of the exponential tree, sentinels included
    pub fn root(&self) -> &Node<T> {
        &self.root
    }

    /// Number of visible elements
    pub fn len(&self) -> usize {
        self.root.sub_counter.saturating_sub(2)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of removals still waiting for their insert
    pub fn pending_removals(&self) -> usize {
        self.pending_removals.len()
    }

    /// Element at `index`, sentinels excluded
    pub fn get(&self, index: usize) -> Result<&T> {
        let len = self.len();
        if index >= len {
            return Err(LSeqError::IndexOutOfRange { index, len });
        }
        self.root
            .get(index + 1)
            .and_then(|(_, payload)| payload.element())
            .ok_or(LSeqError::IndexOutOfRange { index, len })
    }

    /// Identifier of the element at `index`
    pub fn identifier_at(&self, index: usize) -> Result<Identifier> {
        let len = self.len();
        if index >= len {
            return Err(LSeqError::IndexOutOfRange { index, len });
        }
        let path = self.path_at(index + 1)?;
        Ok(Identifier::from_path(&path, &self.base))
    }

    /// Path at `index` counting the lower sentinel as position 0
    fn path_at(&self, index: usize) -> Result<Vec<Triple>> {
        self.root
            .get(index)
            .map(|(path, _)| path)
            .ok_or(LSeqError::IndexOutOfRange {
                index,
                len: self.len() + 2,
            })
    }

    /// Elements in sequence order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.root.payloads().filter_map(Payload::element)
    }

    /// Visible index of the element with identifier `id`, if present
    pub fn index_of(&self, id: &Identifier) -> Result<Option<usize>> {
        let path = id.checked_path(&self.base)?;
        Ok(self.visible_index(&path))
    }

    pub fn contains(&self, id: &Identifier) -> Result<bool> {
        Ok(self.index_of(id)?.is_some())
    }

    fn visible_index(&self, path: &[Triple]) -> Option<usize> {
        match self.root.lookup(path) {
            Some(Payload::Element(_)) => self.root.index_of(path).map(|rank| rank - 1),
            _ => None,
        }
    }

    /// Removes the element at `index` and returns its identifier for broadcast
    pub fn remove(&mut self, index: usize) -> Result<Identifier> {
        let len = self.len();
        if index >= len {
            return Err(LSeqError::IndexOutOfRange { index, len });
        }
        let path = self.path_at(index + 1)?;
        self.root.remove(&path);
        trace!(site = self.site(), index, "removed local element");

        Ok(Identifier::from_path(&path, &self.base))
    }

    /// Integrates an insertion made by any replica.
    ///
    /// Returns `false` when the identifier already carries an element, or when
    /// its removal was received first; in both cases nothing is added.
    pub fn apply_insert(&mut self, payload: InsertPayload<T>) -> Result<bool> {
        let path = self.checked_path(payload.id)?;
        Ok(self.insert_path(&path, payload.element))
    }

    /// Like [`LSeqTree::apply_insert`], returning the visible index of the new
    /// element, or `None` if nothing was added.
    pub fn apply_insert_indexed(&mut self, payload: InsertPayload<T>) -> Result<Option<usize>> {
        let path = self.checked_path(payload.id)?;
        if !self.insert_path(&path, payload.element) {
            return Ok(None);
        }
        Ok(self.visible_index(&path))
    }

    fn insert_path(&mut self, path: &[Triple], element: T) -> bool {
        if self.take_pending_removal(path) {
            return false;
        }
        let added = self.root.add(path, Payload::Element(element));
        if added {
            trace!(site = self.site(), depth = path.len(), "applied insert");
        } else {
            debug!(site = self.site(), ?path, "duplicate insert ignored");
        }
        added
    }

    /// Integrates a removal made by any replica.
    ///
    /// Returns the visible index the element had, or `None` when it is not
    /// present. A removal of an identifier this replica has never seen is
    /// kept until the matching insert arrives, which it then cancels, so the
    /// outcome does not depend on delivery order. This small buffer is the
    /// only removal state the tree keeps.
    pub fn apply_remove(&mut self, id: impl Into<Operation<T>>) -> Result<Option<usize>> {
        let path = self.checked_path(id.into())?;
        let Some(index) = self.visible_index(&path) else {
            if self.root.lookup(&path).is_none() {
                self.defer_removal(path);
            }
            return Ok(None);
        };

        self.root.remove(&path);
        trace!(site = self.site(), index, "applied remove");
        Ok(Some(index))
    }

    fn defer_removal(&mut self, path: Vec<Triple>) {
        if self.pending_removals.contains(&path) {
            return;
        }
        if self.pending_removals.len() == MAX_PENDING_REMOVALS {
            let dropped = self.pending_removals.pop_front();
            debug!(site = self.site(), ?dropped, "pending removal buffer full, oldest dropped");
        }
        debug!(site = self.site(), ?path, "removal held until its insert arrives");
        self.pending_removals.push_back(path);
    }

    /// Consumes a removal waiting for `path`, if any
    fn take_pending_removal(&mut self, path: &[Triple]) -> bool {
        let Some(index) = self
            .pending_removals
            .iter()
            .position(|pending| pending.as_slice() == path)
        else {
            return false;
        };
        self.pending_removals.remove(index);
        debug!(site = self.site(), ?path, "insert cancelled by an earlier removal");
        true
    }

    /// Validates a remote position and reduces it to a path
    fn checked_path(&self, operation: Operation<T>) -> Result<Vec<Triple>> {
        let path = operation.into_path(&self.base)?;
        self.check_bounds(&path)?;
        Ok(path)
    }

    /// Rejects paths that would sort after the upper sentinel
    fn check_bounds(&self, path: &[Triple]) -> Result<()> {
        check_widths(path, &self.base)?;
        let upper = Triple::max_bound(self.base.max_digit(0));
        if path[0] >= upper {
            return Err(LSeqError::MalformedPath(
                "path does not sort before the upper bound".into(),
            ));
        }
        Ok(())
    }
}

impl<T: Clone> LSeqTree<T> {
    /// Inserts `element` so that it ends up at `index`.
    ///
    /// Returns the element with its new identifier, to be broadcast to the
    /// other replicas.
    pub fn insert(&mut self, element: T, index: usize) -> Result<InsertPayload<T>> {
        let len = self.len();
        if index > len {
            return Err(LSeqError::IndexOutOfRange { index, len });
        }
        let p = self.path_at(index)?;
        let q = self.path_at(index + 1)?;

        let site = self.site();
        let counter = self.clock.tick();
        let id = self.strategy.allocate(&p, &q, site, counter)?;
        let path = id.to_path(&self.base);

        if !self.root.add(&path, Payload::Element(element.clone())) {
            return Err(LSeqError::AllocationCollision);
        }
        trace!(site, counter, index, depth = path.len(), "inserted local element");

        Ok(InsertPayload::new(element, id))
    }

    /// Elements in sequence order
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn to_snapshot(&self) -> Snapshot<T> {
        Snapshot {
            site: self.site(),
            counter: self.counter(),
            options: self.options,
            root: self.root.clone(),
        }
    }

    /// Adds every element of `snapshot` to this replica.
    ///
    /// Merging is expressed through the same insertion used for remote
    /// operations, so elements already present are skipped. Every path is
    /// checked before the first one is added, so a rejected snapshot leaves
    /// the replica untouched. Returns the number of elements added.
    pub fn merge_snapshot(&mut self, snapshot: &Snapshot<T>) -> Result<usize> {
        if snapshot.options.base != self.options.base {
            return Err(LSeqError::InvalidOptions(format!(
                "snapshot base {} differs from replica base {}",
                snapshot.options.base, self.options.base
            )));
        }

        let mut entries = Vec::new();
        snapshot.root.walk(|path, payload| {
            if let Payload::Element(element) = payload {
                entries.push((path.to_vec(), element));
            }
        });

        for (path, _) in &entries {
            self.check_bounds(path)?;
        }

        let mut added = 0;
        for (path, element) in entries {
            if self.take_pending_removal(&path) {
                continue;
            }
            if self.root.add(&path, Payload::Element(element.clone())) {
                added += 1;
            }
        }

        info!(site = self.site(), from = snapshot.site, added, "merged snapshot");
        Ok(added)
    }

    /// Rebuilds a replica from its snapshot, drawing from `random`
    pub fn restore(snapshot: &Snapshot<T>, random: impl RandomSource + 'static) -> Result<Self> {
        snapshot.options.validate()?;
        let clock = SiteClock::resume(snapshot.site, snapshot.counter);
        let mut tree = Self::build(clock, snapshot.options, Box::new(random));
        tree.merge_snapshot(snapshot)?;
        Ok(tree)
    }

    /// Rebuilds a replica from its snapshot
    pub fn from_snapshot(snapshot: &Snapshot<T>) -> Result<Self> {
        Self::restore(snapshot, ChaCha8Rng::from_entropy())
    }
}

impl<T: Serialize> LSeqTree<T> {
    /// Serializes the replica as a snapshot
    pub fn to_json(&self) -> Result<String> {
        let snapshot = SnapshotRef {
            site: self.site(),
            counter: self.counter(),
            options: self.options,
            root: &self.root,
        };
        Ok(serde_json::to_string(&snapshot)?)
    }
}

impl<T: Clone + DeserializeOwned> LSeqTree<T> {
    /// Rebuilds a replica from [`LSeqTree::to_json`] output
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot<T> = serde_json::from_str(json)?;
        Self::from_snapshot(&snapshot)
    }
}
