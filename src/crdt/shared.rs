//! Thread-safe handle to one replica.
//!
//! The tree performs no locking of its own. Hosts that reach a replica from
//! several threads go through this handle, which serializes every mutation
//! behind a write lock and lets queries share a read lock.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::crdt::identifier::Identifier;
use crate::crdt::lseq::LSeqTree;
use crate::crdt::operation::{InsertPayload, Operation, Snapshot};
use crate::error::Result;

/// Cloneable, lock-protected [`LSeqTree`]
pub struct SharedLSeq<T> {
    inner: Arc<RwLock<LSeqTree<T>>>,
}

impl<T> SharedLSeq<T> {
    pub fn new(tree: LSeqTree<T>) -> Self {
        SharedLSeq {
            inner: Arc::new(RwLock::new(tree)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn remove(&self, index: usize) -> Result<Identifier> {
        self.inner.write().remove(index)
    }

    pub fn apply_insert(&self, payload: InsertPayload<T>) -> Result<bool> {
        self.inner.write().apply_insert(payload)
    }

    pub fn apply_remove(&self, id: impl Into<Operation<T>>) -> Result<Option<usize>> {
        self.inner.write().apply_remove(id)
    }

    /// Runs `f` with shared access to the tree
    pub fn read<R>(&self, f: impl FnOnce(&LSeqTree<T>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Runs `f` with exclusive access to the tree
    pub fn write<R>(&self, f: impl FnOnce(&mut LSeqTree<T>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl<T: Clone> SharedLSeq<T> {
    pub fn insert(&self, element: T, index: usize) -> Result<InsertPayload<T>> {
        self.inner.write().insert(element, index)
    }

    /// Clone of the element at `index`
    pub fn get(&self, index: usize) -> Result<T> {
        self.inner.read().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.read().to_vec()
    }

    pub fn to_snapshot(&self) -> Snapshot<T> {
        self.inner.read().to_snapshot()
    }
}

impl<T> Clone for SharedLSeq<T> {
    fn clone(&self) -> Self {
        SharedLSeq {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> From<LSeqTree<T>> for SharedLSeq<T> {
    fn from(tree: LSeqTree<T>) -> Self {
        SharedLSeq::new(tree)
    }
}
