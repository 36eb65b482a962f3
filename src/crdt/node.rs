//! Node of the exponential tree.
//!
//! Every root-to-node path of the tree is the triple path of an identifier.
//! Children are kept sorted by triple and every node counts the elements
//! stored strictly below it, which turns rank and select into walks
//! proportional to the depth of the tree rather than its size.

use serde::{Deserialize, Serialize};

use crate::crdt::types::Triple;

/// Content of a node that marks a sequence position.
///
/// The two boundary sentinels carry [`Payload::Bound`] so they are counted
/// like elements but never surface as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload<T> {
    Bound,
    Element(T),
}

impl<T> Payload<T> {
    /// The element, unless this is a sentinel
    pub fn element(&self) -> Option<&T> {
        match self {
            Payload::Element(element) => Some(element),
            Payload::Bound => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Payload::Bound)
    }
}

/// Represents one level of one or more identifiers.
///
/// A node is either a branch (it has children and usually no payload) or a
/// leaf carrying a payload. Leaves without payload are pruned on removal, so
/// no tombstones remain in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Node<T> {
    /// Triple of this level; unused on the root
    pub triple: Triple,
    /// Payload stored at this exact path
    #[serde(default)]
    pub element: Option<Payload<T>>,
    /// Number of payload-bearing nodes strictly below this one
    #[serde(default)]
    pub sub_counter: usize,
    /// Children sorted by triple, without duplicates
    #[serde(default)]
    pub children: Vec<Node<T>>,
}

impl<T> Node<T> {
    /// Creates an empty root
    pub fn root() -> Self {
        Node {
            triple: Triple::default(),
            element: None,
            sub_counter: 0,
            children: Vec::new(),
        }
    }

    /// Builds the single-child chain of `path` with `element` at its leaf.
    ///
    /// `path` must not be empty.
    pub fn chain(path: &[Triple], element: Option<Payload<T>>) -> Self {
        let mut node = Node {
            triple: path[path.len() - 1],
            element,
            sub_counter: 0,
            children: Vec::new(),
        };
        for triple in path[..path.len() - 1].iter().rev() {
            let sub_counter = node.sub_counter + usize::from(node.element.is_some());
            node = Node {
                triple: *triple,
                element: None,
                sub_counter,
                children: vec![node],
            };
        }
        node
    }

    /// Splits a single-child chain back into its path and leaf payload.
    ///
    /// Returns `None` when some level has more than one child.
    pub fn into_chain(self) -> Option<(Vec<Triple>, Option<Payload<T>>)> {
        let mut path = vec![self.triple];
        let mut node = self;
        loop {
            match node.children.len() {
                0 => return Some((path, node.element)),
                1 => {
                    node = node.children.pop()?;
                    path.push(node.triple);
                }
                _ => return None,
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of positions this node accounts for in its parent
    fn weight(&self) -> usize {
        self.sub_counter + usize::from(self.element.is_some())
    }

    fn find(&self, triple: &Triple) -> Result<usize, usize> {
        self.children.binary_search_by(|child| child.triple.cmp(triple))
    }

    /// Inserts `payload` at `path` below this node.
    ///
    /// Returns `false`, leaving the tree untouched, when the path already
    /// carries a payload.
    pub fn add(&mut self, path: &[Triple], payload: Payload<T>) -> bool {
        let Some((head, rest)) = path.split_first() else {
            return false;
        };

        let added = match self.find(head) {
            Err(index) => {
                self.children.insert(index, Node::chain(path, Some(payload)));
                true
            }
            Ok(index) => {
                let child = &mut self.children[index];
                if !rest.is_empty() {
                    child.add(rest, payload)
                } else if child.element.is_some() {
                    false
                } else {
                    child.element = Some(payload);
                    true
                }
            }
        };

        if added {
            self.sub_counter += 1;
        }
        added
    }

    /// Returns the payload stored exactly at `path`, if any
    pub fn lookup(&self, path: &[Triple]) -> Option<&Payload<T>> {
        let mut current = self;
        for triple in path {
            let index = current.find(triple).ok()?;
            current = &current.children[index];
        }
        if path.is_empty() {
            return None;
        }
        current.element.as_ref()
    }

    /// Removes the payload stored at `path` and prunes every subtree left
    /// without payloads.
    ///
    /// Returns the removed payload, or `None` when `path` carries no payload.
    pub fn remove(&mut self, path: &[Triple]) -> Option<Payload<T>> {
        self.lookup(path)?;
        self.remove_existing(path)
    }

    fn remove_existing(&mut self, path: &[Triple]) -> Option<Payload<T>> {
        let (head, rest) = path.split_first()?;
        let index = self.find(head).ok()?;
        self.sub_counter -= 1;

        let child = &mut self.children[index];
        if rest.is_empty() {
            if child.sub_counter == 0 {
                return self.children.remove(index).element;
            }
            return child.element.take();
        }
        if child.sub_counter == 1 && child.element.is_none() {
            // The removed payload was the only one below this child
            return self.children.remove(index).lookup_owned(rest);
        }
        child.remove_existing(rest)
    }

    fn lookup_owned(mut self, path: &[Triple]) -> Option<Payload<T>> {
        for triple in path {
            let index = self.find(triple).ok()?;
            self = self.children.swap_remove(index);
        }
        self.element
    }

    /// Rank of the payload at `path`: the number of payloads ordered before it.
    ///
    /// At every level the siblings before the matched child are summed from
    /// whichever end of the children list is closer.
    pub fn index_of(&self, path: &[Triple]) -> Option<usize> {
        let mut rank = 0;
        let mut current = self;

        for (depth, triple) in path.iter().enumerate() {
            let index = current.find(triple).ok()?;

            if index < current.children.len() / 2 {
                rank += current.children[..index]
                    .iter()
                    .map(Node::weight)
                    .sum::<usize>();
            } else {
                let after: usize = current.children[index..].iter().map(Node::weight).sum();
                rank += current.sub_counter - after;
            }

            current = &current.children[index];
            if depth + 1 < path.len() && current.element.is_some() {
                rank += 1;
            }
        }

        if path.is_empty() || current.element.is_none() {
            return None;
        }
        Some(rank)
    }

    /// Select: the path and payload of the position at rank `index`.
    ///
    /// The returned path is detached from the tree. Children are scanned from
    /// the left or from the right, whichever reaches `index` sooner.
    pub fn get(&self, index: usize) -> Option<(Vec<Triple>, &Payload<T>)> {
        let mut remaining = index;
        let mut current = self;
        let mut path = Vec::new();

        loop {
            if remaining >= current.sub_counter {
                return None;
            }

            let index = if remaining < current.sub_counter / 2 {
                let mut found = None;
                for (i, child) in current.children.iter().enumerate() {
                    let weight = child.weight();
                    if remaining < weight {
                        found = Some(i);
                        break;
                    }
                    remaining -= weight;
                }
                found?
            } else {
                let mut start = current.sub_counter;
                let mut found = None;
                for (i, child) in current.children.iter().enumerate().rev() {
                    start -= child.weight();
                    if remaining >= start {
                        remaining -= start;
                        found = Some(i);
                        break;
                    }
                }
                found?
            };

            current = &current.children[index];
            path.push(current.triple);

            if let Some(payload) = &current.element {
                if remaining == 0 {
                    return Some((path, payload));
                }
                remaining -= 1;
            }
        }
    }

    /// Calls `visit` with the path and payload of every payload-bearing node
    /// below this one, in sequence order.
    pub fn walk<'a, F>(&'a self, mut visit: F)
    where
        F: FnMut(&[Triple], &'a Payload<T>),
    {
        let mut path = Vec::new();
        for child in &self.children {
            child.walk_from(&mut path, &mut visit);
        }
    }

    fn walk_from<'a, F>(&'a self, path: &mut Vec<Triple>, visit: &mut F)
    where
        F: FnMut(&[Triple], &'a Payload<T>),
    {
        path.push(self.triple);
        if let Some(payload) = &self.element {
            visit(path.as_slice(), payload);
        }
        for child in &self.children {
            child.walk_from(path, visit);
        }
        path.pop();
    }

    /// Iterates the payloads below this node in sequence order
    pub fn payloads(&self) -> Payloads<'_, T> {
        Payloads {
            stack: self.children.iter().rev().collect(),
        }
    }
}

/// Pre-order iterator over the payloads of a subtree
pub struct Payloads<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> Iterator for Payloads<'a, T> {
    type Item = &'a Payload<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.iter().rev());
            if let Some(payload) = &node.element {
                return Some(payload);
            }
        }
        None
    }
}
