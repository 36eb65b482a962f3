//! Broadcast payloads and snapshots exchanged between replicas.
//!
//! Positions travel either as a packed [`Identifier`] or as an explicit chain
//! of tree nodes. Which one it is gets decided once, when the payload is
//! deserialized, and both are reduced to the same triple path before the tree
//! is touched.

use serde::{Deserialize, Serialize};

use crate::crdt::base::Base;
use crate::crdt::identifier::Identifier;
use crate::crdt::node::Node;
use crate::crdt::options::LSeqOptions;
use crate::crdt::types::{Counter, SiteId, Triple};
use crate::error::{LSeqError, Result};

/// Position of an element as sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation<T> {
    /// Packed `{digit, sites, counters}` form
    Identifier(Identifier),
    /// Single-child chain of nodes, root level first
    NodePath(Node<T>),
}

impl<T> Operation<T> {
    /// Reduces the operation to a validated root-to-leaf path
    pub fn into_path(self, base: &Base) -> Result<Vec<Triple>> {
        match self {
            Operation::Identifier(id) => id.checked_path(base),
            Operation::NodePath(node) => {
                let (path, _) = node.into_chain().ok_or_else(|| {
                    LSeqError::MalformedPath("node fragment has more than one child".into())
                })?;
                check_widths(&path, base)?;
                Ok(path)
            }
        }
    }
}

/// Checks that every digit of `path` fits the width of its level
pub(crate) fn check_widths(path: &[Triple], base: &Base) -> Result<()> {
    if path.is_empty() {
        return Err(LSeqError::MalformedPath("empty path".into()));
    }
    for (level, triple) in path.iter().enumerate() {
        if base.bit_base(level) > 64 || triple.path > base.max_digit(level) {
            return Err(LSeqError::MalformedPath(format!(
                "digit {} does not fit level {}",
                triple.path, level
            )));
        }
    }
    Ok(())
}

impl<T> From<Identifier> for Operation<T> {
    fn from(id: Identifier) -> Self {
        Operation::Identifier(id)
    }
}

/// Broadcast form of an insertion.
///
/// The element travels next to its position; a node fragment's own payload,
/// if any, is not consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertPayload<T> {
    pub element: T,
    pub id: Operation<T>,
}

impl<T> InsertPayload<T> {
    pub fn new(element: T, id: impl Into<Operation<T>>) -> Self {
        InsertPayload {
            element,
            id: id.into(),
        }
    }

    /// The packed identifier, when the position travels in that form
    pub fn identifier(&self) -> Option<&Identifier> {
        match &self.id {
            Operation::Identifier(id) => Some(id),
            Operation::NodePath(_) => None,
        }
    }
}

/// Serialized replica: its site, clock, options and whole tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub site: SiteId,
    pub counter: Counter,
    pub options: LSeqOptions,
    pub root: Node<T>,
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::*;
    use crate::crdt::node::Payload;

    #[test]
    fn test_identifier_and_fragment_reduce_to_same_path() {
        let base = Base::new(3);
        let path = vec![Triple::new(1, 3, 0), Triple::new(5, 3, 2)];

        let packed: Operation<char> = Identifier::from_path(&path, &base).into();
        let fragment = Operation::NodePath(Node::chain(&path, Some(Payload::Element('x'))));

        assert_eq!(packed.into_path(&base).unwrap(), path);
        assert_eq!(fragment.into_path(&base).unwrap(), path);
    }

    #[test]
    fn test_branching_fragment_is_rejected() {
        let base = Base::new(3);
        let mut node: Node<char> = Node::chain(&[Triple::new(1, 1, 1), Triple::new(2, 1, 1)], None);
        node.children.push(Node::chain(&[Triple::new(3, 1, 1)], None));

        assert!(matches!(
            Operation::NodePath(node).into_path(&base),
            Err(LSeqError::MalformedPath(_))
        ));
    }

    #[test]
    fn test_fragment_digit_must_fit_level() {
        let base = Base::new(3);
        let node: Node<char> = Node::chain(&[Triple::new(8, 1, 1)], None);

        assert!(matches!(
            Operation::NodePath(node).into_path(&base),
            Err(LSeqError::MalformedPath(_))
        ));
    }

    #[test]
    fn test_operation_json_is_tagged() {
        let id = Identifier::new(BigUint::from(21u32), vec![3, 3], vec![0, 2]);
        let payload = InsertPayload::new('a', id.clone());

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["id"].get("identifier").is_some());

        let back: InsertPayload<char> = serde_json::from_value(json).unwrap();
        assert_eq!(back.identifier(), Some(&id));
    }
}
