//! Property-based tests for the LSEQ tree.

use std::collections::HashSet;

use proptest::prelude::*;

use lseq_tree::{Base, Identifier, InsertPayload, LSeqOptions, LSeqTree, Triple};

/// A local edit, positions given as a fraction of the current length
#[derive(Clone, Debug)]
enum EditOp {
    Insert { pos_pct: f64, ch: char },
    Remove { pos_pct: f64 },
}

fn arbitrary_edit_op() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        3 => (0.0..=1.0f64, prop::char::range('a', 'z'))
            .prop_map(|(pos_pct, ch)| EditOp::Insert { pos_pct, ch }),
        1 => (0.0..=1.0f64).prop_map(|pos_pct| EditOp::Remove { pos_pct }),
    ]
}

fn arbitrary_options() -> impl Strategy<Value = LSeqOptions> {
    (2u32..=16, 1u64..=12)
        .prop_map(|(base, boundary)| LSeqOptions::default().with_base(base).with_boundary(boundary))
}

/// Triple path whose digits fit `base`
fn arbitrary_path(base: u32) -> impl Strategy<Value = Vec<Triple>> {
    prop::collection::vec((any::<u64>(), 0u64..4, 0u64..4), 1..6).prop_map(move |levels| {
        let widths = Base::new(base);
        levels
            .into_iter()
            .enumerate()
            .map(|(level, (digit, site, counter))| {
                Triple::new(digit % (widths.max_digit(level) + 1), site, counter)
            })
            .collect()
    })
}

/// Number of replicas in the multi-round exchange
const SITES: usize = 3;

/// An operation on its way to the other replicas
#[derive(Clone, Debug)]
enum Message {
    Insert(InsertPayload<char>),
    Remove(Identifier),
}

fn position(pos_pct: f64, len: usize) -> usize {
    ((pos_pct * len as f64) as usize).min(len)
}

/// Applies `ops` to `tree` and to a plain vector, returning the vector
fn apply_edits(tree: &mut LSeqTree<char>, ops: &[EditOp]) -> Vec<char> {
    let mut model = Vec::new();
    for op in ops {
        match *op {
            EditOp::Insert { pos_pct, ch } => {
                let index = position(pos_pct, model.len());
                tree.insert(ch, index).unwrap();
                model.insert(index, ch);
            }
            EditOp::Remove { pos_pct } => {
                if model.is_empty() {
                    continue;
                }
                let index = position(pos_pct, model.len() - 1);
                tree.remove(index).unwrap();
                model.remove(index);
            }
        }
    }
    model
}

/// Applies `ops` to `tree` and returns the operations to broadcast
fn edit_round(tree: &mut LSeqTree<char>, ops: &[EditOp]) -> Vec<Message> {
    let mut outbox = Vec::new();
    for op in ops {
        match *op {
            EditOp::Insert { pos_pct, ch } => {
                let index = position(pos_pct, tree.len());
                outbox.push(Message::Insert(tree.insert(ch, index).unwrap()));
            }
            EditOp::Remove { pos_pct } => {
                if tree.is_empty() {
                    continue;
                }
                let index = position(pos_pct, tree.len() - 1);
                outbox.push(Message::Remove(tree.remove(index).unwrap()));
            }
        }
    }
    outbox
}

fn deliver(tree: &mut LSeqTree<char>, message: Message) {
    match message {
        Message::Insert(payload) => {
            tree.apply_insert(payload).unwrap();
        }
        Message::Remove(id) => {
            tree.apply_remove(id).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The tree behaves like a vector under local edits
    #[test]
    fn local_edits_match_vector_model(
        options in arbitrary_options(),
        seed in any::<u64>(),
        ops in prop::collection::vec(arbitrary_edit_op(), 1..120),
    ) {
        let mut tree = LSeqTree::seeded(1, options, seed).unwrap();
        let model = apply_edits(&mut tree, &ops);

        prop_assert_eq!(tree.len(), model.len());
        prop_assert_eq!(tree.to_vec(), model);
    }

    /// Identifiers strictly increase along the sequence, and rank inverts select
    #[test]
    fn identifiers_are_sorted_and_indexable(
        options in arbitrary_options(),
        seed in any::<u64>(),
        ops in prop::collection::vec(arbitrary_edit_op(), 1..80),
    ) {
        let mut tree = LSeqTree::seeded(1, options, seed).unwrap();
        apply_edits(&mut tree, &ops);

        let ids: Vec<Identifier> = (0..tree.len()).map(|i| tree.identifier_at(i).unwrap()).collect();
        for (i, id) in ids.iter().enumerate() {
            prop_assert_eq!(tree.index_of(id).unwrap(), Some(i));
        }
        for pair in ids.windows(2) {
            prop_assert_eq!(pair[0].compare(&pair[1], tree.base()), std::cmp::Ordering::Less);
        }
    }

    /// Any delivery order of the same inserts yields the same tree
    #[test]
    fn inserts_converge_under_permutation(
        seed in any::<u64>(),
        ops in prop::collection::vec(arbitrary_edit_op(), 1..60),
        order in Just((0..60usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let options = LSeqOptions::default().with_base(4).with_boundary(5);
        let mut origin = LSeqTree::seeded(1, options, seed).unwrap();

        let mut payloads: Vec<InsertPayload<char>> = Vec::new();
        for op in &ops {
            if let EditOp::Insert { pos_pct, ch } = *op {
                let index = position(pos_pct, origin.len());
                payloads.push(origin.insert(ch, index).unwrap());
            }
        }

        let mut replica = LSeqTree::seeded(2, options, seed ^ 1).unwrap();
        for &i in order.iter().filter(|&&i| i < payloads.len()) {
            prop_assert!(replica.apply_insert(payloads[i].clone()).unwrap());
        }

        prop_assert_eq!(replica.to_vec(), origin.to_vec());
        prop_assert_eq!(replica.root(), origin.root());
    }

    /// Concurrent edits from two sites converge once exchanged
    #[test]
    fn concurrent_sites_converge(
        seed in any::<u64>(),
        first in prop::collection::vec((0.0..=1.0f64, prop::char::range('a', 'z')), 1..30),
        second in prop::collection::vec((0.0..=1.0f64, prop::char::range('A', 'Z')), 1..30),
    ) {
        let options = LSeqOptions::default().with_base(5);
        let mut left = LSeqTree::seeded(1, options, seed).unwrap();
        let mut right = LSeqTree::seeded(2, options, seed.wrapping_add(1)).unwrap();

        let mut from_left = Vec::new();
        for &(pos_pct, ch) in &first {
            let index = position(pos_pct, left.len());
            from_left.push(left.insert(ch, index).unwrap());
        }
        let mut from_right = Vec::new();
        for &(pos_pct, ch) in &second {
            let index = position(pos_pct, right.len());
            from_right.push(right.insert(ch, index).unwrap());
        }

        for op in from_right {
            left.apply_insert(op).unwrap();
        }
        for op in from_left.into_iter().rev() {
            right.apply_insert(op).unwrap();
        }

        prop_assert_eq!(left.len(), first.len() + second.len());
        prop_assert_eq!(left.to_vec(), right.to_vec());
    }

    /// A replica never hands out the same identifier twice, even once removals
    /// have emptied the space between two neighbours
    #[test]
    fn allocated_identifiers_are_unique(
        seed in any::<u64>(),
        ops in prop::collection::vec(arbitrary_edit_op(), 1..60),
    ) {
        let options = LSeqOptions::default().with_base(1).with_boundary(1);
        let mut tree = LSeqTree::seeded(3, options, seed).unwrap();

        let mut issued = HashSet::new();
        for message in edit_round(&mut tree, &ops) {
            if let Message::Insert(payload) = message {
                prop_assert!(issued.insert(payload.identifier().unwrap().clone()));
            }
        }
    }

    /// Several sites insert and remove over several rounds; each round's
    /// operations reach every other site in a shuffled order, removals
    /// possibly ahead of their inserts, and all sites agree afterwards
    #[test]
    fn sites_converge_across_rounds(
        options in (1u32..=4, 1u64..=4)
            .prop_map(|(base, boundary)| LSeqOptions::default().with_base(base).with_boundary(boundary)),
        seed in any::<u64>(),
        rounds in prop::collection::vec(
            prop::collection::vec(prop::collection::vec(arbitrary_edit_op(), 0..8), SITES),
            1..5,
        ),
        orders in prop::collection::vec(Just((0..SITES * 8).collect::<Vec<_>>()).prop_shuffle(), 4),
    ) {
        let mut replicas: Vec<LSeqTree<char>> = (0..SITES as u64)
            .map(|site| LSeqTree::seeded(site + 1, options, seed ^ site).unwrap())
            .collect();
        let mut issued = HashSet::new();

        for (round, edits) in rounds.iter().enumerate() {
            let mut sent: Vec<(usize, Message)> = Vec::new();
            for (site, ops) in edits.iter().enumerate() {
                for message in edit_round(&mut replicas[site], ops) {
                    if let Message::Insert(payload) = &message {
                        prop_assert!(issued.insert(payload.identifier().unwrap().clone()));
                    }
                    sent.push((site, message));
                }
            }

            let order = &orders[round];
            for (receiver, tree) in replicas.iter_mut().enumerate() {
                let in_range = order.iter().copied().filter(|&i| i < sent.len());
                let sequence: Vec<usize> = if receiver % 2 == 0 {
                    in_range.collect()
                } else {
                    in_range.rev().collect()
                };
                for i in sequence {
                    let (origin, message) = &sent[i];
                    if *origin != receiver {
                        deliver(tree, message.clone());
                    }
                }
            }

            for tree in &replicas[1..] {
                prop_assert_eq!(tree.to_vec(), replicas[0].to_vec());
                prop_assert_eq!(tree.root(), replicas[0].root());
            }
        }
    }

    /// Packing is lossless and the packed order is the path order
    #[test]
    fn identifier_order_matches_path_order(
        (base, a, b) in (1u32..=12).prop_flat_map(|base| (Just(base), arbitrary_path(base), arbitrary_path(base))),
    ) {
        let widths = Base::new(base);
        let id_a = Identifier::from_path(&a, &widths);
        let id_b = Identifier::from_path(&b, &widths);

        prop_assert_eq!(id_a.to_path(&widths), a.clone());
        prop_assert_eq!(id_a.compare(&id_b, &widths), a.cmp(&b));
        prop_assert_eq!(id_b.compare(&id_a, &widths), b.cmp(&a));
    }
}
